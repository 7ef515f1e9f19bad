use std::sync::Arc;

use crate::paint::GradientKind;
use crate::render::material::GradientMaterial;
use crate::render::ramp::{ColorRamp, ColorRampCache};
use crate::render::uniform::{DirtyRegions, UniformBlock};
use crate::render::RenderState;

use super::program_name;

/// Bind group slot of the uniform block.
pub const UNIFORM_BINDING: u32 = 0;
/// Bind group slot of the color ramp texture.
pub const RAMP_BINDING: u32 = 1;
/// Bind group slot of the color ramp sampler.
pub const RAMP_SAMPLER_BINDING: u32 = 2;

/// Uniform-buffer backend shader.
///
/// Owns the CPU copy of its uniform block. Each update rewrites only the
/// regions whose inputs changed and records them as dirty; the renderer
/// drains the mask and uploads just those byte ranges.
#[derive(Debug)]
pub struct ModernShader {
    kind: GradientKind,
    block: UniformBlock,
}

impl ModernShader {
    pub(crate) fn new(kind: GradientKind) -> Self {
        debug_assert_ne!(kind, GradientKind::Stops);
        Self { kind, block: UniformBlock::new() }
    }

    #[inline]
    pub fn kind(&self) -> GradientKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        program_name(self.kind)
    }

    /// WGSL source with `vs_main` / `fs_main` entry points.
    pub fn source(&self) -> &'static str {
        match self.kind {
            GradientKind::Radial => include_str!("wgsl/gradientradial.wgsl"),
            GradientKind::Conic => include_str!("wgsl/gradientconic.wgsl"),
            GradientKind::Linear | GradientKind::Stops => include_str!("wgsl/gradientlinear.wgsl"),
        }
    }

    /// Packs `new` into the block.
    ///
    /// The matrix and opacity are written when the renderer flags them dirty.
    /// Payload fields are written when they differ from `old`, the material
    /// this shader packed last; `None` writes them all. Returns whether any
    /// byte was rewritten.
    pub fn update_uniform_data(
        &mut self,
        state: &RenderState,
        new: &GradientMaterial,
        old: Option<&GradientMaterial>,
    ) -> bool {
        debug_assert_eq!(new.kind(), self.kind, "material kind does not match shader");

        let mut changed = false;

        if state.matrix_dirty {
            self.block.write_matrix(&state.matrix);
            changed = true;
        }

        let payload = new.payload();
        let previous = old.filter(|m| m.kind() == self.kind).map(GradientMaterial::payload);

        for (i, field) in payload.fields().iter().enumerate() {
            let stale = previous
                .as_ref()
                .and_then(|p| p.fields().get(i))
                .is_none_or(|prev| prev.value != field.value);

            if stale {
                self.block.write_field(field);
                changed = true;
            }
        }

        if state.opacity_dirty {
            self.block.write_opacity(state.opacity);
            changed = true;
        }

        changed
    }

    /// Resolves the texture for a sampled-image `binding`.
    ///
    /// Only [`RAMP_BINDING`] carries an image; the ramp is looked up with the
    /// state's context so it is never shared across devices.
    pub fn update_sampled_image(
        &self,
        binding: u32,
        state: &RenderState,
        cache: &ColorRampCache,
        material: &GradientMaterial,
    ) -> Option<Arc<ColorRamp>> {
        if binding != RAMP_BINDING {
            return None;
        }
        Some(cache.color_ramp(state.context, material.stops(), material.spread()))
    }

    #[inline]
    pub fn uniform_block(&self) -> &UniformBlock {
        &self.block
    }

    /// Returns and clears the regions written since the previous call.
    #[inline]
    pub fn take_dirty(&mut self) -> DirtyRegions {
        self.block.take_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Mat4, Rect, Vec2};
    use crate::paint::{
        Color, ConicDirection, Gradient, GradientStops, LinearDirection, RadialDirection,
    };
    use crate::render::uniform::{OPACITY_OFFSET, PAYLOAD_OFFSET};
    use crate::render::ContextId;

    fn stops() -> GradientStops {
        GradientStops::two(
            Color::from_premul(0.0, 0.0, 0.0, 1.0),
            Color::from_premul(1.0, 1.0, 1.0, 1.0),
        )
    }

    fn material_for(gradient: &Gradient, rect: Rect) -> GradientMaterial {
        let mut m = GradientMaterial::for_kind(gradient.kind()).unwrap();
        m.update_gradient(rect, gradient);
        m
    }

    fn linear_material() -> GradientMaterial {
        let g = Gradient::linear(LinearDirection::horizontal(), stops());
        material_for(&g, Rect::new(0.0, 0.0, 100.0, 50.0))
    }

    // ── packing ───────────────────────────────────────────────────────────

    #[test]
    fn first_update_writes_every_region() {
        let mut shader = ModernShader::new(GradientKind::Linear);
        let state = RenderState::initial(ContextId::NONE, Mat4::translation(1.0, 2.0), 0.5);
        let m = linear_material();

        assert!(shader.update_uniform_data(&state, &m, None));
        assert_eq!(shader.take_dirty(), DirtyRegions::ALL);

        let block = shader.uniform_block();
        assert_eq!(block.f32_at(48), 1.0);
        assert_eq!(block.f32_at(PAYLOAD_OFFSET + 8), 100.0);
        assert_eq!(block.f32_at(OPACITY_OFFSET), 0.5);
    }

    #[test]
    fn opacity_only_update_touches_only_opacity_bytes() {
        let mut shader = ModernShader::new(GradientKind::Linear);
        let m = linear_material();
        let first = RenderState::initial(ContextId::NONE, Mat4::translation(1.0, 2.0), 1.0);
        shader.update_uniform_data(&first, &m, None);
        shader.take_dirty();
        let before: Vec<u8> = shader.uniform_block().as_bytes()[..OPACITY_OFFSET].to_vec();

        let mut next = RenderState::clean(ContextId::NONE, first.matrix, 0.25);
        next.opacity_dirty = true;
        assert!(shader.update_uniform_data(&next, &m, Some(&m)));

        assert_eq!(shader.take_dirty(), DirtyRegions::OPACITY);
        assert_eq!(&shader.uniform_block().as_bytes()[..OPACITY_OFFSET], &before[..]);
        assert_eq!(shader.uniform_block().f32_at(OPACITY_OFFSET), 0.25);
    }

    #[test]
    fn clean_state_and_same_material_write_nothing() {
        let mut shader = ModernShader::new(GradientKind::Linear);
        let m = linear_material();
        shader.update_uniform_data(&RenderState::initial(ContextId::NONE, Mat4::IDENTITY, 1.0), &m, None);
        shader.take_dirty();

        let clean = RenderState::clean(ContextId::NONE, Mat4::IDENTITY, 1.0);
        assert!(!shader.update_uniform_data(&clean, &m, Some(&m)));
        assert!(shader.take_dirty().is_empty());
    }

    #[test]
    fn radial_and_conic_pack_fields_at_their_offsets() {
        let rect = Rect::new(0.0, 0.0, 200.0, 100.0);
        let state = RenderState::initial(ContextId::NONE, Mat4::IDENTITY, 1.0);

        let radial = material_for(
            &Gradient::radial(RadialDirection::new(Vec2::splat(0.5), 0.25), stops()),
            rect,
        );
        let mut shader = ModernShader::new(GradientKind::Radial);
        shader.update_uniform_data(&state, &radial, None);
        let b = shader.uniform_block();
        assert_eq!([b.f32_at(64), b.f32_at(68)], [100.0, 50.0]);
        assert_eq!([b.f32_at(72), b.f32_at(76)], [50.0, 25.0]);

        let conic = material_for(
            &Gradient::conic(ConicDirection::new(Vec2::splat(0.5), -90.0, 180.0), stops()),
            rect,
        );
        let mut shader = ModernShader::new(GradientKind::Conic);
        shader.update_uniform_data(&state, &conic, None);
        let b = shader.uniform_block();
        assert_eq!([b.f32_at(64), b.f32_at(68)], [100.0, 50.0]);
        assert_eq!(b.f32_at(72), 0.75);
        assert_eq!(b.f32_at(76), 0.5);
    }

    #[test]
    fn changed_geometry_rewrites_payload_only() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let old = material_for(&Gradient::conic(ConicDirection::new(Vec2::splat(0.5), 0.0, 90.0), stops()), rect);
        let new = material_for(&Gradient::conic(ConicDirection::new(Vec2::splat(0.5), 0.0, 180.0), stops()), rect);

        let mut shader = ModernShader::new(GradientKind::Conic);
        shader.update_uniform_data(&RenderState::initial(ContextId::NONE, Mat4::IDENTITY, 1.0), &old, None);
        shader.take_dirty();

        let clean = RenderState::clean(ContextId::NONE, Mat4::IDENTITY, 1.0);
        assert!(shader.update_uniform_data(&clean, &new, Some(&old)));
        assert_eq!(shader.take_dirty(), DirtyRegions::PAYLOAD);
        assert_eq!(shader.uniform_block().f32_at(76), 0.5);
    }

    // ── sampled image ─────────────────────────────────────────────────────

    #[test]
    fn ramp_is_resolved_only_for_its_binding() {
        let shader = ModernShader::new(GradientKind::Linear);
        let cache = ColorRampCache::new();
        let ctx = ContextId::from_raw(3);
        let state = RenderState::initial(ctx, Mat4::IDENTITY, 1.0);
        let m = linear_material();

        assert!(shader.update_sampled_image(UNIFORM_BINDING, &state, &cache, &m).is_none());

        let a = shader.update_sampled_image(RAMP_BINDING, &state, &cache, &m).unwrap();
        let b = shader.update_sampled_image(RAMP_BINDING, &state, &cache, &m).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.context(), ctx);
    }

    #[test]
    fn sources_declare_entry_points() {
        for kind in [GradientKind::Linear, GradientKind::Radial, GradientKind::Conic] {
            let src = ModernShader::new(kind).source();
            assert!(src.contains("fn vs_main") && src.contains("fn fs_main"));
        }
    }
}
