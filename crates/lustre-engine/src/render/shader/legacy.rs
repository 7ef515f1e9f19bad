use crate::paint::GradientKind;
use crate::render::material::{payload_names, GradientMaterial};
use crate::render::ramp::{ColorRamp, ColorRampCache};
use crate::render::uniform::UniformValue;
use crate::render::{ContextId, RenderState};

use super::program_name;

/// Host-side program object of the legacy pipeline.
///
/// Locations follow the usual convention: `None` means the program does not
/// use the uniform and writes to it are skipped.
pub trait LegacyProgram {
    fn uniform_location(&self, name: &str) -> Option<i32>;
    fn set_uniform(&mut self, location: i32, value: UniformValue);
    fn bind_texture(&mut self, unit: u32, ramp: &ColorRamp);
}

/// Named-uniform backend shader.
#[derive(Debug)]
pub struct LegacyShader {
    kind: GradientKind,
    matrix_id: Option<i32>,
    opacity_id: Option<i32>,
    payload_ids: [Option<i32>; 3],
}

impl LegacyShader {
    pub(crate) fn new(kind: GradientKind) -> Self {
        debug_assert_ne!(kind, GradientKind::Stops);
        Self { kind, matrix_id: None, opacity_id: None, payload_ids: [None; 3] }
    }

    #[inline]
    pub fn kind(&self) -> GradientKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        program_name(self.kind)
    }

    pub fn vertex_source(&self) -> &'static str {
        include_str!("glsl/gradient.vert")
    }

    pub fn fragment_source(&self) -> &'static str {
        match self.kind {
            GradientKind::Radial => include_str!("glsl/gradientradial.frag"),
            GradientKind::Conic => include_str!("glsl/gradientconic.frag"),
            GradientKind::Linear | GradientKind::Stops => include_str!("glsl/gradientlinear.frag"),
        }
    }

    /// Vertex attribute names in binding order.
    pub fn attribute_names(&self) -> &'static [&'static str] {
        &["vertexCoord"]
    }

    /// Resolves uniform locations once the host has linked the program.
    pub fn initialize(&mut self, program: &dyn LegacyProgram) {
        self.matrix_id = program.uniform_location("matrix");
        self.opacity_id = program.uniform_location("opacity");

        let program_name = self.name();
        self.payload_ids = [None; 3];
        for (id, name) in self.payload_ids.iter_mut().zip(payload_names(self.kind)) {
            *id = program.uniform_location(name);
            if id.is_none() {
                log::debug!("{program_name}: program has no `{name}` uniform");
            }
        }
    }

    /// Sets per-draw uniforms and binds the color ramp to texture unit 0.
    ///
    /// Opacity and matrix are only written when flagged dirty; the payload is
    /// written on every call. Ramps are resolved against the null context.
    pub fn update_state(
        &self,
        program: &mut dyn LegacyProgram,
        state: &RenderState,
        material: &GradientMaterial,
        cache: &ColorRampCache,
    ) {
        debug_assert_eq!(material.kind(), self.kind, "material kind does not match shader");

        if state.opacity_dirty {
            if let Some(id) = self.opacity_id {
                program.set_uniform(id, UniformValue::Float(state.opacity));
            }
        }

        if state.matrix_dirty {
            if let Some(id) = self.matrix_id {
                program.set_uniform(id, UniformValue::Mat4(state.matrix));
            }
        }

        for (id, field) in self.payload_ids.iter().zip(material.payload().fields()) {
            if let Some(id) = *id {
                program.set_uniform(id, field.value);
            }
        }

        let ramp = cache.color_ramp(ContextId::NONE, material.stops(), material.spread());
        program.bind_texture(0, &ramp);
    }
}
