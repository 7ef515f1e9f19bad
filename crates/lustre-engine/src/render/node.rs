use crate::coords::{Mat4, Rect};
use crate::paint::{Gradient, Paint};

use super::factory::create_material;
use super::material::GradientMaterial;
use super::renderer::NodeGpu;

/// A gradient-filled rectangle.
///
/// The material is created lazily on the first gradient update, replaced
/// when the gradient kind changes and dropped when the paint becomes solid.
/// GPU resources are attached by [`GradientRenderer`](super::GradientRenderer).
pub struct GradientNode {
    pub(super) rect: Rect,
    pub(super) opacity: f32,
    pub(super) transform: Mat4,
    pub(super) material: Option<GradientMaterial>,
    pub(super) gpu: Option<NodeGpu>,
}

impl Default for GradientNode {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            opacity: 1.0,
            transform: Mat4::IDENTITY,
            material: None,
            gpu: None,
        }
    }
}

impl GradientNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `gradient` over `rect`; returns true if the material changed.
    ///
    /// Descriptors that fail [`Gradient::is_valid`] leave nothing to draw and
    /// drop the current material.
    pub fn update(&mut self, rect: Rect, gradient: &Gradient) -> bool {
        if !gradient.is_valid() {
            log::debug!("undrawable {:?} gradient, dropping material", gradient.kind());
            return self.clear_material(rect);
        }

        let kind = gradient.kind();

        if self.material.as_ref().is_some_and(|m| m.kind() != kind) {
            self.material = None;
            self.gpu = None;
        }

        if self.material.is_none() {
            self.material = create_material(kind);
        }

        self.rect = rect;

        match self.material.as_mut() {
            Some(material) => material.update_gradient(rect, gradient),
            None => false,
        }
    }

    /// Like [`update`](Self::update), dropping the material for solid paints.
    pub fn update_paint(&mut self, rect: Rect, paint: &Paint) -> bool {
        match paint.gradient() {
            Some(gradient) => self.update(rect, gradient),
            None => self.clear_material(rect),
        }
    }

    fn clear_material(&mut self, rect: Rect) -> bool {
        self.rect = rect;
        self.gpu = None;
        self.material.take().is_some()
    }

    #[inline]
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    #[inline]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    #[inline]
    pub fn material(&self) -> Option<&GradientMaterial> {
        self.material.as_ref()
    }

    /// Whether the renderer has GPU resources for this node.
    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.gpu.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{
        Color, ConicDirection, GradientKind, GradientStop, GradientStops, LinearDirection,
    };

    fn stops() -> GradientStops {
        GradientStops::two(
            Color::from_premul(1.0, 1.0, 1.0, 1.0),
            Color::from_premul(0.0, 0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn material_is_created_on_first_update() {
        let mut node = GradientNode::new();
        assert!(node.material().is_none());

        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let g = Gradient::linear(LinearDirection::vertical(), stops());
        assert!(node.update(rect, &g));
        assert_eq!(node.material().map(|m| m.kind()), Some(GradientKind::Linear));
        assert!(!node.update(rect, &g));
    }

    #[test]
    fn kind_change_replaces_material() {
        let mut node = GradientNode::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        node.update(rect, &Gradient::linear(LinearDirection::vertical(), stops()));
        assert!(node.update(rect, &Gradient::conic(ConicDirection::default(), stops())));
        assert_eq!(node.material().map(|m| m.kind()), Some(GradientKind::Conic));
    }

    #[test]
    fn stops_only_gradient_leaves_nothing_to_draw() {
        let mut node = GradientNode::new();
        assert!(!node.update(Rect::new(0.0, 0.0, 1.0, 1.0), &Gradient::stops_only(stops())));
        assert!(node.material().is_none());
    }

    #[test]
    fn non_finite_stop_drops_material() {
        let mut node = GradientNode::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        node.update(rect, &Gradient::linear(LinearDirection::vertical(), stops()));

        let mut broken = stops();
        broken.push(GradientStop::new(f32::NAN, Color::from_premul(1.0, 1.0, 1.0, 1.0)));
        let broken = Gradient::linear(LinearDirection::vertical(), broken);
        assert!(node.update(rect, &broken));
        assert!(node.material().is_none());
        assert!(!node.update(rect, &broken));
    }

    #[test]
    fn solid_paint_drops_material() {
        let mut node = GradientNode::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        node.update(rect, &Gradient::linear(LinearDirection::vertical(), stops()));

        let solid = Paint::solid(Color::from_premul(1.0, 0.0, 0.0, 1.0));
        assert!(node.update_paint(rect, &solid));
        assert!(node.material().is_none());
        assert!(!node.update_paint(rect, &solid));
    }

    #[test]
    fn opacity_is_clamped() {
        let mut node = GradientNode::new();
        node.set_opacity(3.0);
        assert_eq!(node.opacity(), 1.0);
    }
}
