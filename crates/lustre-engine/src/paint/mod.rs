//! Paint model shared between styling code and renderers.
//!
//! Scope:
//! - color representation (linear premultiplied alpha)
//! - gradient descriptors (stops, spread, per-kind geometry)
//!
//! Geometry types remain in `coords`.

pub mod color;
pub mod gradient;

pub use color::Color;
pub use gradient::{
    ConicDirection, Gradient, GradientDirection, GradientKind, GradientStop, GradientStops,
    LinearDirection, RadialDirection, SpreadMode,
};

/// Paint source for filling geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Gradient(Gradient),
}

impl Paint {
    #[inline]
    pub fn solid(color: Color) -> Self {
        Paint::Solid(color)
    }

    #[inline]
    pub fn gradient(&self) -> Option<&Gradient> {
        match self {
            Paint::Gradient(g) => Some(g),
            Paint::Solid(_) => None,
        }
    }
}
