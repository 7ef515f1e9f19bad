//! Geometry types shared by materials, shaders and renderers.
//!
//! Canonical CPU space:
//! - Logical pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! Gradient geometry is authored as fractions of a bounding [`Rect`] and
//! resolved into this space by the materials.

mod mat4;
mod rect;
mod vec2;
mod viewport;

pub use mat4::Mat4;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
