//! Gradient rendering subsystem.
//!
//! Gradients are drawn by sampling a shared color ramp with a per-kind
//! shader. Materials hold the geometry, shaders pack it (into a uniform block
//! on the modern backend, into named uniforms on the legacy one) and the ramp
//! cache dedupes ramp textures per device context.
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down).
//! - Gradient directions are fractions of the node rect.

mod ctx;
pub mod factory;
pub mod material;
mod node;
pub mod ramp;
mod renderer;
pub mod shader;
pub mod uniform;

pub use ctx::{Backend, ContextId, RenderCtx, RenderState, RenderTarget};
pub use factory::{create_material, create_shader};
pub use material::GradientMaterial;
pub use node::GradientNode;
pub use ramp::{ColorRamp, ColorRampCache};
pub use renderer::{GradientRenderer, GradientRendererConfig};
pub use shader::GradientShader;
