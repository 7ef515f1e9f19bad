//! Lustre engine crate.
//!
//! Gradient paint materials and their wgpu renderer: color ramp caching,
//! per-kind materials, uniform packing for the legacy and modern shader
//! backends, and a headless device layer.

pub mod coords;
pub mod device;
pub mod logging;
pub mod paint;
pub mod render;
