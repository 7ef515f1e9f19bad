//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - assigning the device its render [`ContextId`](crate::render::ContextId)
//! - releasing that context's ramps when the device goes away

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
