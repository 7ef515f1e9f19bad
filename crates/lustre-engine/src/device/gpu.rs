use std::sync::Arc;

use anyhow::{Context, Result};

use crate::coords::Viewport;
use crate::render::{ColorRampCache, ContextId, RenderCtx};

use super::GpuInit;

/// Owns wgpu core objects for off-screen rendering.
///
/// Each `Gpu` gets a fresh [`ContextId`]. When a ramp cache is attached, the
/// ramps created for this context are evicted from it on drop.
pub struct Gpu {
    /// wgpu instance used to create the adapter.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Identity of this device for ramp caching.
    context: ContextId,

    ramps: RampCacheLease,
}

/// Releases a context's ramps from the attached cache when dropped.
struct RampCacheLease {
    context: ContextId,
    cache: Option<Arc<ColorRampCache>>,
}

impl RampCacheLease {
    fn new(context: ContextId) -> Self {
        Self { context, cache: None }
    }

    fn attach(&mut self, cache: Arc<ColorRampCache>) {
        if let Some(previous) = self.cache.replace(cache) {
            if self.cache.as_ref().is_some_and(|c| !Arc::ptr_eq(c, &previous)) {
                previous.release_context(self.context);
            }
        }
    }
}

impl Drop for RampCacheLease {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.take() {
            let evicted = cache.release_context(self.context);
            log::debug!("gpu context {} dropped, {evicted} ramps evicted", self.context.raw());
        }
    }
}

impl Gpu {
    /// Creates a headless GPU context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let GpuInit {
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lustre-engine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let context = ContextId::next();
        let info = adapter.get_info();
        log::info!("gpu context {} on {} ({:?})", context.raw(), info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            context,
            ramps: RampCacheLease::new(context),
        })
    }

    /// Blocking variant of [`Gpu::new`].
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns the wgpu instance.
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    /// Returns the selected adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns this device's context id.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Evicts this context's ramps from `cache` when the device is dropped.
    ///
    /// Attaching a different cache replaces the first, whose ramps are
    /// released immediately.
    pub fn attach_ramp_cache(&mut self, cache: Arc<ColorRampCache>) {
        self.ramps.attach(cache);
    }

    /// Builds a renderer context targeting `format` at `viewport`.
    pub fn render_ctx(&self, format: wgpu::TextureFormat, viewport: Viewport) -> RenderCtx<'_> {
        RenderCtx::new(&self.device, &self.queue, self.context, format, viewport)
    }

    /// Creates a command encoder.
    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lustre encoder"),
        })
    }

    /// Submits the recorded commands.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
