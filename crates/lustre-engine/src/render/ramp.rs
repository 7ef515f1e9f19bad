//! Color ramps and their process-shared cache.
//!
//! A ramp is a 256x1 premultiplied RGBA8 lookup texture sampled by the
//! gradient shaders. Ramps are deduplicated per (context, stops, spread), so
//! every drawable using the same gradient colors on the same device shares a
//! single texture.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::paint::{Color, GradientStops, SpreadMode};

use super::ContextId;

/// Number of texels in every ramp.
pub const RAMP_WIDTH: u32 = 256;

/// Texture addressing derived from a [`SpreadMode`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl From<SpreadMode> for WrapMode {
    fn from(spread: SpreadMode) -> Self {
        match spread {
            SpreadMode::Pad => WrapMode::ClampToEdge,
            SpreadMode::Repeat => WrapMode::Repeat,
            SpreadMode::Reflect => WrapMode::MirroredRepeat,
        }
    }
}

impl WrapMode {
    pub fn address_mode(self) -> wgpu::AddressMode {
        match self {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }

    /// Folds an arbitrary ramp coordinate into [0, 1].
    pub fn resolve(self, t: f32) -> f32 {
        if !t.is_finite() {
            return 0.0;
        }
        match self {
            WrapMode::ClampToEdge => t.clamp(0.0, 1.0),
            WrapMode::Repeat => t - t.floor(),
            WrapMode::MirroredRepeat => {
                let m = t.rem_euclid(2.0);
                if m > 1.0 { 2.0 - m } else { m }
            }
        }
    }
}

/// GPU side of a ramp, created on first upload.
#[derive(Debug)]
pub struct GpuRamp {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

static NEXT_RAMP_ID: AtomicU64 = AtomicU64::new(1);

/// A generated color ramp, owned by [`ColorRampCache`].
#[derive(Debug)]
pub struct ColorRamp {
    id: u64,
    context: ContextId,
    wrap: WrapMode,
    texels: Vec<[u8; 4]>,
    gpu: OnceLock<GpuRamp>,
}

impl ColorRamp {
    /// Samples `stops` at [`RAMP_WIDTH`] uniform positions.
    ///
    /// Empty stops produce a transparent ramp, a single stop a solid one.
    pub fn new(context: ContextId, stops: &GradientStops, spread: SpreadMode) -> Self {
        let last = (RAMP_WIDTH - 1) as f32;
        let texels = (0..RAMP_WIDTH)
            .map(|i| stops.color_at(i as f32 / last).to_rgba8())
            .collect();

        Self {
            id: NEXT_RAMP_ID.fetch_add(1, Ordering::Relaxed),
            context,
            wrap: spread.into(),
            texels,
            gpu: OnceLock::new(),
        }
    }

    /// Process-unique id; a replacement ramp for the same key gets a new one.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn context(&self) -> ContextId {
        self.context
    }

    #[inline]
    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap
    }

    #[inline]
    pub fn filter(&self) -> wgpu::FilterMode {
        wgpu::FilterMode::Linear
    }

    #[inline]
    pub fn width(&self) -> u32 {
        RAMP_WIDTH
    }

    #[inline]
    pub fn texels(&self) -> &[[u8; 4]] {
        &self.texels
    }

    /// CPU equivalent of the shader lookup: wrap, then linear filtering
    /// between the two nearest texels.
    pub fn sample(&self, t: f32) -> Color {
        let pos = self.wrap.resolve(t) * (RAMP_WIDTH - 1) as f32;
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(self.texels.len() - 1);
        let c0 = Color::from_premul_rgba8(self.texels[i0]);
        let c1 = Color::from_premul_rgba8(self.texels[i1]);
        c0.lerp(c1, pos - i0 as f32)
    }

    #[inline]
    pub fn is_uploaded(&self) -> bool {
        self.gpu.get().is_some()
    }

    /// Returns the GPU texture, creating and filling it on first use.
    ///
    /// `device` must belong to [`context`](Self::context).
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> &GpuRamp {
        self.gpu.get_or_init(|| {
            log::trace!("uploading color ramp {} for context {:?}", self.id, self.context);

            let size = wgpu::Extent3d { width: RAMP_WIDTH, height: 1, depth_or_array_layers: 1 };
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("lustre color ramp"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&self.texels),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(RAMP_WIDTH * 4),
                    rows_per_image: Some(1),
                },
                size,
            );

            let address_mode = self.wrap.address_mode();
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("lustre color ramp sampler"),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: self.filter(),
                min_filter: self.filter(),
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            });

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            GpuRamp { texture, view, sampler }
        })
    }
}

/// Cache key. Floats are compared by bit pattern so `Eq` and `Hash` agree.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct RampKey {
    context: ContextId,
    spread: SpreadMode,
    stops: Box<[([u32; 4], u32)]>,
}

impl RampKey {
    fn new(context: ContextId, stops: &GradientStops, spread: SpreadMode) -> Self {
        Self {
            context,
            spread,
            stops: stops.iter().map(|s| s.to_bits()).collect(),
        }
    }
}

#[derive(Default)]
struct CacheInner {
    table: HashMap<RampKey, Arc<ColorRamp>>,
    contexts: Vec<ContextId>,
}

/// Shared store of color ramps keyed by (context, stops, spread).
///
/// Lookup-or-insert is serialized, so one cache can be shared by render
/// threads driving different contexts. Entries live until their context is
/// released or the cache is cleared; an `Arc` held past that point keeps a
/// valid ramp that the cache will no longer hand out.
#[derive(Default)]
pub struct ColorRampCache {
    inner: Mutex<CacheInner>,
}

impl ColorRampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ramp for the key, synthesizing it on first request.
    pub fn color_ramp(
        &self,
        context: ContextId,
        stops: &GradientStops,
        spread: SpreadMode,
    ) -> Arc<ColorRamp> {
        let key = RampKey::new(context, stops, spread);
        let mut inner = self.inner.lock();

        if let Some(ramp) = inner.table.get(&key) {
            return Arc::clone(ramp);
        }

        let ramp = Arc::new(ColorRamp::new(context, stops, spread));
        log::debug!(
            "color ramp {} created ({} stops, {:?}, context {:?})",
            ramp.id(),
            stops.len(),
            spread,
            context
        );
        inner.table.insert(key, Arc::clone(&ramp));

        if !context.is_null() && !inner.contexts.contains(&context) {
            inner.contexts.push(context);
        }

        ramp
    }

    /// Evicts every ramp created for `context`; returns how many were dropped.
    ///
    /// Call when the context's device is destroyed, so a later context reusing
    /// the same handle never receives stale textures.
    pub fn release_context(&self, context: ContextId) -> usize {
        let mut inner = self.inner.lock();

        let before = inner.table.len();
        inner.table.retain(|key, _| key.context != context);
        inner.contexts.retain(|c| *c != context);

        let evicted = before - inner.table.len();
        log::debug!("released context {context:?}: {evicted} color ramps evicted");
        evicted
    }

    /// Whether `context` has ramps registered for teardown.
    pub fn is_tracking(&self, context: ContextId) -> bool {
        self.inner.lock().contexts.contains(&context)
    }

    /// Drops every cached ramp.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.table.clear();
        inner.contexts.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ColorRampCache {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.table.is_empty() {
            log::debug!("color ramp cache dropped with {} entries", inner.table.len());
        }
    }
}
