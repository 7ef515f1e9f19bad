use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coords::{Mat4, Viewport};

/// Opaque identity of a rendering context (one GPU device/session).
///
/// Used only to partition cached GPU resources and to scope their teardown.
/// The null id stands for "no context", which is what the legacy pipeline
/// resolves its color ramps against.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ContextId(Option<NonZeroU64>);

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    pub const NONE: ContextId = ContextId(None);

    /// Allocates a process-unique, non-null id.
    pub fn next() -> Self {
        Self(NonZeroU64::new(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)))
    }

    /// Wraps a raw handle supplied by a host backend; `0` is the null id.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(NonZeroU64::new(raw))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0.map_or(0, NonZeroU64::get)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_none()
    }
}

/// Rendering pipeline family a shader is built for.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Backend {
    /// Program objects with individually named uniform locations.
    Legacy,
    /// A single packed uniform buffer per draw plus sampled-image bindings.
    #[default]
    Modern,
}

/// Renderer-supplied per-draw state consumed by shaders.
///
/// `matrix_dirty` / `opacity_dirty` tell the shader whether the renderer's
/// copy of the value changed since this shader last saw it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderState {
    pub context: ContextId,
    pub matrix: Mat4,
    pub opacity: f32,
    pub matrix_dirty: bool,
    pub opacity_dirty: bool,
}

impl RenderState {
    /// State with everything flagged dirty, as for the first draw of a shader.
    pub fn initial(context: ContextId, matrix: Mat4, opacity: f32) -> Self {
        Self { context, matrix, opacity, matrix_dirty: true, opacity_dirty: true }
    }

    /// State with nothing flagged dirty.
    pub fn clean(context: ContextId, matrix: Mat4, opacity: f32) -> Self {
        Self { context, matrix, opacity, matrix_dirty: false, opacity_dirty: false }
    }
}

/// Renderer-facing context (device/queue + surface format + viewport).
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub context: ContextId,
    pub surface_format: wgpu::TextureFormat,
    pub viewport: Viewport, // logical px
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        context: ContextId,
        surface_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        Self { device, queue, context, surface_format, viewport }
    }

    /// Logical-pixel to clip-space projection for the current viewport.
    #[inline]
    pub fn projection(&self) -> Mat4 {
        Mat4::viewport_ortho(self.viewport.width, self.viewport.height)
    }
}

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_context_ids_are_unique_and_non_null() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
        assert!(!a.is_null() && !b.is_null());
    }

    #[test]
    fn raw_zero_is_the_null_context() {
        assert_eq!(ContextId::from_raw(0), ContextId::NONE);
        assert_eq!(ContextId::from_raw(42).raw(), 42);
    }
}
