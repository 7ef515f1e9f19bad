use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::{Mat4, Rect};
use crate::paint::{Color, GradientKind};

use super::node::GradientNode;
use super::ramp::{ColorRamp, ColorRampCache, GpuRamp};
use super::material::GradientMaterial;
use super::shader::{ModernShader, RAMP_BINDING, RAMP_SAMPLER_BINDING, UNIFORM_BINDING};
use super::uniform::{DirtyRegions, UNIFORM_BUFFER_SIZE};
use super::{ContextId, RenderCtx, RenderState, RenderTarget};

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Renderer configuration.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct GradientRendererConfig {
    /// Clear color for the pass; `None` loads the existing target contents.
    pub clear: Option<Color>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GradientVertex {
    pos: [f32; 2], // logical px
}

impl GradientVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GradientVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

fn kind_slot(kind: GradientKind) -> Option<usize> {
    match kind {
        GradientKind::Linear => Some(0),
        GradientKind::Radial => Some(1),
        GradientKind::Conic => Some(2),
        GradientKind::Stops => None,
    }
}

struct KindPipeline {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// CPU side of a node's uniform block: the shader that packs it and the
/// values it last packed.
struct UniformTracker {
    shader: ModernShader,
    packed: Option<GradientMaterial>,
    last_matrix: Option<Mat4>,
    last_opacity: Option<f32>,
}

impl UniformTracker {
    fn new(kind: GradientKind) -> Self {
        Self { shader: ModernShader::new(kind), packed: None, last_matrix: None, last_opacity: None }
    }

    /// Per-draw state; matrix and opacity are dirty when their bits differ
    /// from the last packed values.
    fn draw_state(&self, context: ContextId, matrix: Mat4, opacity: f32) -> RenderState {
        RenderState {
            context,
            matrix,
            opacity,
            matrix_dirty: self.last_matrix.is_none_or(|m| m.as_bytes() != matrix.as_bytes()),
            opacity_dirty: self.last_opacity.is_none_or(|o| o.to_bits() != opacity.to_bits()),
        }
    }

    /// Packs `state` and `material` into the shader's block.
    ///
    /// Returns the regions to upload, or `None` when nothing was rewritten.
    fn pack(&mut self, state: &RenderState, material: &GradientMaterial) -> Option<DirtyRegions> {
        let changed = self.shader.update_uniform_data(state, material, self.packed.as_ref());

        self.last_matrix = Some(state.matrix);
        self.last_opacity = Some(state.opacity);
        if self.packed.as_ref() != Some(material) {
            self.packed = Some(material.clone());
        }

        let dirty = self.shader.take_dirty();
        (changed && !dirty.is_empty()).then_some(dirty)
    }
}

/// Per-node GPU state: uniform and vertex buffers plus the bind group of the
/// ramp the node was last drawn with.
pub(crate) struct NodeGpu {
    context: ContextId,
    uniforms: UniformTracker,
    ubo: wgpu::Buffer,
    vbo: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    ramp: Option<Arc<ColorRamp>>,
    last_rect: Option<Rect>,
}

impl NodeGpu {
    fn new(ctx: &RenderCtx<'_>, kind: GradientKind) -> Self {
        let ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lustre gradient ubo"),
            size: UNIFORM_BUFFER_SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vbo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lustre gradient vbo"),
            size: (4 * std::mem::size_of::<GradientVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            context: ctx.context,
            uniforms: UniformTracker::new(kind),
            ubo,
            vbo,
            bind_group: None,
            ramp: None,
            last_rect: None,
        }
    }
}

/// Draws [`GradientNode`]s with the modern uniform-buffer shaders.
///
/// Pipelines are created lazily per gradient kind and surface format. Per
/// node, only the uniform regions that changed are uploaded, and the bind
/// group is rebuilt only when the resolved ramp changes.
#[derive(Default)]
pub struct GradientRenderer {
    config: GradientRendererConfig,
    pipelines: [Option<KindPipeline>; 3],
    quad_ibo: Option<wgpu::Buffer>,
}

impl GradientRenderer {
    pub fn new(config: GradientRendererConfig) -> Self {
        Self { config, ..Default::default() }
    }

    #[inline]
    pub fn config(&self) -> &GradientRendererConfig {
        &self.config
    }

    /// Uploads changed state for every node, then draws them in order in one pass.
    ///
    /// Nodes without a material or with an empty rect are skipped. Returns the
    /// number of nodes drawn.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        cache: &ColorRampCache,
        nodes: &mut [GradientNode],
    ) -> usize {
        if !ctx.viewport.is_valid() {
            log::debug!("skipping gradient pass for empty viewport {:?}", ctx.viewport);
            return 0;
        }

        self.ensure_index_buffer(ctx);

        let mut drawable = Vec::with_capacity(nodes.len());
        for node in nodes.iter_mut() {
            drawable.push(self.prepare(ctx, cache, node));
        }

        let count = drawable.iter().filter(|d| **d).count();
        if count == 0 && self.config.clear.is_none() {
            return 0;
        }

        let Some(quad_ibo) = self.quad_ibo.as_ref() else { return 0 };

        let load = match self.config.clear {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: c.r as f64,
                g: c.g as f64,
                b: c.b as f64,
                a: c.a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lustre gradient pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);

        let mut drawn = 0;
        for (node, _) in nodes.iter().zip(&drawable).filter(|(_, d)| **d) {
            let Some(material) = node.material.as_ref() else { continue };
            let Some(gpu) = node.gpu.as_ref() else { continue };
            let Some(bind_group) = gpu.bind_group.as_ref() else { continue };
            let Some(pipe) = kind_slot(material.kind()).and_then(|i| self.pipelines[i].as_ref())
            else {
                continue;
            };

            rpass.set_pipeline(&pipe.pipeline);
            rpass.set_bind_group(0, bind_group, &[]);
            rpass.set_vertex_buffer(0, gpu.vbo.slice(..));
            rpass.draw_indexed(0..6, 0, 0..1);
            drawn += 1;
        }

        drawn
    }

    fn prepare(&mut self, ctx: &RenderCtx<'_>, cache: &ColorRampCache, node: &mut GradientNode) -> bool {
        let Some(material) = node.material.as_ref() else { return false };
        if node.rect.is_empty() {
            return false;
        }

        let kind = material.kind();
        let Some(slot) = kind_slot(kind) else { return false };
        self.ensure_pipeline(ctx, kind, slot);
        let Some(pipe) = self.pipelines[slot].as_ref() else { return false };

        // Buffers from another device, or a shader of another kind, are useless.
        let reusable = node
            .gpu
            .as_ref()
            .is_some_and(|g| g.context == ctx.context && g.uniforms.shader.kind() == kind);
        if !reusable {
            node.gpu = Some(NodeGpu::new(ctx, kind));
        }
        let Some(gpu) = node.gpu.as_mut() else { return false };

        let uniforms = &mut gpu.uniforms;
        let state = uniforms.draw_state(ctx.context, ctx.projection() * node.transform, node.opacity);

        if let Some(dirty) = uniforms.pack(&state, material) {
            let bytes = uniforms.shader.uniform_block().as_bytes();
            for range in dirty.ranges() {
                ctx.queue.write_buffer(&gpu.ubo, range.start as u64, &bytes[range]);
            }
        }

        if gpu.last_rect != Some(node.rect) {
            let vertices = node.rect.corners().map(|c| GradientVertex { pos: c.to_array() });
            ctx.queue.write_buffer(&gpu.vbo, 0, bytemuck::cast_slice(&vertices));
            gpu.last_rect = Some(node.rect);
        }

        let Some(ramp) = gpu.uniforms.shader.update_sampled_image(RAMP_BINDING, &state, cache, material)
        else {
            return false;
        };

        let stale = gpu.ramp.as_ref().is_none_or(|r| !Arc::ptr_eq(r, &ramp));
        if stale || gpu.bind_group.is_none() {
            let gpu_ramp = ramp.upload(ctx.device, ctx.queue);
            gpu.bind_group = Some(create_bind_group(ctx, &pipe.bind_group_layout, &gpu.ubo, gpu_ramp));
            gpu.ramp = Some(ramp);
        }

        true
    }

    fn ensure_index_buffer(&mut self, ctx: &RenderCtx<'_>) {
        if self.quad_ibo.is_some() {
            return;
        }

        self.quad_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lustre gradient quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, kind: GradientKind, slot: usize) {
        if self.pipelines[slot].as_ref().is_some_and(|p| p.format == ctx.surface_format) {
            return;
        }

        log::debug!("building {kind:?} gradient pipeline for {:?}", ctx.surface_format);

        let source = ModernShader::new(kind).source();
        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lustre gradient shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lustre gradient bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(UNIFORM_BUFFER_SIZE as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: RAMP_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: RAMP_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lustre gradient pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lustre gradient pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[GradientVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines[slot] = Some(KindPipeline { format: ctx.surface_format, pipeline, bind_group_layout });
    }
}

fn create_bind_group(
    ctx: &RenderCtx<'_>,
    layout: &wgpu::BindGroupLayout,
    ubo: &wgpu::Buffer,
    ramp: &GpuRamp,
) -> wgpu::BindGroup {
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lustre gradient bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: UNIFORM_BINDING, resource: ubo.as_entire_binding() },
            wgpu::BindGroupEntry {
                binding: RAMP_BINDING,
                resource: wgpu::BindingResource::TextureView(&ramp.view),
            },
            wgpu::BindGroupEntry {
                binding: RAMP_SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&ramp.sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{Gradient, GradientStops, LinearDirection};

    #[test]
    fn every_drawable_kind_has_a_pipeline_slot() {
        let slots: Vec<_> = [GradientKind::Linear, GradientKind::Radial, GradientKind::Conic]
            .into_iter()
            .filter_map(kind_slot)
            .collect();
        assert_eq!(slots, [0, 1, 2]);
        assert_eq!(kind_slot(GradientKind::Stops), None);
    }

    fn linear(rect: Rect) -> GradientMaterial {
        let g = Gradient::linear(
            LinearDirection::horizontal(),
            GradientStops::two(Color::from_premul(0.0, 0.0, 0.0, 1.0), Color::from_premul(1.0, 1.0, 1.0, 1.0)),
        );
        let mut m = GradientMaterial::for_kind(GradientKind::Linear).unwrap();
        m.update_gradient(rect, &g);
        m
    }

    #[test]
    fn first_draw_uploads_the_whole_block() {
        let mut uniforms = UniformTracker::new(GradientKind::Linear);
        let state = uniforms.draw_state(ContextId::NONE, Mat4::IDENTITY, 1.0);
        assert!(state.matrix_dirty && state.opacity_dirty);

        let material = linear(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(uniforms.pack(&state, &material), Some(DirtyRegions::ALL));
    }

    #[test]
    fn unchanged_frame_uploads_nothing() {
        let mut uniforms = UniformTracker::new(GradientKind::Linear);
        let material = linear(Rect::new(0.0, 0.0, 10.0, 10.0));
        let state = uniforms.draw_state(ContextId::NONE, Mat4::IDENTITY, 1.0);
        uniforms.pack(&state, &material);

        let state = uniforms.draw_state(ContextId::NONE, Mat4::IDENTITY, 1.0);
        assert!(!state.matrix_dirty && !state.opacity_dirty);
        assert_eq!(uniforms.pack(&state, &material), None);
    }

    #[test]
    fn each_change_dirties_only_its_region() {
        let mut uniforms = UniformTracker::new(GradientKind::Linear);
        let material = linear(Rect::new(0.0, 0.0, 10.0, 10.0));
        let state = uniforms.draw_state(ContextId::NONE, Mat4::IDENTITY, 1.0);
        uniforms.pack(&state, &material);

        let state = uniforms.draw_state(ContextId::NONE, Mat4::IDENTITY, 0.5);
        assert!(!state.matrix_dirty && state.opacity_dirty);
        assert_eq!(uniforms.pack(&state, &material), Some(DirtyRegions::OPACITY));

        let moved = Mat4::translation(5.0, 0.0);
        let state = uniforms.draw_state(ContextId::NONE, moved, 0.5);
        assert!(state.matrix_dirty && !state.opacity_dirty);
        assert_eq!(uniforms.pack(&state, &material), Some(DirtyRegions::MATRIX));

        let wider = linear(Rect::new(0.0, 0.0, 20.0, 10.0));
        let state = uniforms.draw_state(ContextId::NONE, moved, 0.5);
        assert_eq!(uniforms.pack(&state, &wider), Some(DirtyRegions::PAYLOAD));
        assert_eq!(uniforms.packed.as_ref(), Some(&wider));
    }

    #[test]
    fn quad_indices_cover_rect_corners() {
        let corners = Rect::new(0.0, 0.0, 1.0, 1.0).corners();
        assert!(QUAD_INDICES.iter().all(|i| (*i as usize) < corners.len()));
        assert_eq!(std::mem::size_of::<GradientVertex>(), 8);
    }
}
