//! wgpu encoding of replayed frames.
//!
//! GPU objects are created lazily, the first time a plan needs them:
//! - one shader module pair + bind group layout per program
//! - one pipeline per (program, topology, attribute layout)
//! - one static buffer per [`BufferId`], dropped once every handle to its
//!   contents is gone
//! - one uniform ring written per frame, addressed with dynamic offsets

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Weak;

use wgpu::util::DeviceExt;

use super::buffer::{BufferId, BufferKind, StaticBuffer};
use super::cmd::GpuCmd;
use super::ctx::{RenderCtx, RenderTarget};
use super::drawable::Topology;
use super::program::{LinkedProgram, ProgramId, ShaderStage};
use super::replay::{AttributeSource, DEFAULT_ATTRIBUTE, DrawPlan, FramePlan, Replay};

const UNIFORM_RING_MIN_BYTES: u64 = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    topology: Topology,
    attributes: Vec<(u32, Option<u8>)>,
}

impl PipelineKey {
    fn of(draw: &DrawPlan) -> Self {
        Self {
            program: draw.program.id(),
            topology: draw.topology,
            attributes: draw.attributes.iter().map(AttributeSource::layout_key).collect(),
        }
    }
}

struct ProgramGpu {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    layout: wgpu::PipelineLayout,
    /// Bind group plus the ring generation it points into.
    bind_group: Option<(u64, wgpu::BindGroup)>,
}

struct StaticGpuBuffer {
    buffer: wgpu::Buffer,
    alive: Weak<[u8]>,
}

struct DepthTarget {
    size: [u32; 2],
    format: wgpu::TextureFormat,
    view: wgpu::TextureView,
}

/// Replays recorded command streams onto the GPU.
#[derive(Default)]
pub struct GpuExecutor {
    replay: Replay,

    formats: Option<(wgpu::TextureFormat, wgpu::TextureFormat)>,
    programs: HashMap<ProgramId, ProgramGpu>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    buffers: HashMap<BufferId, StaticGpuBuffer>,

    uniform_ring: Option<wgpu::Buffer>,
    ring_capacity: u64,
    ring_generation: u64,

    constant_vbo: Option<wgpu::Buffer>,
    placeholder_texture: Option<wgpu::TextureView>,
    depth: Option<DepthTarget>,
}

impl GpuExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of static buffers currently resident on the GPU.
    pub fn resident_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Replays `commands` and encodes the resulting passes into `target`.
    pub fn execute(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, commands: Vec<GpuCmd>) {
        let plan = self.replay.run(commands);

        self.ensure_formats(ctx);
        self.ensure_depth(ctx);
        self.ensure_constant_buffer(ctx);
        self.evict_dead_buffers();

        for draw in plan.draws() {
            self.ensure_program(ctx, &draw.program);
            self.ensure_buffer(ctx, &draw.indices);
            for attr in &draw.attributes {
                if let AttributeSource::Stream { buffer, .. } = attr {
                    self.ensure_buffer(ctx, buffer);
                }
            }
            self.ensure_pipeline(ctx, draw);
        }

        let offsets = self.write_uniforms(ctx, &plan);
        self.ensure_bind_groups(ctx, &plan);

        self.encode(target, &plan, &offsets);
    }

    fn ensure_formats(&mut self, ctx: &RenderCtx<'_>) {
        let formats = (ctx.surface_format, ctx.depth_format);
        if self.formats == Some(formats) {
            return;
        }
        if self.formats.is_some() {
            log::debug!("target formats changed to {formats:?}; dropping pipelines");
        }
        self.pipelines.clear();
        self.formats = Some(formats);
    }

    fn ensure_depth(&mut self, ctx: &RenderCtx<'_>) {
        let size = [ctx.size[0].max(1), ctx.size[1].max(1)];
        if let Some(d) = &self.depth {
            if d.size == size && d.format == ctx.depth_format {
                return;
            }
        }

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("strata depth"),
            size: wgpu::Extent3d {
                width: size[0],
                height: size[1],
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        log::debug!("depth target {}x{} ({:?})", size[0], size[1], ctx.depth_format);

        self.depth = Some(DepthTarget {
            size,
            format: ctx.depth_format,
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        });
    }

    fn ensure_constant_buffer(&mut self, ctx: &RenderCtx<'_>) {
        if self.constant_vbo.is_some() {
            return;
        }
        self.constant_vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("strata default attribute"),
            contents: bytemuck::cast_slice(&DEFAULT_ATTRIBUTE),
            usage: wgpu::BufferUsages::VERTEX,
        }));
    }

    fn evict_dead_buffers(&mut self) {
        let before = self.buffers.len();
        self.buffers.retain(|_, b| b.alive.strong_count() > 0);
        let evicted = before - self.buffers.len();
        if evicted > 0 {
            log::debug!("released {evicted} static buffers");
        }
    }

    fn ensure_buffer(&mut self, ctx: &RenderCtx<'_>, buffer: &StaticBuffer) {
        self.buffers.entry(buffer.id()).or_insert_with(|| {
            let usage = match buffer.kind() {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            };
            log::debug!("uploading '{}' ({} bytes)", buffer.label(), buffer.contents().len());
            StaticGpuBuffer {
                buffer: ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(buffer.label()),
                    contents: buffer.contents(),
                    usage,
                }),
                alive: buffer.liveness(),
            }
        });
    }

    fn ensure_program(&mut self, ctx: &RenderCtx<'_>, program: &LinkedProgram) {
        if self.programs.contains_key(&program.id()) {
            return;
        }

        let module = |stage: &ShaderStage| {
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(stage.label()),
                source: wgpu::ShaderSource::Wgsl(stage.source().into()),
            })
        };

        let iface = program.interface();
        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let mut entries = Vec::new();
        if let Some(block) = iface.block() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(block.size)),
                },
                count: None,
            });
        }
        if let Some(binding) = iface.rendered_texture() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = (!entries.is_empty()).then(|| {
            ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(program.label()),
                entries: &entries,
            })
        });
        let groups: Vec<&wgpu::BindGroupLayout> = bind_group_layout.iter().collect();
        let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(program.label()),
            bind_group_layouts: &groups,
            immediate_size: 0,
        });

        log::debug!("created GPU program '{}'", program.label());

        self.programs.insert(
            program.id(),
            ProgramGpu {
                vertex: module(program.vertex()),
                fragment: module(program.fragment()),
                bind_group_layout,
                layout,
                bind_group: None,
            },
        );
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, draw: &DrawPlan) {
        let key = PipelineKey::of(draw);
        if self.pipelines.contains_key(&key) {
            return;
        }
        let Some(gpu) = self.programs.get(&draw.program.id()) else { return };

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = draw
            .attributes
            .iter()
            .map(|a| {
                let components = match a {
                    AttributeSource::Stream { components, .. } | AttributeSource::Constant { components, .. } => {
                        *components
                    }
                };
                [wgpu::VertexAttribute {
                    format: float_format(components),
                    offset: 0,
                    shader_location: a.location(),
                }]
            })
            .collect();

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = draw
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(a, attrs)| match a {
                AttributeSource::Stream { components, .. } => wgpu::VertexBufferLayout {
                    array_stride: u64::from(*components) * 4,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: attrs,
                },
                // One element, read by the single instance.
                AttributeSource::Constant { .. } => wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of_val(&DEFAULT_ATTRIBUTE) as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: attrs,
                },
            })
            .collect();

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(draw.program.label()),
            layout: Some(&gpu.layout),

            vertex: wgpu::VertexState {
                module: &gpu.vertex,
                entry_point: draw.program.vertex().entry_point(),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &gpu.fragment,
                entry_point: draw.program.fragment().entry_point(),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: draw.topology.to_wgpu(),
                strip_index_format: draw.topology.strip_index_format(),
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: ctx.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "created pipeline for '{}' ({:?}, attributes {:?})",
            draw.program.label(),
            key.topology,
            key.attributes
        );
        self.pipelines.insert(key, pipeline);
    }

    /// Packs each draw's uniform snapshot into the ring and returns the
    /// dynamic offset of every draw, in plan order.
    fn write_uniforms(&mut self, ctx: &RenderCtx<'_>, plan: &FramePlan) -> Vec<u32> {
        let align = ctx.device.limits().min_uniform_buffer_offset_alignment.max(1) as usize;
        let (staging, offsets) = pack_uniforms(plan, align);
        if staging.is_empty() {
            return offsets;
        }

        let needed = staging.len() as u64;
        if self.uniform_ring.is_none() || needed > self.ring_capacity {
            let capacity = needed.next_power_of_two().max(UNIFORM_RING_MIN_BYTES);
            self.uniform_ring = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("strata uniform ring"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.ring_capacity = capacity;
            self.ring_generation += 1;
            log::debug!("uniform ring resized to {capacity} bytes");
        }

        if let Some(ring) = &self.uniform_ring {
            ctx.queue.write_buffer(ring, 0, &staging);
        }
        offsets
    }

    fn ensure_bind_groups(&mut self, ctx: &RenderCtx<'_>, plan: &FramePlan) {
        for draw in plan.draws() {
            let Some(gpu) = self.programs.get_mut(&draw.program.id()) else { continue };
            let Some(bgl) = &gpu.bind_group_layout else { continue };
            if matches!(&gpu.bind_group, Some((generation, _)) if *generation == self.ring_generation) {
                continue;
            }

            let iface = draw.program.interface();
            let mut entries = Vec::new();
            if let (Some(block), Some(ring)) = (iface.block(), &self.uniform_ring) {
                entries.push(wgpu::BindGroupEntry {
                    binding: block.binding,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: ring,
                        offset: 0,
                        size: NonZeroU64::new(u64::from(block.size)),
                    }),
                });
            }
            if let Some(binding) = iface.rendered_texture() {
                let view = self
                    .placeholder_texture
                    .get_or_insert_with(|| placeholder_texture(ctx));
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&*view),
                });
            }

            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(draw.program.label()),
                layout: bgl,
                entries: &entries,
            });
            gpu.bind_group = Some((self.ring_generation, bind_group));
        }
    }

    fn encode(&self, target: &mut RenderTarget<'_>, plan: &FramePlan, offsets: &[u32]) {
        let Some(depth) = &self.depth else { return };
        let Some(constant) = &self.constant_vbo else { return };
        let mut offsets = offsets.iter().copied();

        for pass in &plan.passes {
            let color_load = match pass.clear_color {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(r),
                    g: f64::from(g),
                    b: f64::from(b),
                    a: f64::from(a),
                }),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = if pass.clear_depth {
                wgpu::LoadOp::Clear(1.0)
            } else {
                wgpu::LoadOp::Load
            };

            let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("strata pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &pass.draws {
                let offset = offsets.next().unwrap_or(0);

                let Some(pipeline) = self.pipelines.get(&PipelineKey::of(draw)) else { continue };
                let Some(index) = self.buffers.get(&draw.indices.id()) else { continue };
                let streams: Option<Vec<&wgpu::Buffer>> = draw
                    .attributes
                    .iter()
                    .map(|a| match a {
                        AttributeSource::Stream { buffer, .. } => self.buffers.get(&buffer.id()).map(|b| &b.buffer),
                        AttributeSource::Constant { .. } => Some(constant),
                    })
                    .collect();
                let Some(streams) = streams else { continue };

                rpass.set_pipeline(pipeline);

                if let Some([w, h]) = draw.viewport {
                    let (w, h) = (w.min(depth.size[0]), h.min(depth.size[1]));
                    if w > 0 && h > 0 {
                        rpass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
                    }
                }

                if let Some((_, bind_group)) = self.programs.get(&draw.program.id()).and_then(|g| g.bind_group.as_ref()) {
                    let dynamic = [offset];
                    let dynamic: &[u32] = if draw.uniforms.is_empty() { &[] } else { &dynamic };
                    rpass.set_bind_group(0, bind_group, dynamic);
                }

                for (slot, buffer) in streams.into_iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                rpass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.count, 0, 0..1);
            }
        }
    }
}

/// Lays out per-draw uniform snapshots at `align`-byte boundaries.
///
/// Returns the staging bytes and one offset per draw (0 for draws without a
/// block). The staging length is a multiple of 4 so it can be written as is.
fn pack_uniforms(plan: &FramePlan, align: usize) -> (Vec<u8>, Vec<u32>) {
    let mut staging = Vec::new();
    let mut offsets = Vec::new();

    for draw in plan.draws() {
        if draw.uniforms.is_empty() {
            offsets.push(0);
            continue;
        }
        let at = staging.len().next_multiple_of(align);
        staging.resize(at, 0);
        offsets.push(at as u32);
        staging.extend_from_slice(&draw.uniforms);
    }

    staging.resize(staging.len().next_multiple_of(4), 0);
    (staging, offsets)
}

fn float_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn placeholder_texture(ctx: &RenderCtx<'_>) -> wgpu::TextureView {
    let texture = ctx.device.create_texture_with_data(
        ctx.queue,
        &wgpu::TextureDescriptor {
            label: Some("strata placeholder texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[255, 255, 255, 255],
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GpuMesh, ScreenQuad};
    use crate::render::{RenderContext, ShaderProgram};

    const SRC: &str = r#"
        struct Uniforms { u_Time: i32, };
        @group(0) @binding(0) var<uniform> u: Uniforms;
        @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos * f32(u.u_Time); }
        @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
    "#;

    fn plan_with_times(times: &[i32]) -> FramePlan {
        let p = ShaderProgram::from_wgsl("ring", SRC).unwrap();
        let mesh = GpuMesh::upload("quad", &ScreenQuad::default().generate(), Topology::Triangles);
        let mut ctx = RenderContext::new();
        for t in times {
            p.set_time(&mut ctx, *t);
            p.draw(&mut ctx, &mesh);
        }
        Replay::new().run(ctx.take_commands())
    }

    #[test]
    fn snapshots_land_on_aligned_offsets() {
        let plan = plan_with_times(&[7, 8, 9]);
        let (staging, offsets) = pack_uniforms(&plan, 256);
        assert_eq!(offsets, vec![0, 256, 512]);
        assert_eq!(staging.len() % 4, 0);
        let at = |o: u32| {
            let o = o as usize;
            i32::from_ne_bytes([staging[o], staging[o + 1], staging[o + 2], staging[o + 3]])
        };
        assert_eq!(offsets.iter().map(|o| at(*o)).collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn empty_frame_packs_nothing() {
        let (staging, offsets) = pack_uniforms(&FramePlan::default(), 256);
        assert!(staging.is_empty());
        assert!(offsets.is_empty());
    }

    #[test]
    fn pipeline_key_separates_attribute_layouts() {
        let plan = plan_with_times(&[1]);
        let draw = plan.draws().next().unwrap();
        let mut other = draw.clone();
        other.attributes = vec![AttributeSource::Constant { location: 0, components: 4 }];
        assert_ne!(PipelineKey::of(draw), PipelineKey::of(&other));
        assert_eq!(PipelineKey::of(draw), PipelineKey::of(&draw.clone()));
    }

    #[test]
    fn float_formats_follow_width() {
        assert_eq!(float_format(2), wgpu::VertexFormat::Float32x2);
        assert_eq!(float_format(4), wgpu::VertexFormat::Float32x4);
    }
}
