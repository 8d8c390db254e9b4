//! CPU replay of a recorded command stream.
//!
//! [`Replay`] tracks the bind-then-draw state a stream manipulates (active
//! program, current array/element buffers, enabled attributes, per-program
//! uniform storage) and turns each `DrawElements` into a self-contained
//! [`DrawPlan`]. State persists across frames, like the GPU state it models.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::buffer::{BufferId, BufferKind, StaticBuffer};
use super::cmd::GpuCmd;
use super::drawable::Topology;
use super::program::{LinkedProgram, ProgramId};

/// Value read by a declared attribute with no enabled stream.
pub const DEFAULT_ATTRIBUTE: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Where a program's vertex input reads from during one draw.
#[derive(Debug, Clone)]
pub enum AttributeSource {
    Stream {
        location: u32,
        components: u8,
        buffer: StaticBuffer,
    },
    /// Reads [`DEFAULT_ATTRIBUTE`]; `components` is the shader's declared width.
    Constant { location: u32, components: u8 },
}

impl AttributeSource {
    pub fn location(&self) -> u32 {
        match self {
            AttributeSource::Stream { location, .. } | AttributeSource::Constant { location, .. } => *location,
        }
    }

    /// `(location, Some(stream components))` or `(location, None)` for constants.
    pub fn layout_key(&self) -> (u32, Option<u8>) {
        match self {
            AttributeSource::Stream { location, components, .. } => (*location, Some(*components)),
            AttributeSource::Constant { location, .. } => (*location, None),
        }
    }
}

/// Everything needed to encode one indexed draw.
#[derive(Debug, Clone)]
pub struct DrawPlan {
    pub program: Arc<LinkedProgram>,
    pub topology: Topology,
    pub count: u32,
    pub indices: StaticBuffer,
    /// One entry per program vertex input, sorted by location.
    pub attributes: Vec<AttributeSource>,
    /// Snapshot of the program's uniform block at draw time. Empty when the
    /// program declares no block.
    pub uniforms: Vec<u8>,
    pub viewport: Option<[u32; 2]>,
}

/// Draws sharing one render pass.
#[derive(Debug, Clone, Default)]
pub struct PassPlan {
    /// `Some` clears color to this value on load; `None` keeps what is there.
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: bool,
    pub draws: Vec<DrawPlan>,
}

impl PassPlan {
    fn is_empty(&self) -> bool {
        self.clear_color.is_none() && !self.clear_depth && self.draws.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub passes: Vec<PassPlan>,
}

impl FramePlan {
    pub fn draws(&self) -> impl Iterator<Item = &DrawPlan> {
        self.passes.iter().flat_map(|p| p.draws.iter())
    }

    /// Every static buffer id the frame reads.
    pub fn buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.draws().flat_map(|d| {
            std::iter::once(d.indices.id()).chain(d.attributes.iter().filter_map(|a| match a {
                AttributeSource::Stream { buffer, .. } => Some(buffer.id()),
                AttributeSource::Constant { .. } => None,
            }))
        })
    }
}

/// Replay state carried from frame to frame.
#[derive(Debug, Default)]
pub struct Replay {
    program: Option<Arc<LinkedProgram>>,
    blocks: HashMap<ProgramId, Vec<u8>>,
    array_buffer: Option<StaticBuffer>,
    element_buffer: Option<StaticBuffer>,
    enabled: BTreeMap<u32, (StaticBuffer, u8)>,
    viewport: Option<[u32; 2]>,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active_program(&self) -> Option<ProgramId> {
        self.program.as_ref().map(|p| p.id())
    }

    /// Applies `commands` in order and returns the resulting passes.
    pub fn run(&mut self, commands: Vec<GpuCmd>) -> FramePlan {
        let mut passes = vec![PassPlan::default()];

        for cmd in commands {
            match cmd {
                GpuCmd::UseProgram(program) => {
                    if let Some(layout) = program.interface().block() {
                        self.blocks
                            .entry(program.id())
                            .or_insert_with(|| vec![0; layout.size as usize]);
                    }
                    self.program = Some(program);
                }
                GpuCmd::UploadUniform { location, value } => {
                    let Some(program) = &self.program else {
                        log::warn!("uniform upload with no active program ignored");
                        continue;
                    };
                    let Some(block) = self.blocks.get_mut(&program.id()) else {
                        log::warn!("program '{}' has no uniform block; upload ignored", program.label());
                        continue;
                    };
                    let bytes = value.as_bytes();
                    let start = location.offset();
                    match block.get_mut(start..start + bytes.len()) {
                        Some(dst) => dst.copy_from_slice(bytes),
                        None => log::warn!(
                            "uniform write at {start}+{} overruns block of program '{}'",
                            bytes.len(),
                            program.label()
                        ),
                    }
                }
                GpuCmd::BindArrayBuffer(buffer) => {
                    if buffer.kind() != BufferKind::Vertex {
                        log::warn!("'{}' is not a vertex buffer; bind ignored", buffer.label());
                        continue;
                    }
                    self.array_buffer = Some(buffer);
                }
                GpuCmd::BindElementBuffer(buffer) => {
                    if buffer.kind() != BufferKind::Index {
                        log::warn!("'{}' is not an index buffer; bind ignored", buffer.label());
                        continue;
                    }
                    self.element_buffer = Some(buffer);
                }
                GpuCmd::EnableAttribute { location, components } => match &self.array_buffer {
                    Some(buffer) if (1..=4).contains(&components) => {
                        self.enabled.insert(location, (buffer.clone(), components));
                    }
                    Some(_) => log::warn!("attribute {location}: {components} components unsupported"),
                    None => log::warn!("attribute {location} enabled with no array buffer bound"),
                },
                GpuCmd::DisableAttribute { location } => {
                    self.enabled.remove(&location);
                }
                GpuCmd::DrawElements { topology, count } => {
                    if let Some(draw) = self.plan_draw(topology, count) {
                        if let Some(pass) = passes.last_mut() {
                            pass.draws.push(draw);
                        }
                    }
                }
                GpuCmd::Clear { color, depth } => {
                    let fresh = passes.last().is_some_and(|p| p.draws.is_empty());
                    if !fresh {
                        passes.push(PassPlan::default());
                    }
                    if let Some(pass) = passes.last_mut() {
                        if color.is_some() {
                            pass.clear_color = color;
                        }
                        pass.clear_depth |= depth;
                    }
                }
                GpuCmd::Viewport { width, height } => {
                    self.viewport = Some([width, height]);
                }
            }
        }

        passes.retain(|p| !p.is_empty());
        FramePlan { passes }
    }

    fn plan_draw(&self, topology: Topology, count: u32) -> Option<DrawPlan> {
        let Some(program) = &self.program else {
            log::warn!("draw with no active program skipped");
            return None;
        };
        let Some(indices) = &self.element_buffer else {
            log::warn!("draw with no element buffer bound skipped");
            return None;
        };
        if count == 0 {
            return None;
        }
        let available = (indices.contents().len() / 4) as u32;
        if count > available {
            log::warn!(
                "draw of {count} indices exceeds '{}' ({available}); skipped",
                indices.label()
            );
            return None;
        }

        let attributes = program
            .interface()
            .vertex_inputs()
            .iter()
            .map(|input| match self.enabled.get(&input.location) {
                Some((buffer, components)) => AttributeSource::Stream {
                    location: input.location,
                    components: *components,
                    buffer: buffer.clone(),
                },
                None => AttributeSource::Constant {
                    location: input.location,
                    components: input.components,
                },
            })
            .collect();

        Some(DrawPlan {
            program: Arc::clone(program),
            topology,
            count,
            indices: indices.clone(),
            attributes,
            uniforms: self.blocks.get(&program.id()).cloned().unwrap_or_default(),
            viewport: self.viewport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GpuMesh, GridDomain, GridMeshBuilder, ScreenQuad};
    use crate::render::{RenderContext, ShaderProgram, UniformSlot};
    use glam::{Vec3, Vec4};

    const SRC: &str = r#"
        struct Uniforms { u_LightPos: vec4<f32>, u_Time: i32, };
        @group(0) @binding(0) var<uniform> u: Uniforms;

        struct VsOut { @builtin(position) pos: vec4<f32>, @location(0) nor: vec4<f32>, };

        @vertex
        fn vs_main(@location(0) vs_Pos: vec4<f32>, @location(1) vs_Nor: vec4<f32>) -> VsOut {
            var o: VsOut;
            o.pos = vs_Pos + u.u_LightPos * f32(u.u_Time);
            o.nor = vs_Nor;
            return o;
        }

        @fragment
        fn fs_main(v: VsOut) -> @location(0) vec4<f32> { return v.nor; }
    "#;

    fn program() -> ShaderProgram {
        ShaderProgram::from_wgsl("replay", SRC).unwrap()
    }

    fn grid() -> GpuMesh {
        let mesh = GridMeshBuilder::new(Vec3::ZERO, GridDomain::new(0.0, 10.0, 0.0, 10.0), 3.0).generate();
        GpuMesh::upload("grid", &mesh, Topology::Triangles)
    }

    fn quad() -> GpuMesh {
        GpuMesh::upload("quad", &ScreenQuad::default().generate(), Topology::Triangles)
    }

    #[test]
    fn clears_before_any_draw_share_one_pass() {
        let mut ctx = RenderContext::new();
        ctx.clear(Some([0.2, 0.2, 0.2, 1.0]), true);
        ctx.clear(None, true);
        program().draw(&mut ctx, &grid());

        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].clear_color, Some([0.2, 0.2, 0.2, 1.0]));
        assert!(plan.passes[0].clear_depth);
        assert_eq!(plan.passes[0].draws.len(), 1);
    }

    #[test]
    fn depth_clear_after_draws_starts_a_loading_pass() {
        let p = program();
        let (bg, fg) = (quad(), grid());
        let mut ctx = RenderContext::new();
        ctx.clear(Some([0.0, 0.0, 0.0, 1.0]), true);
        p.draw(&mut ctx, &bg);
        ctx.clear(None, true);
        p.draw(&mut ctx, &fg);

        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.passes.len(), 2);
        assert_eq!(plan.passes[1].clear_color, None);
        assert!(plan.passes[1].clear_depth);
        assert_eq!(plan.passes[1].draws[0].count, 54);
    }

    #[test]
    fn clear_only_frame_keeps_its_pass() {
        let mut ctx = RenderContext::new();
        ctx.clear(Some([1.0, 0.0, 0.0, 1.0]), true);
        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.passes.len(), 1);
        assert!(plan.passes[0].draws.is_empty());
    }

    #[test]
    fn missing_stream_reads_constant_default() {
        let mut ctx = RenderContext::new();
        program().draw(&mut ctx, &quad());

        let plan = Replay::new().run(ctx.take_commands());
        let draw = plan.draws().next().unwrap();
        assert!(matches!(draw.attributes[0], AttributeSource::Stream { location: 0, components: 4, .. }));
        assert!(matches!(draw.attributes[1], AttributeSource::Constant { location: 1, components: 4 }));
    }

    #[test]
    fn uniform_blocks_are_snapshotted_per_draw() {
        let p = program();
        let mesh = grid();
        let mut ctx = RenderContext::new();
        p.set_time(&mut ctx, 1);
        p.draw(&mut ctx, &mesh);
        p.set_time(&mut ctx, 2);
        p.draw(&mut ctx, &mesh);

        let plan = Replay::new().run(ctx.take_commands());
        let at = p.interface().uniform(UniformSlot::Time).unwrap().offset();
        let times: Vec<i32> = plan
            .draws()
            .map(|d| i32::from_ne_bytes([d.uniforms[at], d.uniforms[at + 1], d.uniforms[at + 2], d.uniforms[at + 3]]))
            .collect();
        assert_eq!(times, vec![1, 2]);
    }

    #[test]
    fn uniform_values_persist_across_frames() {
        let p = program();
        let mesh = grid();
        let mut replay = Replay::new();
        let mut ctx = RenderContext::new();

        p.set_light_pos(&mut ctx, Vec4::new(1.0, 2.0, 3.0, 1.0));
        replay.run(ctx.take_commands());

        p.draw(&mut ctx, &mesh);
        let cmds = ctx.take_commands();
        assert!(!cmds.iter().any(|c| matches!(c, GpuCmd::UseProgram(_))));

        let plan = replay.run(cmds);
        let draw = plan.draws().next().unwrap();
        let light: [f32; 4] = bytemuck::pod_read_unaligned(&draw.uniforms[..16]);
        assert_eq!(light, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn degenerate_draws_are_skipped() {
        let p = program();
        let empty = GpuMesh::upload(
            "empty",
            &GridMeshBuilder::new(Vec3::ZERO, GridDomain::new(0.0, 0.0, 0.0, 0.0), 4.0).generate(),
            Topology::Triangles,
        );
        let mut ctx = RenderContext::new();
        p.draw(&mut ctx, &empty);
        ctx.draw_elements(Topology::Triangles, 3);

        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.draws().count(), 0);
    }

    #[test]
    fn draws_without_a_clear_load_existing_contents() {
        let mut ctx = RenderContext::new();
        program().draw(&mut ctx, &grid());
        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].clear_color, None);
        assert!(!plan.passes[0].clear_depth);
    }

    #[test]
    fn viewport_is_captured_by_later_draws() {
        let mut ctx = RenderContext::new();
        ctx.viewport(320, 200);
        program().draw(&mut ctx, &grid());
        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.draws().next().unwrap().viewport, Some([320, 200]));
    }

    #[test]
    fn buffer_ids_cover_streams_and_indices() {
        let mut ctx = RenderContext::new();
        program().draw(&mut ctx, &grid());
        let plan = Replay::new().run(ctx.take_commands());
        assert_eq!(plan.buffer_ids().count(), 3);
    }
}
