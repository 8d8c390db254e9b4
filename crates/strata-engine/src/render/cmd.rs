use std::sync::Arc;

use super::buffer::StaticBuffer;
use super::drawable::Topology;
use super::program::{LinkedProgram, UniformLocation, UniformValue};

/// One recorded GPU state change or draw.
///
/// The stream mirrors a classic bind-then-draw state machine: uniform uploads
/// target the active program, `EnableAttribute` captures whichever array
/// buffer is current, and `DrawElements` reads the current element buffer.
/// [`GpuExecutor`](super::GpuExecutor) replays a frame's stream with wgpu.
#[derive(Debug, Clone)]
pub enum GpuCmd {
    UseProgram(Arc<LinkedProgram>),
    UploadUniform {
        location: UniformLocation,
        value: UniformValue,
    },
    BindArrayBuffer(StaticBuffer),
    BindElementBuffer(StaticBuffer),
    EnableAttribute {
        location: u32,
        components: u8,
    },
    DisableAttribute {
        location: u32,
    },
    DrawElements {
        topology: Topology,
        count: u32,
    },
    /// Clears color (when `Some`) and/or depth. Starts a new pass.
    Clear {
        color: Option<[f32; 4]>,
        depth: bool,
    },
    Viewport {
        width: u32,
        height: u32,
    },
}
