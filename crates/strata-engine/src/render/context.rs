use std::sync::Arc;

use super::buffer::StaticBuffer;
use super::cmd::GpuCmd;
use super::drawable::Topology;
use super::program::{LinkedProgram, ProgramId, UniformLocation, UniformValue};

/// Rendering context passed explicitly to programs, drawables and renderers.
///
/// Holds the "currently active program" cache and the command stream recorded
/// for the frame. There is one writer at a time (whoever holds `&mut`), so the
/// cache is a plain equality-guarded assignment.
#[derive(Debug, Default)]
pub struct RenderContext {
    active_program: Option<ProgramId>,
    commands: Vec<GpuCmd>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active_program(&self) -> Option<ProgramId> {
        self.active_program
    }

    /// Activates `program` unless it is already active.
    ///
    /// Returns `true` when an activation was recorded.
    pub fn use_program(&mut self, program: &Arc<LinkedProgram>) -> bool {
        if self.active_program == Some(program.id()) {
            return false;
        }
        self.active_program = Some(program.id());
        self.commands.push(GpuCmd::UseProgram(Arc::clone(program)));
        true
    }

    pub fn upload_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.commands.push(GpuCmd::UploadUniform { location, value });
    }

    pub fn bind_array_buffer(&mut self, buffer: &StaticBuffer) {
        self.commands.push(GpuCmd::BindArrayBuffer(buffer.clone()));
    }

    pub fn bind_element_buffer(&mut self, buffer: &StaticBuffer) {
        self.commands.push(GpuCmd::BindElementBuffer(buffer.clone()));
    }

    pub fn enable_attribute(&mut self, location: u32, components: u8) {
        self.commands.push(GpuCmd::EnableAttribute { location, components });
    }

    pub fn disable_attribute(&mut self, location: u32) {
        self.commands.push(GpuCmd::DisableAttribute { location });
    }

    pub fn draw_elements(&mut self, topology: Topology, count: u32) {
        self.commands.push(GpuCmd::DrawElements { topology, count });
    }

    pub fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        self.commands.push(GpuCmd::Clear { color, depth });
    }

    pub fn viewport(&mut self, width: u32, height: u32) {
        self.commands.push(GpuCmd::Viewport { width, height });
    }

    /// Commands recorded since the last take.
    #[inline]
    pub fn commands(&self) -> &[GpuCmd] {
        &self.commands
    }

    /// Hands the recorded stream to the executor. The active program carries
    /// over, matching the executor's own replay state.
    pub fn take_commands(&mut self) -> Vec<GpuCmd> {
        std::mem::take(&mut self.commands)
    }

    /// Drops a stream that will never be executed.
    ///
    /// The activation cache is reset too: any `UseProgram` in the dropped
    /// stream never reached the executor.
    pub fn discard(&mut self) {
        self.commands.clear();
        self.active_program = None;
    }
}
