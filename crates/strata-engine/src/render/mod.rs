//! GPU rendering subsystem.
//!
//! Programs, drawables and the [`Renderer`] record bind/upload/draw calls into
//! a [`RenderContext`]. At the end of a frame the [`GpuExecutor`] replays that
//! stream and encodes it with wgpu.
//!
//! Convention:
//! - Positions are world space, `w = 1`; normals carry `w = 0`.
//! - Clip space is wgpu's (depth in `0..1`).

mod buffer;
mod camera;
mod cmd;
mod context;
mod ctx;
mod drawable;
mod executor;
pub mod program;
mod renderer;
pub mod replay;
mod uniforms;

pub use buffer::{BufferId, BufferKind, StaticBuffer};
pub use camera::Camera;
pub use cmd::GpuCmd;
pub use context::RenderContext;
pub use ctx::{RenderCtx, RenderTarget};
pub use drawable::{Drawable, Topology};
pub use executor::GpuExecutor;
pub use program::{
    AttributeSlot, LinkedProgram, ProgramError, ProgramId, ProgramInterface, ShaderProgram, ShaderStage, StageKind,
    UniformKind, UniformLocation, UniformSlot, UniformValue,
};
pub use renderer::Renderer;
pub use uniforms::FrameUniforms;
