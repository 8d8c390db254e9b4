//! Strata engine crate.
//!
//! Procedural scene rendering: grid and sphere mesh generation, shader
//! programs with a fixed uniform vocabulary, a recorded draw stream and its
//! wgpu executor, plus the window/runtime plumbing that drives it.

pub mod core;
pub mod device;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
