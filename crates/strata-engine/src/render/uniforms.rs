use glam::{Vec3, Vec4};

/// Per-frame values pushed to every pass.
///
/// What each lane of the channel vectors means is agreed between the frame
/// driver and its shaders; the renderer forwards them untouched.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameUniforms {
    pub time: i32,
    pub freq: Vec4,
    pub noise_freq: Vec4,
    pub noise_amp: Vec4,
    pub noise_persistence: Vec4,
    pub noise_octaves: Vec4,
    pub light_pos: Vec4,
    /// Uploaded as `vec4` with alpha 1.
    pub light_col: Vec3,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            time: 0,
            freq: Vec4::ZERO,
            noise_freq: Vec4::ZERO,
            noise_amp: Vec4::ZERO,
            noise_persistence: Vec4::ZERO,
            noise_octaves: Vec4::ZERO,
            light_pos: Vec4::W,
            light_col: Vec3::ONE,
        }
    }
}
