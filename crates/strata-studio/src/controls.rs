use glam::{Vec3, Vec4};
use strata_engine::geometry::MAX_SUBDIVISIONS;
use strata_engine::render::FrameUniforms;

/// Point light hovering above the ground plane.
pub const LIGHT_POS: Vec4 = Vec4::new(0.0, 3.75, 0.0, 1.0);

/// Lava orange in 0..255 units; shaders normalize it.
pub const LIGHT_COL: Vec3 = Vec3::new(232.0, 109.0, 0.0);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LavaParams {
    pub time_frequency: f32,
    pub noise_frequency: f32,
    pub noise_amp: f32,
    pub noise_persistence: f32,
    pub noise_octaves: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TerrainParams {
    pub noise_frequency: f32,
    pub noise_frequency_2: f32,
    pub noise_amp: f32,
    pub noise_persistence: f32,
    pub noise_octaves: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WaterParams {
    pub time_frequency: f32,
    pub noise_frequency: f32,
    pub noise_frequency_2: f32,
    pub noise_amp: f32,
    pub noise_persistence: f32,
    pub noise_octaves: u32,
    pub noise_bias: f32,
    pub noise_gain: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StarsParams {
    pub time_frequency: f32,
    pub noise_frequency: f32,
}

/// User-tunable scene parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Controls {
    /// Icosphere subdivision level, `0..=MAX_SUBDIVISIONS`.
    pub tessellations: u32,
    pub lava: LavaParams,
    pub terrain: TerrainParams,
    pub water: WaterParams,
    pub stars: StarsParams,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            tessellations: 6,
            lava: LavaParams {
                time_frequency: 70.0,
                noise_frequency: 0.6,
                noise_amp: 1.4,
                noise_persistence: 0.5,
                noise_octaves: 4,
            },
            terrain: TerrainParams {
                noise_frequency: 0.39,
                noise_frequency_2: 0.15,
                noise_amp: 0.9,
                noise_persistence: 0.5,
                noise_octaves: 4,
            },
            water: WaterParams {
                time_frequency: 40.0,
                noise_frequency: 0.024,
                noise_frequency_2: 0.48,
                noise_amp: 1.7,
                noise_persistence: 0.5,
                noise_octaves: 4,
                noise_bias: 0.25,
                noise_gain: 0.6,
            },
            stars: StarsParams {
                time_frequency: 30.0,
                noise_frequency: 1.46,
            },
        }
    }
}

impl Controls {
    /// Restores every parameter, tessellation included, to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves the tessellation level by `delta`, clamped to the valid range.
    pub fn step_tessellation(&mut self, delta: i32) {
        let next = self.tessellations as i64 + delta as i64;
        self.tessellations = next.clamp(0, MAX_SUBDIVISIONS as i64) as u32;
    }

    /// Packs the parameters into the five channel vectors.
    ///
    /// Lanes are `(lava, terrain, water, *)` where they line up; the spare
    /// lanes carry the parameters that have no lava/terrain counterpart.
    pub fn frame_uniforms(&self, time: i32) -> FrameUniforms {
        let Self {
            lava,
            terrain,
            water,
            stars,
            ..
        } = self;

        FrameUniforms {
            time,
            freq: Vec4::new(
                lava.time_frequency,
                water.time_frequency,
                terrain.noise_frequency_2,
                stars.time_frequency,
            ),
            noise_freq: Vec4::new(
                lava.noise_frequency,
                terrain.noise_frequency,
                water.noise_frequency,
                stars.noise_frequency,
            ),
            noise_amp: Vec4::new(
                lava.noise_amp,
                terrain.noise_amp,
                water.noise_amp,
                water.noise_frequency_2,
            ),
            noise_persistence: Vec4::new(
                lava.noise_persistence,
                terrain.noise_persistence,
                water.noise_persistence,
                water.noise_bias,
            ),
            noise_octaves: Vec4::new(
                lava.noise_octaves as f32,
                terrain.noise_octaves as f32,
                water.noise_octaves as f32,
                water.noise_gain,
            ),
            light_pos: LIGHT_POS,
            light_col: LIGHT_COL,
        }
    }
}
