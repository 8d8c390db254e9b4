use glam::{Mat4, Vec2, Vec4};

/// The fixed uniform vocabulary. Programs may declare any subset.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformSlot {
    Model,
    ModelInvTr,
    ViewProj,
    Time,
    Freq,
    NoiseFreq,
    NoiseAmp,
    NoisePersistence,
    NoiseOctaves,
    LightPos,
    LightCol,
    CamPos,
    CamViewMatrix,
    ScreenDims,
}

impl UniformSlot {
    pub const COUNT: usize = 14;

    pub const ALL: [UniformSlot; Self::COUNT] = [
        UniformSlot::Model,
        UniformSlot::ModelInvTr,
        UniformSlot::ViewProj,
        UniformSlot::Time,
        UniformSlot::Freq,
        UniformSlot::NoiseFreq,
        UniformSlot::NoiseAmp,
        UniformSlot::NoisePersistence,
        UniformSlot::NoiseOctaves,
        UniformSlot::LightPos,
        UniformSlot::LightCol,
        UniformSlot::CamPos,
        UniformSlot::CamViewMatrix,
        UniformSlot::ScreenDims,
    ];

    /// Member name looked up in the program's uniform block.
    pub fn name(self) -> &'static str {
        match self {
            UniformSlot::Model => "u_Model",
            UniformSlot::ModelInvTr => "u_ModelInvTr",
            UniformSlot::ViewProj => "u_ViewProj",
            UniformSlot::Time => "u_Time",
            UniformSlot::Freq => "u_Freq",
            UniformSlot::NoiseFreq => "u_NoiseFreq",
            UniformSlot::NoiseAmp => "u_NoiseAmp",
            UniformSlot::NoisePersistence => "u_NoisePersistence",
            UniformSlot::NoiseOctaves => "u_NoiseOctaves",
            UniformSlot::LightPos => "u_LightPos",
            UniformSlot::LightCol => "u_LightCol",
            UniformSlot::CamPos => "u_CamPos",
            UniformSlot::CamViewMatrix => "u_CamViewMatrix",
            UniformSlot::ScreenDims => "u_ScreenDims",
        }
    }

    pub fn kind(self) -> UniformKind {
        match self {
            UniformSlot::Model
            | UniformSlot::ModelInvTr
            | UniformSlot::ViewProj
            | UniformSlot::CamViewMatrix => UniformKind::Mat4,
            UniformSlot::Time => UniformKind::Int,
            UniformSlot::ScreenDims => UniformKind::Vec2,
            UniformSlot::Freq
            | UniformSlot::NoiseFreq
            | UniformSlot::NoiseAmp
            | UniformSlot::NoisePersistence
            | UniformSlot::NoiseOctaves
            | UniformSlot::LightPos
            | UniformSlot::LightCol
            | UniformSlot::CamPos => UniformKind::Vec4,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Shader-side type a slot must be declared with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Int,
    Vec2,
    Vec4,
    Mat4,
}

impl UniformKind {
    pub fn wgsl(self) -> &'static str {
        match self {
            UniformKind::Int => "i32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
        }
    }
}

/// A value headed for one uniform slot. Matrices are column-major.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Native-endian bytes as laid out in a uniform block.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
            UniformValue::Mat4(v) => bytemuck::cast_slice(v),
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v.to_array())
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v.to_array())
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m.to_cols_array())
    }
}

/// Byte offset of a resolved member inside its program's uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub u32);

impl UniformLocation {
    #[inline]
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}
