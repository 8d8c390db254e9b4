use super::context::RenderContext;

/// Primitive topology of a drawable's index stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl Topology {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            Topology::Lines => wgpu::PrimitiveTopology::LineList,
            Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            Topology::Points => wgpu::PrimitiveTopology::PointList,
        }
    }

    /// Strip topologies need the index format at pipeline creation.
    pub fn strip_index_format(self) -> Option<wgpu::IndexFormat> {
        match self {
            Topology::TriangleStrip | Topology::LineStrip => Some(wgpu::IndexFormat::Uint32),
            _ => None,
        }
    }
}

/// Geometry that can be drawn by a [`ShaderProgram`](super::ShaderProgram).
///
/// Each `bind_*` call makes the drawable's stream the current array buffer and
/// returns `true`, or returns `false` (binding nothing) when the drawable has
/// no such stream.
pub trait Drawable {
    fn bind_positions(&self, ctx: &mut RenderContext) -> bool;

    fn bind_normals(&self, _ctx: &mut RenderContext) -> bool {
        false
    }

    fn bind_uvs(&self, _ctx: &mut RenderContext) -> bool {
        false
    }

    /// Makes the drawable's index buffer the current element buffer.
    fn bind_indices(&self, ctx: &mut RenderContext);

    /// Number of indices to draw.
    fn element_count(&self) -> u32;

    fn topology(&self) -> Topology {
        Topology::Triangles
    }
}
