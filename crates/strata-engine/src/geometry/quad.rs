use super::mesh::MeshBuffers;

/// Full-screen quad in normalized device coordinates.
///
/// Positions sit just in front of the far plane so a background drawn with it
/// never occludes later geometry even before the depth buffer is reset. Carries
/// UVs but no normals.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenQuad {
    pub depth: f32,
}

impl Default for ScreenQuad {
    fn default() -> Self {
        Self { depth: 0.999 }
    }
}

impl ScreenQuad {
    pub fn generate(&self) -> MeshBuffers {
        let z = self.depth;
        let mut mesh = MeshBuffers::with_capacity(4, 6, false, true);
        for ([x, y], uv) in [
            ([-1.0, -1.0], [0.0, 1.0]),
            ([1.0, -1.0], [1.0, 1.0]),
            ([1.0, 1.0], [1.0, 0.0]),
            ([-1.0, 1.0], [0.0, 0.0]),
        ] {
            mesh.push_position([x, y, z, 1.0]);
            mesh.push_uv(uv);
        }
        mesh.push_triangle(0, 1, 2);
        mesh.push_triangle(0, 2, 3);
        mesh
    }
}
