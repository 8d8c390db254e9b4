use glam::Vec3;

use super::mesh::MeshBuffers;

/// Face normals and the two tangent axes spanning each face.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

/// Axis-aligned unit cube. Faces do not share vertices so each carries its
/// own flat normal.
///
/// Part of the engine's stock drawable set next to [`Icosphere`](super::Icosphere)
/// and [`ScreenQuad`](super::ScreenQuad); the studio scene does not draw it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cube {
    pub center: Vec3,
}

impl Cube {
    pub fn new(center: Vec3) -> Self {
        Self { center }
    }

    pub fn generate(&self) -> MeshBuffers {
        let mut mesh = MeshBuffers::with_capacity(24, 36, true, false);

        for (face, (n, u, v)) in FACES.iter().enumerate() {
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = self.center + (*n + *u * su + *v * sv) * 0.5;
                mesh.push_position([p.x, p.y, p.z, 1.0]);
                mesh.push_normal([n.x, n.y, n.z, 0.0]);
            }
            let base = face as u32 * 4;
            mesh.push_triangle(base, base + 1, base + 2);
            mesh.push_triangle(base, base + 2, base + 3);
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwelded_faces_with_outward_winding() {
        let mesh = Cube::new(Vec3::new(2.0, 0.0, 0.0)).generate();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);

        let at = |i: u32| Vec3::from_slice(&mesh.position(i as usize)[..3]);
        for tri in mesh.indices.as_slice().chunks(3) {
            let (a, b, c) = (at(tri[0]), at(tri[1]), at(tri[2]));
            let face_normal = (b - a).cross(c - a).normalize();
            let stored = mesh.normal(tri[0] as usize).unwrap();
            assert!((face_normal - Vec3::from_slice(&stored[..3])).length() < 1e-5);
            // Every corner sits on the unit cube around the center.
            assert!(((a - Vec3::new(2.0, 0.0, 0.0)).abs().max_element() - 0.5).abs() < 1e-6);
        }
    }
}
