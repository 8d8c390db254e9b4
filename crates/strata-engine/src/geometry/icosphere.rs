use std::collections::HashMap;

use glam::Vec3;

use super::mesh::MeshBuffers;

/// Subdivision levels above this are clamped (20·4⁸ triangles already).
pub const MAX_SUBDIVISIONS: u32 = 8;

const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
    [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
    [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
    [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
    [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
];

/// Subdivided icosahedron with shared (welded) vertices.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Icosphere {
    pub center: Vec3,
    pub radius: f32,
    pub subdivisions: u32,
}

impl Icosphere {
    pub fn new(center: Vec3, radius: f32, subdivisions: u32) -> Self {
        Self { center, radius, subdivisions }
    }

    pub fn generate(&self) -> MeshBuffers {
        let levels = self.subdivisions.min(MAX_SUBDIVISIONS);
        if levels != self.subdivisions {
            log::warn!("icosphere: clamping {} subdivisions to {levels}", self.subdivisions);
        }

        let (dirs, faces) = subdivide(levels);

        let mut mesh = MeshBuffers::with_capacity(dirs.len(), faces.len() * 3, true, false);
        for d in &dirs {
            let p = self.center + *d * self.radius;
            mesh.push_position([p.x, p.y, p.z, 1.0]);
            mesh.push_normal([d.x, d.y, d.z, 0.0]);
        }
        for [a, b, c] in faces {
            mesh.push_triangle(a, b, c);
        }

        log::debug!(
            "icosphere: {levels} subdivisions, {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        mesh
    }
}

/// Unit directions and faces after `levels` rounds of 1→4 triangle splits.
fn subdivide(levels: u32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut dirs: Vec<Vec3> = [
        (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
        (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
        (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    let final_vertices = 10 * 4usize.pow(levels) + 2;
    dirs.reserve(final_vertices - dirs.len());

    let mut faces = ICOSAHEDRON_FACES.to_vec();

    for _ in 0..levels {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::with_capacity(faces.len() * 3 / 2);
        let mut next = Vec::with_capacity(faces.len() * 4);

        for [a, b, c] in faces {
            let ab = midpoint(&mut dirs, &mut midpoints, a, b);
            let bc = midpoint(&mut dirs, &mut midpoints, b, c);
            let ca = midpoint(&mut dirs, &mut midpoints, c, a);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    (dirs, faces)
}

fn midpoint(dirs: &mut Vec<Vec3>, cache: &mut HashMap<(u32, u32), u32>, a: u32, b: u32) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    *cache.entry(key).or_insert_with(|| {
        let m = (dirs[a as usize] + dirs[b as usize]).normalize();
        dirs.push(m);
        (dirs.len() - 1) as u32
    })
}
