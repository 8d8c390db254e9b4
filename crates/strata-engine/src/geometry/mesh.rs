use crate::render::{Drawable, RenderContext, StaticBuffer, Topology};

/// Components per position (`x, y, z, w = 1`).
pub const POSITION_COMPONENTS: usize = 4;
/// Components per normal (`x, y, z, w = 0`).
pub const NORMAL_COMPONENTS: usize = 4;
/// Components per texture coordinate.
pub const UV_COMPONENTS: usize = 2;

/// Pre-sized storage with a separately tracked used length.
///
/// The backing storage is allocated once at its worst-case capacity; `push`
/// writes into the next free slot. Only `as_slice()` (the used prefix) is ever
/// read or uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBuffer<T> {
    data: Vec<T>,
    used: usize,
}

impl<T: Copy + Default> TrackedBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity],
            used: 0,
        }
    }

    /// Allocated element count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Used element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    #[inline]
    pub fn push(&mut self, value: T) {
        if self.used < self.data.len() {
            self.data[self.used] = value;
        } else {
            // Undersized estimate: grow instead of dropping data.
            self.data.push(value);
        }
        self.used += 1;
    }

    #[inline]
    pub fn extend_from_slice(&mut self, values: &[T]) {
        for &v in values {
            self.push(v);
        }
    }

    /// The used prefix of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.used]
    }
}

/// CPU-side mesh streams.
///
/// Invariants maintained by the generators in this module:
/// - `indices.len()` is a multiple of 3
/// - every index is `< vertex_count()`
/// - `normals` is either empty or the same length as `positions`
/// - `uvs` is either empty or holds 2 components per vertex
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffers {
    pub indices: TrackedBuffer<u32>,
    pub positions: TrackedBuffer<f32>,
    pub normals: TrackedBuffer<f32>,
    pub uvs: TrackedBuffer<f32>,
}

impl MeshBuffers {
    /// Allocates storage for `vertices` vertices and `indices` indices.
    pub fn with_capacity(vertices: usize, indices: usize, normals: bool, uvs: bool) -> Self {
        Self {
            indices: TrackedBuffer::with_capacity(indices),
            positions: TrackedBuffer::with_capacity(vertices * POSITION_COMPONENTS),
            normals: TrackedBuffer::with_capacity(if normals { vertices * NORMAL_COMPONENTS } else { 0 }),
            uvs: TrackedBuffer::with_capacity(if uvs { vertices * UV_COMPONENTS } else { 0 }),
        }
    }

    /// A mesh with no vertices and no triangles.
    pub fn empty() -> Self {
        Self::with_capacity(0, 0, false, false)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_COMPONENTS
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn push_position(&mut self, p: [f32; 4]) {
        self.positions.extend_from_slice(&p);
    }

    #[inline]
    pub fn push_normal(&mut self, n: [f32; 4]) {
        self.normals.extend_from_slice(&n);
    }

    #[inline]
    pub fn push_uv(&mut self, uv: [f32; 2]) {
        self.uvs.extend_from_slice(&uv);
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Returns the position of vertex `i` as `[x, y, z, w]`.
    pub fn position(&self, i: usize) -> [f32; 4] {
        let p = &self.positions.as_slice()[i * POSITION_COMPONENTS..(i + 1) * POSITION_COMPONENTS];
        [p[0], p[1], p[2], p[3]]
    }

    /// Returns the normal of vertex `i`, if the mesh carries normals.
    pub fn normal(&self, i: usize) -> Option<[f32; 4]> {
        let n = self
            .normals
            .as_slice()
            .get(i * NORMAL_COMPONENTS..(i + 1) * NORMAL_COMPONENTS)?;
        Some([n[0], n[1], n[2], n[3]])
    }
}

/// A mesh uploaded to static GPU buffers.
///
/// Each stream buffer is owned by this mesh alone. Contents are fixed at
/// upload time; regenerating geometry means building a new `GpuMesh`.
#[derive(Debug)]
pub struct GpuMesh {
    indices: StaticBuffer,
    positions: Option<StaticBuffer>,
    normals: Option<StaticBuffer>,
    uvs: Option<StaticBuffer>,
    count: u32,
    topology: Topology,
}

impl GpuMesh {
    /// Copies the used portion of each stream into static buffers.
    pub fn upload(label: &str, mesh: &MeshBuffers, topology: Topology) -> Self {
        let stream = |name: &str, buf: &TrackedBuffer<f32>| {
            (!buf.is_empty()).then(|| StaticBuffer::vertex(&format!("{label} {name}"), buf.as_slice()))
        };

        let gpu = Self {
            indices: StaticBuffer::index(&format!("{label} indices"), mesh.indices.as_slice()),
            positions: stream("positions", &mesh.positions),
            normals: stream("normals", &mesh.normals),
            uvs: stream("uvs", &mesh.uvs),
            count: mesh.index_count() as u32,
            topology,
        };

        log::debug!(
            "uploaded mesh '{label}': {} vertices, {} indices",
            mesh.vertex_count(),
            gpu.count
        );
        gpu
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }
}

impl Drawable for GpuMesh {
    fn bind_positions(&self, ctx: &mut RenderContext) -> bool {
        bind_stream(ctx, self.positions.as_ref())
    }

    fn bind_normals(&self, ctx: &mut RenderContext) -> bool {
        bind_stream(ctx, self.normals.as_ref())
    }

    fn bind_uvs(&self, ctx: &mut RenderContext) -> bool {
        bind_stream(ctx, self.uvs.as_ref())
    }

    fn bind_indices(&self, ctx: &mut RenderContext) {
        ctx.bind_element_buffer(&self.indices);
    }

    fn element_count(&self) -> u32 {
        self.count
    }

    fn topology(&self) -> Topology {
        self.topology
    }
}

fn bind_stream(ctx: &mut RenderContext, buffer: Option<&StaticBuffer>) -> bool {
    match buffer {
        Some(b) => {
            ctx.bind_array_buffer(b);
            true
        }
        None => false,
    }
}
