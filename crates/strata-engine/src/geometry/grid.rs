//! Flat quad-grid generator (ground and water planes).
//!
//! The generator walks the domain with an accumulating `f64` step rather than
//! an integer cell index. The upper bound is exclusive, so when the span is not an
//! exact multiple of the step the trailing partial strip is dropped. Quads are
//! centered on each sample, which means the grid extends half a cell past the
//! start edge of the domain.

use glam::Vec3;

use super::mesh::MeshBuffers;

const UP: [f32; 4] = [0.0, 1.0, 0.0, 0.0];

/// Corner offsets in units of half a cell, counter-clockwise from `(-x, -z)`.
const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Largest per-axis cell count whose vertices stay addressable by `u32` indices.
pub const MAX_CELLS_PER_AXIS: usize = 32_766;

/// Axis-aligned rectangle on the XZ plane.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridDomain {
    pub x_start: f32,
    pub x_end: f32,
    pub z_start: f32,
    pub z_end: f32,
}

impl GridDomain {
    pub const fn new(x_start: f32, x_end: f32, z_start: f32, z_end: f32) -> Self {
        Self { x_start, x_end, z_start, z_end }
    }

    /// Builds a domain from `[x_start, x_end, z_start, z_end]`.
    pub const fn from_array(d: [f32; 4]) -> Self {
        Self::new(d[0], d[1], d[2], d[3])
    }

    #[inline]
    pub fn span_x(&self) -> f32 {
        self.x_end - self.x_start
    }

    #[inline]
    pub fn span_z(&self) -> f32 {
        self.z_end - self.z_start
    }
}

/// Parameters for one generated grid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridMeshBuilder {
    /// Only `y` is used: the constant height of the plane.
    pub center: Vec3,
    pub domain: GridDomain,
    /// Cells per axis (both axes share it).
    pub resolution: f32,
}

impl GridMeshBuilder {
    pub fn new(center: Vec3, domain: GridDomain, resolution: f32) -> Self {
        Self { center, domain, resolution }
    }

    /// Cell width along x and z.
    ///
    /// Computed in `f64`, the precision the stepping loop accumulates in.
    pub fn cell_width(&self) -> (f64, f64) {
        let res = f64::from(self.resolution);
        (span(self.domain.x_start, self.domain.x_end) / res, span(self.domain.z_start, self.domain.z_end) / res)
    }

    /// True when the parameters cannot produce a single cell, or would need
    /// more cells per axis than a `u32` index buffer can address.
    pub fn is_degenerate(&self) -> bool {
        let (cw_x, cw_z) = self.cell_width();
        !(self.resolution > 0.0)
            || !self.resolution.is_finite()
            || self.resolution > MAX_CELLS_PER_AXIS as f32
            || !(self.domain.span_x() > 0.0)
            || !(self.domain.span_z() > 0.0)
            || !advances(self.domain.x_start, cw_x)
            || !advances(self.domain.z_start, cw_z)
    }

    /// Number of cells visited along x and z by the stepping loop.
    pub fn cell_counts(&self) -> (usize, usize) {
        if self.is_degenerate() {
            return (0, 0);
        }
        let (cw_x, cw_z) = self.cell_width();
        let cap = self.max_steps_per_axis();
        (
            axis_samples(self.domain.x_start, self.domain.x_end, cw_x, cap).count(),
            axis_samples(self.domain.z_start, self.domain.z_end, cw_z, cap).count(),
        )
    }

    /// Upper bound on samples per axis.
    ///
    /// Accumulated rounding can add at most one sample beyond the nominal
    /// resolution.
    fn max_steps_per_axis(&self) -> usize {
        (self.resolution.ceil() as usize).saturating_add(1)
    }

    /// Emits one unwelded quad (4 vertices, 6 indices) per visited cell.
    pub fn generate(&self) -> MeshBuffers {
        if self.is_degenerate() {
            log::debug!("grid: degenerate domain {:?} at resolution {}", self.domain, self.resolution);
            return MeshBuffers::empty();
        }

        let (cw_x, cw_z) = self.cell_width();
        let (hw_x, hw_z) = (cw_x / 2.0, cw_z / 2.0);
        let cap = self.max_steps_per_axis();
        let (cells_x, cells_z) = self.cell_counts();

        let mut mesh = match reservation(cells_x, cells_z) {
            Some((vertices, indices)) => MeshBuffers::with_capacity(vertices, indices, true, false),
            None => MeshBuffers::with_capacity(0, 0, true, false),
        };
        let y = self.center.y;

        for xi in axis_samples(self.domain.x_start, self.domain.x_end, cw_x, cap) {
            for zi in axis_samples(self.domain.z_start, self.domain.z_end, cw_z, cap) {
                let base = mesh.vertex_count() as u32;
                mesh.push_triangle(base, base + 1, base + 2);
                mesh.push_triangle(base, base + 2, base + 3);

                for (sx, sz) in CORNERS {
                    let x = (xi + f64::from(sx) * hw_x) as f32;
                    let z = (zi + f64::from(sz) * hw_z) as f32;
                    mesh.push_position([x, y, z, 1.0]);
                    mesh.push_normal(UP);
                }
            }
        }

        log::debug!(
            "grid: cell {cw_x}x{cw_z} (half {hw_x}x{hw_z}), {} indices, {} vertices, capacity {}",
            mesh.index_count(),
            mesh.vertex_count(),
            mesh.indices.capacity()
        );

        mesh
    }
}

/// Shorthand for `GridMeshBuilder::new(center, domain, resolution).generate()`.
pub fn generate_grid(center: Vec3, domain: GridDomain, resolution: f32) -> MeshBuffers {
    GridMeshBuilder::new(center, domain, resolution).generate()
}

#[inline]
fn span(start: f32, end: f32) -> f64 {
    f64::from(end) - f64::from(start)
}

/// False when adding `step` to `start` leaves it unchanged.
#[inline]
fn advances(start: f32, step: f64) -> bool {
    step.is_finite() && f64::from(start) + step > f64::from(start)
}

/// Vertex and index counts for `cells_x * cells_z` quads, or `None` on overflow.
fn reservation(cells_x: usize, cells_z: usize) -> Option<(usize, usize)> {
    let quads = cells_x.checked_mul(cells_z)?;
    Some((quads.checked_mul(4)?, quads.checked_mul(6)?))
}

fn axis_samples(start: f32, end: f32, step: f64, cap: usize) -> impl Iterator<Item = f64> {
    let end = f64::from(end);
    std::iter::successors(Some(f64::from(start)), move |&v| Some(v + step))
        .take(cap)
        .take_while(move |&v| v < end)
}
