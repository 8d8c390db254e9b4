//! Procedural mesh generation.
//!
//! Generators produce CPU-side [`MeshBuffers`]; [`GpuMesh::upload`] hands the
//! used portion of those buffers to static GPU buffers exactly once.

mod cube;
mod grid;
mod icosphere;
mod mesh;
mod quad;

pub use cube::Cube;
pub use grid::{generate_grid, GridDomain, GridMeshBuilder, MAX_CELLS_PER_AXIS};
pub use icosphere::{Icosphere, MAX_SUBDIVISIONS};
pub use mesh::{
    GpuMesh, MeshBuffers, TrackedBuffer, NORMAL_COMPONENTS, POSITION_COMPONENTS, UV_COMPONENTS,
};
pub use quad::ScreenQuad;
