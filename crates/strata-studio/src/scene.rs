use glam::Vec3;
use strata_engine::geometry::{GpuMesh, GridDomain, GridMeshBuilder, Icosphere, ScreenQuad};
use strata_engine::render::{
    Camera, FrameUniforms, ProgramError, RenderContext, Renderer, ShaderProgram, Topology,
};

const PLANE_DOMAIN: GridDomain = GridDomain::new(-20.0, 20.0, -20.0, 20.0);
const PLANE_RESOLUTION: f32 = 80.0;
const GROUND_HEIGHT: f32 = 0.0;
const WATER_HEIGHT: f32 = 2.0;

const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 8.5, 0.0);
const SPHERE_RADIUS: f32 = 4.0;

macro_rules! shader {
    ($file:literal) => {
        concat!(include_str!("shaders/common.wgsl"), include_str!($file))
    };
}

/// The four programs the scene draws with.
#[derive(Debug, Clone)]
pub struct Programs {
    pub background: ShaderProgram,
    pub ground: ShaderProgram,
    pub water: ShaderProgram,
    pub lambert: ShaderProgram,
}

impl Programs {
    pub fn load() -> Result<Self, ProgramError> {
        Ok(Self {
            background: ShaderProgram::from_wgsl("background", shader!("shaders/background.wgsl"))?,
            ground: ShaderProgram::from_wgsl("ground", shader!("shaders/ground.wgsl"))?,
            water: ShaderProgram::from_wgsl("water", shader!("shaders/water.wgsl"))?,
            lambert: ShaderProgram::from_wgsl("lambert", shader!("shaders/lambert.wgsl"))?,
        })
    }
}

/// Programs plus the geometry drawn with them.
#[derive(Debug)]
pub struct Scene {
    programs: Programs,
    background: GpuMesh,
    ground: GpuMesh,
    water: GpuMesh,
    sphere: GpuMesh,
    sphere_tessellation: u32,
}

fn plane(label: &str, height: f32) -> GpuMesh {
    let mesh = GridMeshBuilder::new(Vec3::new(0.0, height, 0.0), PLANE_DOMAIN, PLANE_RESOLUTION).generate();
    GpuMesh::upload(label, &mesh, Topology::Triangles)
}

fn sphere(tessellation: u32) -> GpuMesh {
    let mesh = Icosphere::new(SPHERE_CENTER, SPHERE_RADIUS, tessellation).generate();
    GpuMesh::upload("lava sphere", &mesh, Topology::Triangles)
}

impl Scene {
    pub fn load(tessellation: u32) -> Result<Self, ProgramError> {
        let programs = Programs::load()?;
        let background = GpuMesh::upload("background", &ScreenQuad::default().generate(), Topology::Triangles);

        let scene = Self {
            programs,
            background,
            ground: plane("ground", GROUND_HEIGHT),
            water: plane("water", WATER_HEIGHT),
            sphere: sphere(tessellation),
            sphere_tessellation: tessellation,
        };
        log::info!("scene loaded (sphere tessellation {tessellation})");
        Ok(scene)
    }

    pub fn sphere_tessellation(&self) -> u32 {
        self.sphere_tessellation
    }

    /// Rebuilds the sphere when `tessellation` differs from the current one.
    /// Returns whether a rebuild happened.
    pub fn sync_sphere(&mut self, tessellation: u32) -> bool {
        if tessellation == self.sphere_tessellation {
            return false;
        }
        log::debug!(
            "rebuilding sphere: tessellation {} -> {tessellation}",
            self.sphere_tessellation
        );
        self.sphere = sphere(tessellation);
        self.sphere_tessellation = tessellation;
        true
    }

    /// Records one frame: clear, background, depth reset, then the world.
    pub fn record(
        &self,
        ctx: &mut RenderContext,
        renderer: &Renderer,
        camera: &Camera,
        uniforms: &FrameUniforms,
    ) -> Result<(), ProgramError> {
        let p = &self.programs;

        renderer.clear(ctx);
        renderer.render(ctx, camera, &p.background, &[&self.background], uniforms)?;

        // The background must never occlude the world.
        renderer.clear_depth(ctx);

        renderer.render(ctx, camera, &p.ground, &[&self.ground], uniforms)?;
        renderer.render(ctx, camera, &p.water, &[&self.water], uniforms)?;
        renderer.render(ctx, camera, &p.lambert, &[&self.sphere], uniforms)?;
        Ok(())
    }
}
