//! Shader programs: compiled stage pairs with a resolved name table.
//!
//! Setters and `draw` never talk to the GPU directly. They activate the
//! program in the passed [`RenderContext`] (only if it is not already active)
//! and record uploads/binds into its command stream.

mod error;
mod interface;
mod stage;
mod uniform;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec2, Vec4};

use super::context::RenderContext;
use super::drawable::Drawable;

pub use error::ProgramError;
pub use interface::{AttributeSlot, ProgramInterface, RENDERED_TEXTURE, UniformBlockLayout, VertexInput};
pub use stage::{ShaderStage, StageKind};
pub use uniform::{UniformKind, UniformLocation, UniformSlot, UniformValue};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a linked program. Activation caching compares these.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProgramId(u64);

/// An immutable, linked vertex/fragment pair.
#[derive(Debug)]
pub struct LinkedProgram {
    id: ProgramId,
    label: String,
    vertex: ShaderStage,
    fragment: ShaderStage,
    interface: ProgramInterface,
}

impl LinkedProgram {
    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn vertex(&self) -> &ShaderStage {
        &self.vertex
    }

    #[inline]
    pub fn fragment(&self) -> &ShaderStage {
        &self.fragment
    }

    #[inline]
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }
}

/// A GPU program plus the setter vocabulary the scene shaders share.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    linked: Arc<LinkedProgram>,
}

impl ShaderProgram {
    /// Links two compiled stages.
    pub fn new(vertex: ShaderStage, fragment: ShaderStage) -> Result<Self, ProgramError> {
        let label = format!("{}+{}", vertex.label(), fragment.label());
        let interface = ProgramInterface::link(&label, &vertex, &fragment)?;

        Ok(Self {
            linked: Arc::new(LinkedProgram {
                id: ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)),
                label,
                vertex,
                fragment,
                interface,
            }),
        })
    }

    /// Compiles both stages from one WGSL source holding a `@vertex` and a
    /// `@fragment` entry point.
    pub fn from_wgsl(label: &str, source: &str) -> Result<Self, ProgramError> {
        let vertex = ShaderStage::compile(StageKind::Vertex, label, source)?;
        let fragment = ShaderStage::compile(StageKind::Fragment, label, source)?;
        Self::new(vertex, fragment)
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.linked.id
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.linked.label
    }

    #[inline]
    pub fn interface(&self) -> &ProgramInterface {
        &self.linked.interface
    }

    #[inline]
    pub fn linked(&self) -> &Arc<LinkedProgram> {
        &self.linked
    }

    /// Makes this program the active one unless it already is.
    pub fn use_program(&self, ctx: &mut RenderContext) {
        if ctx.use_program(&self.linked) {
            log::trace!("activated program '{}'", self.linked.label);
        }
    }

    /// Activates this program, then uploads `value` if the slot is declared.
    fn set(&self, ctx: &mut RenderContext, slot: UniformSlot, value: UniformValue) {
        self.use_program(ctx);
        if let Some(location) = self.interface().uniform(slot) {
            ctx.upload_uniform(location, value);
        }
    }

    /// Uploads `model` and, when declared, its inverse-transpose.
    ///
    /// The inverse-transpose is recomputed on every call. A singular `model`
    /// still activates the program but uploads nothing.
    pub fn set_model_matrix(&self, ctx: &mut RenderContext, model: Mat4) -> Result<(), ProgramError> {
        self.use_program(ctx);
        let inv_tr = match self.interface().uniform(UniformSlot::ModelInvTr) {
            Some(_) => Some(inverse_transpose(model)?),
            None => None,
        };

        self.set(ctx, UniformSlot::Model, model.into());
        if let Some(m) = inv_tr {
            self.set(ctx, UniformSlot::ModelInvTr, m.into());
        }
        Ok(())
    }

    pub fn set_view_proj_matrix(&self, ctx: &mut RenderContext, view_proj: Mat4) {
        self.set(ctx, UniformSlot::ViewProj, view_proj.into());
    }

    pub fn set_time(&self, ctx: &mut RenderContext, t: i32) {
        self.set(ctx, UniformSlot::Time, t.into());
    }

    pub fn set_freq(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::Freq, v.into());
    }

    pub fn set_noise_freq(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::NoiseFreq, v.into());
    }

    pub fn set_noise_amp(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::NoiseAmp, v.into());
    }

    pub fn set_noise_persistence(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::NoisePersistence, v.into());
    }

    pub fn set_noise_octaves(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::NoiseOctaves, v.into());
    }

    pub fn set_light_pos(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::LightPos, v.into());
    }

    pub fn set_light_col(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::LightCol, v.into());
    }

    pub fn set_cam_pos(&self, ctx: &mut RenderContext, v: Vec4) {
        self.set(ctx, UniformSlot::CamPos, v.into());
    }

    pub fn set_cam_view_matrix(&self, ctx: &mut RenderContext, view: Mat4) {
        self.set(ctx, UniformSlot::CamViewMatrix, view.into());
    }

    pub fn set_screen_dims(&self, ctx: &mut RenderContext, dims: Vec2) {
        self.set(ctx, UniformSlot::ScreenDims, dims.into());
    }

    /// Draws `d` with this program.
    ///
    /// A stream is enabled only when the program declares it and the drawable
    /// supplies it. The stream layout comes from the slot, not the shader's
    /// declared width. Indices are always bound. Every attribute enabled here is
    /// disabled again after the draw.
    pub fn draw(&self, ctx: &mut RenderContext, d: &dyn Drawable) {
        self.use_program(ctx);

        let streams: [(AttributeSlot, fn(&dyn Drawable, &mut RenderContext) -> bool); 3] = [
            (AttributeSlot::Position, |d, ctx| d.bind_positions(ctx)),
            (AttributeSlot::Normal, |d, ctx| d.bind_normals(ctx)),
            (AttributeSlot::Uv, |d, ctx| d.bind_uvs(ctx)),
        ];

        let mut enabled = [None; 3];
        for (i, (slot, bind)) in streams.into_iter().enumerate() {
            let Some(input) = self.interface().attribute(slot) else {
                continue;
            };
            if bind(d, ctx) {
                ctx.enable_attribute(input.location, slot.stream_components());
                enabled[i] = Some(input.location);
            }
        }

        d.bind_indices(ctx);
        ctx.draw_elements(d.topology(), d.element_count());

        for location in enabled.into_iter().flatten() {
            ctx.disable_attribute(location);
        }
    }
}

/// `transpose(inverse(m))`, or an error when `m` has no inverse.
pub fn inverse_transpose(m: Mat4) -> Result<Mat4, ProgramError> {
    let determinant = m.determinant();
    if determinant == 0.0 || !determinant.is_finite() {
        return Err(ProgramError::NonInvertibleModel { determinant });
    }
    let inv = m.inverse();
    if !inv.is_finite() {
        return Err(ProgramError::NonInvertibleModel { determinant });
    }
    Ok(inv.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GpuMesh, GridDomain, GridMeshBuilder};
    use crate::render::{GpuCmd, Topology};
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};

    const LIT: &str = r#"
        struct Uniforms {
            u_Model: mat4x4<f32>,
            u_ModelInvTr: mat4x4<f32>,
            u_ViewProj: mat4x4<f32>,
            u_LightPos: vec4<f32>,
        };
        @group(0) @binding(0) var<uniform> u: Uniforms;

        struct VsOut {
            @builtin(position) pos: vec4<f32>,
            @location(0) nor: vec4<f32>,
            @location(1) uv: vec2<f32>,
        };

        @vertex
        fn vs_main(
            @location(0) vs_Pos: vec4<f32>,
            @location(1) vs_Nor: vec4<f32>,
            @location(2) vs_UV: vec2<f32>,
        ) -> VsOut {
            var o: VsOut;
            o.pos = u.u_ViewProj * u.u_Model * vs_Pos;
            o.nor = u.u_ModelInvTr * vs_Nor;
            o.uv = vs_UV;
            return o;
        }

        @fragment
        fn fs_main(v: VsOut) -> @location(0) vec4<f32> {
            return vec4<f32>(v.uv, 0.0, 1.0) * dot(v.nor, u.u_LightPos);
        }
    "#;

    const FLAT: &str = r#"
        struct Uniforms { u_ViewProj: mat4x4<f32>, };
        @group(0) @binding(0) var<uniform> u: Uniforms;

        @vertex
        fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> {
            return u.u_ViewProj * vs_Pos;
        }

        @fragment
        fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
    "#;

    fn lit() -> ShaderProgram {
        ShaderProgram::from_wgsl("lit", LIT).unwrap()
    }

    fn grid_mesh() -> GpuMesh {
        let mesh = GridMeshBuilder::new(Vec3::ZERO, GridDomain::new(0.0, 10.0, 0.0, 10.0), 3.0).generate();
        GpuMesh::upload("grid", &mesh, Topology::Triangles)
    }

    fn uploads(ctx: &RenderContext) -> Vec<(UniformLocation, UniformValue)> {
        ctx.commands()
            .iter()
            .filter_map(|c| match c {
                GpuCmd::UploadUniform { location, value } => Some((*location, *value)),
                _ => None,
            })
            .collect()
    }

    fn activations(ctx: &RenderContext) -> usize {
        ctx.commands()
            .iter()
            .filter(|c| matches!(c, GpuCmd::UseProgram(_)))
            .count()
    }

    #[test]
    fn compile_errors_surface_from_new() {
        let err = ShaderProgram::from_wgsl("bad", "@vertex fn vs_main( {").unwrap_err();
        assert!(matches!(err, ProgramError::Compile { stage: StageKind::Vertex, .. }));
    }

    #[test]
    fn setters_for_undeclared_uniforms_only_activate() {
        let p = ShaderProgram::from_wgsl("flat", FLAT).unwrap();
        let mut ctx = RenderContext::new();

        p.set_time(&mut ctx, 5);
        p.set_freq(&mut ctx, Vec4::ONE);
        p.set_noise_octaves(&mut ctx, Vec4::splat(3.0));
        p.set_light_col(&mut ctx, Vec4::ONE);
        p.set_screen_dims(&mut ctx, Vec2::new(800.0, 600.0));
        p.set_model_matrix(&mut ctx, Mat4::IDENTITY).unwrap();

        assert!(uploads(&ctx).is_empty());
        assert_eq!(activations(&ctx), 1);
        assert_eq!(ctx.active_program(), Some(p.id()));
    }

    #[test]
    fn undeclared_setter_still_switches_program() {
        let a = lit();
        let b = ShaderProgram::from_wgsl("flat", FLAT).unwrap();
        assert!(b.interface().uniform(UniformSlot::Time).is_none());
        let mut ctx = RenderContext::new();

        a.set_time(&mut ctx, 1);
        b.set_time(&mut ctx, 1);

        assert_eq!(ctx.active_program(), Some(b.id()));
        assert_eq!(activations(&ctx), 2);
    }

    #[test]
    fn declared_uniform_receives_exact_value() {
        let p = lit();
        let mut ctx = RenderContext::new();
        let v = Vec4::new(0.1, -2.5, 1e-7, 3.0);

        p.set_light_pos(&mut ctx, v);

        let loc = p.interface().uniform(UniformSlot::LightPos).unwrap();
        assert_eq!(uploads(&ctx), vec![(loc, UniformValue::Vec4(v.to_array()))]);
    }

    #[test]
    fn activation_is_recorded_once_per_switch() {
        let a = lit();
        let b = ShaderProgram::from_wgsl("flat", FLAT).unwrap();
        let mut ctx = RenderContext::new();

        a.set_view_proj_matrix(&mut ctx, Mat4::IDENTITY);
        a.set_light_pos(&mut ctx, Vec4::ONE);
        assert_eq!(activations(&ctx), 1);
        assert_eq!(ctx.active_program(), Some(a.id()));

        b.set_view_proj_matrix(&mut ctx, Mat4::IDENTITY);
        a.set_view_proj_matrix(&mut ctx, Mat4::IDENTITY);
        assert_eq!(activations(&ctx), 3);
        assert_eq!(ctx.active_program(), Some(a.id()));
    }

    #[test]
    fn model_inverse_transpose_is_uploaded() {
        let p = lit();
        let mut ctx = RenderContext::new();
        let model = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 0.5, 3.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(1.0, 2.0, -4.0),
        );

        p.set_model_matrix(&mut ctx, model).unwrap();

        let inv_loc = p.interface().uniform(UniformSlot::ModelInvTr).unwrap();
        let (_, value) = uploads(&ctx).into_iter().find(|(l, _)| *l == inv_loc).unwrap();
        let UniformValue::Mat4(got) = value else {
            panic!("expected a matrix, got {value:?}");
        };
        let expected = model.inverse().transpose().to_cols_array();
        for (g, e) in got.iter().zip(expected.iter()) {
            assert_relative_eq!(*g, *e, epsilon = 1e-5);
        }
    }

    #[test]
    fn inverse_transpose_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 4.0, 0.5));
        let it = inverse_transpose(model).unwrap();
        assert_relative_eq!(it.x_axis.x, 0.5);
        assert_relative_eq!(it.y_axis.y, 0.25);
        assert_relative_eq!(it.z_axis.z, 2.0);
    }

    #[test]
    fn singular_model_fails_and_uploads_nothing() {
        let p = lit();
        let mut ctx = RenderContext::new();
        let model = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));

        let err = p.set_model_matrix(&mut ctx, model).unwrap_err();
        assert!(matches!(err, ProgramError::NonInvertibleModel { .. }));
        assert!(uploads(&ctx).is_empty());
        assert_eq!(ctx.active_program(), Some(p.id()));
    }

    #[test]
    fn singular_model_is_fine_without_inverse_transpose_slot() {
        let src = r#"
            struct Uniforms { u_Model: mat4x4<f32>, };
            @group(0) @binding(0) var<uniform> u: Uniforms;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return u.u_Model * vs_Pos; }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        let p = ShaderProgram::from_wgsl("model-only", src).unwrap();
        let mut ctx = RenderContext::new();
        p.set_model_matrix(&mut ctx, Mat4::ZERO).unwrap();
        assert_eq!(uploads(&ctx).len(), 1);
    }

    #[test]
    fn draw_without_uvs_never_enables_uv_attribute() {
        let p = lit();
        let mesh = grid_mesh();
        let mut ctx = RenderContext::new();

        p.draw(&mut ctx, &mesh);

        let cmds = ctx.commands();
        assert!(matches!(cmds[0], GpuCmd::UseProgram(_)));
        assert!(matches!(cmds[1], GpuCmd::BindArrayBuffer(_)));
        assert!(matches!(cmds[2], GpuCmd::EnableAttribute { location: 0, components: 4 }));
        assert!(matches!(cmds[3], GpuCmd::BindArrayBuffer(_)));
        assert!(matches!(cmds[4], GpuCmd::EnableAttribute { location: 1, components: 4 }));
        assert!(matches!(cmds[5], GpuCmd::BindElementBuffer(_)));
        assert!(matches!(
            cmds[6],
            GpuCmd::DrawElements { topology: Topology::Triangles, count: 54 }
        ));
        assert!(matches!(cmds[7], GpuCmd::DisableAttribute { location: 0 }));
        assert!(matches!(cmds[8], GpuCmd::DisableAttribute { location: 1 }));
        assert_eq!(cmds.len(), 9);
    }

    #[test]
    fn draw_skips_streams_the_program_does_not_declare() {
        let p = ShaderProgram::from_wgsl("flat", FLAT).unwrap();
        let mesh = grid_mesh();
        let mut ctx = RenderContext::new();

        p.draw(&mut ctx, &mesh);

        let binds = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCmd::BindArrayBuffer(_)))
            .count();
        assert_eq!(binds, 1);
        assert!(
            !ctx.commands()
                .iter()
                .any(|c| matches!(c, GpuCmd::EnableAttribute { location: 1, .. }))
        );
    }

    /// Supplies positions only and keeps the trait's default stream bodies.
    struct PositionsOnly(GpuMesh);

    impl Drawable for PositionsOnly {
        fn bind_positions(&self, ctx: &mut RenderContext) -> bool {
            self.0.bind_positions(ctx)
        }

        fn bind_indices(&self, ctx: &mut RenderContext) {
            self.0.bind_indices(ctx);
        }

        fn element_count(&self) -> u32 {
            self.0.element_count()
        }
    }

    #[test]
    fn default_streams_stay_disabled() {
        let p = lit();
        assert!(p.interface().attribute(AttributeSlot::Normal).is_some());
        let d = PositionsOnly(grid_mesh());
        let mut ctx = RenderContext::new();

        p.draw(&mut ctx, &d);

        let enabled: Vec<u32> = ctx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCmd::EnableAttribute { location, .. } => Some(*location),
                _ => None,
            })
            .collect();
        assert_eq!(enabled, vec![0]);
    }

    #[test]
    fn repeated_draws_activate_once() {
        let p = lit();
        let mesh = grid_mesh();
        let mut ctx = RenderContext::new();

        p.draw(&mut ctx, &mesh);
        p.draw(&mut ctx, &mesh);
        assert_eq!(activations(&ctx), 1);
    }
}
