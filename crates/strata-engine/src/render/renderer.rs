use glam::{Mat4, Vec2};

use super::camera::Camera;
use super::context::RenderContext;
use super::drawable::Drawable;
use super::program::{ProgramError, ShaderProgram};
use super::uniforms::FrameUniforms;

/// Pass-level draw orchestration.
///
/// Owns the output size and clear color; everything else arrives per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderer {
    width: u32,
    height: u32,
    clear_color: [f32; 4],
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = [r, g, b, a];
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sizes the viewport to the surface and clears color and depth.
    pub fn clear(&self, ctx: &mut RenderContext) {
        ctx.viewport(self.width, self.height);
        ctx.clear(Some(self.clear_color), true);
    }

    /// Clears depth only, so the next pass draws over everything before it.
    pub fn clear_depth(&self, ctx: &mut RenderContext) {
        ctx.clear(None, true);
    }

    /// Pushes the frame's uniform set once, then draws each drawable with
    /// `program` in order.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        camera: &Camera,
        program: &ShaderProgram,
        drawables: &[&dyn Drawable],
        uniforms: &FrameUniforms,
    ) -> Result<(), ProgramError> {
        let view = camera.view();
        let view_proj = camera.projection() * view;

        program.set_model_matrix(ctx, Mat4::IDENTITY)?;
        program.set_view_proj_matrix(ctx, view_proj);
        program.set_time(ctx, uniforms.time);
        program.set_freq(ctx, uniforms.freq);
        program.set_noise_freq(ctx, uniforms.noise_freq);
        program.set_noise_amp(ctx, uniforms.noise_amp);
        program.set_noise_persistence(ctx, uniforms.noise_persistence);
        program.set_noise_octaves(ctx, uniforms.noise_octaves);
        program.set_light_pos(ctx, uniforms.light_pos);
        program.set_light_col(ctx, uniforms.light_col.extend(1.0));
        program.set_cam_pos(ctx, camera.eye().extend(1.0));
        program.set_cam_view_matrix(ctx, view);
        program.set_screen_dims(ctx, Vec2::new(self.width as f32, self.height as f32));

        for d in drawables {
            program.draw(ctx, *d);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GpuMesh, ScreenQuad};
    use crate::render::{GpuCmd, Topology, UniformSlot, UniformValue};
    use glam::{Vec3, Vec4};

    const ALL_UNIFORMS: &str = r#"
        struct Uniforms {
            u_Model: mat4x4<f32>,
            u_ModelInvTr: mat4x4<f32>,
            u_ViewProj: mat4x4<f32>,
            u_CamViewMatrix: mat4x4<f32>,
            u_Time: i32,
            u_Freq: vec4<f32>,
            u_NoiseFreq: vec4<f32>,
            u_NoiseAmp: vec4<f32>,
            u_NoisePersistence: vec4<f32>,
            u_NoiseOctaves: vec4<f32>,
            u_LightPos: vec4<f32>,
            u_LightCol: vec4<f32>,
            u_CamPos: vec4<f32>,
            u_ScreenDims: vec2<f32>,
        };
        @group(0) @binding(0) var<uniform> u: Uniforms;

        @vertex
        fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> {
            return u.u_ViewProj * u.u_Model * u.u_ModelInvTr * u.u_CamViewMatrix * vs_Pos;
        }

        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            let s = u.u_Freq + u.u_NoiseFreq + u.u_NoiseAmp + u.u_NoisePersistence + u.u_NoiseOctaves;
            return s + u.u_LightPos + u.u_LightCol + u.u_CamPos
                + vec4<f32>(u.u_ScreenDims, f32(u.u_Time), 0.0);
        }
    "#;

    fn uniforms() -> FrameUniforms {
        FrameUniforms {
            time: 17,
            freq: Vec4::new(70.0, 40.0, 0.15, 30.0),
            noise_freq: Vec4::new(0.6, 0.39, 0.024, 1.46),
            noise_amp: Vec4::new(1.4, 0.9, 1.7, 0.48),
            noise_persistence: Vec4::new(0.5, 0.5, 0.5, 0.25),
            noise_octaves: Vec4::new(4.0, 4.0, 4.0, 0.6),
            light_pos: Vec4::new(0.0, 3.75, 0.0, 1.0),
            light_col: Vec3::new(232.0, 109.0, 0.0),
        }
    }

    fn uploaded(ctx: &RenderContext, program: &ShaderProgram, slot: UniformSlot) -> Vec<UniformValue> {
        let Some(loc) = program.interface().uniform(slot) else {
            return Vec::new();
        };
        ctx.commands()
            .iter()
            .filter_map(|c| match c {
                GpuCmd::UploadUniform { location, value } if *location == loc => Some(*value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn clear_sizes_viewport_then_clears_both() {
        let mut r = Renderer::new(640, 480);
        r.set_clear_color(0.2, 0.2, 0.2, 1.0);
        let mut ctx = RenderContext::new();
        r.clear(&mut ctx);
        r.clear_depth(&mut ctx);

        assert!(matches!(ctx.commands()[0], GpuCmd::Viewport { width: 640, height: 480 }));
        match &ctx.commands()[1] {
            GpuCmd::Clear { color, depth } => {
                assert_eq!(*color, Some([0.2, 0.2, 0.2, 1.0]));
                assert!(*depth);
            }
            other => panic!("expected a clear, got {other:?}"),
        }
        assert!(matches!(ctx.commands()[2], GpuCmd::Clear { color: None, depth: true }));
    }

    #[test]
    fn render_pushes_every_uniform_exactly_once() {
        let program = ShaderProgram::from_wgsl("all", ALL_UNIFORMS).unwrap();
        let renderer = Renderer::new(800, 600);
        let camera = Camera::look_at(Vec3::new(0.0, 6.0, 22.0), Vec3::new(0.0, 6.0, 0.0));
        let mut ctx = RenderContext::new();

        renderer.render(&mut ctx, &camera, &program, &[], &uniforms()).unwrap();

        for slot in UniformSlot::ALL {
            assert_eq!(uploaded(&ctx, &program, slot).len(), 1, "{}", slot.name());
        }
    }

    #[test]
    fn render_forwards_values_with_vec3_padding_only() {
        let program = ShaderProgram::from_wgsl("all", ALL_UNIFORMS).unwrap();
        let renderer = Renderer::new(800, 600);
        let camera = Camera::look_at(Vec3::new(0.0, 6.0, 22.0), Vec3::new(0.0, 6.0, 0.0));
        let u = uniforms();
        let mut ctx = RenderContext::new();

        renderer.render(&mut ctx, &camera, &program, &[], &u).unwrap();

        let one = |slot| uploaded(&ctx, &program, slot)[0];
        assert_eq!(one(UniformSlot::Time), UniformValue::Int(17));
        assert_eq!(one(UniformSlot::NoiseAmp), UniformValue::Vec4(u.noise_amp.to_array()));
        assert_eq!(one(UniformSlot::LightCol), UniformValue::Vec4([232.0, 109.0, 0.0, 1.0]));
        assert_eq!(
            one(UniformSlot::CamPos),
            UniformValue::Vec4(camera.eye().extend(1.0).to_array())
        );
        assert_eq!(one(UniformSlot::ScreenDims), UniformValue::Vec2([800.0, 600.0]));
        assert_eq!(one(UniformSlot::Model), UniformValue::from(Mat4::IDENTITY));
        assert_eq!(one(UniformSlot::ViewProj), UniformValue::from(camera.view_proj()));
        assert_eq!(one(UniformSlot::CamViewMatrix), UniformValue::from(camera.view()));
    }

    #[test]
    fn render_draws_each_drawable_in_order() {
        let program = ShaderProgram::from_wgsl("all", ALL_UNIFORMS).unwrap();
        let renderer = Renderer::new(800, 600);
        let camera = Camera::default();
        let a = GpuMesh::upload("a", &ScreenQuad::default().generate(), Topology::Triangles);
        let b = GpuMesh::upload("b", &ScreenQuad::default().generate(), Topology::Triangles);
        let mut ctx = RenderContext::new();

        renderer
            .render(&mut ctx, &camera, &program, &[&a, &b], &FrameUniforms::default())
            .unwrap();

        let draws = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCmd::DrawElements { count: 6, .. }))
            .count();
        assert_eq!(draws, 2);
        let last_upload = ctx
            .commands()
            .iter()
            .rposition(|c| matches!(c, GpuCmd::UploadUniform { .. }));
        let first_draw = ctx
            .commands()
            .iter()
            .position(|c| matches!(c, GpuCmd::DrawElements { .. }));
        assert!(last_upload < first_draw);
    }
}
