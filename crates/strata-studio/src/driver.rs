use glam::Vec3;
use strata_engine::core::{App, AppControl, FrameCtx};
use strata_engine::input::{InputFrame, InputState, Key, MouseButton};
use strata_engine::render::{Camera, ProgramError, RenderContext, Renderer};
use winit::window::WindowId;

use crate::controls::Controls;
use crate::scene::Scene;

const CLEAR_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
const EYE: Vec3 = Vec3::new(0.0, 6.0, 22.0);
const TARGET: Vec3 = Vec3::new(0.0, 6.0, 0.0);

/// Radians of orbit per logical pixel of drag.
const ORBIT_SPEED: f32 = 0.005;
/// Distance units per wheel line.
const ZOOM_SPEED: f32 = 1.0;

/// Lifecycle of the frame driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Nothing loaded yet.
    Idle,
    /// Programs and geometry exist; no frame has been recorded.
    SceneLoaded,
    Rendering,
    /// The surface changed size since the last frame.
    Resized,
}

/// Owns the scene, camera and controls and records one frame per tick.
#[derive(Debug)]
pub struct FrameDriver {
    phase: Phase,
    controls: Controls,
    scene: Option<Scene>,
    renderer: Renderer,
    camera: Camera,
    time: i32,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriver {
    pub fn new() -> Self {
        let mut renderer = Renderer::new(1, 1);
        let [r, g, b, a] = CLEAR_COLOR;
        renderer.set_clear_color(r, g, b, a);

        Self {
            phase: Phase::Idle,
            controls: Controls::default(),
            scene: None,
            renderer,
            camera: Camera::look_at(EYE, TARGET),
            time: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn time(&self) -> i32 {
        self.time
    }

    #[inline]
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    #[inline]
    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Compiles the programs and builds the geometry. Only valid from `Idle`.
    pub fn load_scene(&mut self) -> Result<(), ProgramError> {
        if self.phase != Phase::Idle {
            log::warn!("load_scene called in phase {:?}; ignoring", self.phase);
            return Ok(());
        }
        self.scene = Some(Scene::load(self.controls.tessellations)?);
        self.phase = Phase::SceneLoaded;
        Ok(())
    }

    /// Updates the surface size and camera projection. Nothing else changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.set_size(width, height);
        self.camera.set_aspect_ratio(width, height);
        if self.phase == Phase::Rendering {
            self.phase = Phase::Resized;
        }
    }

    /// Applies this frame's input. Returns `Exit` on Escape.
    pub fn handle_input(&mut self, input: &InputState, frame: &InputFrame) -> AppControl {
        if frame.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if frame.key_pressed(Key::ArrowUp) {
            self.controls.step_tessellation(1);
        }
        if frame.key_pressed(Key::ArrowDown) {
            self.controls.step_tessellation(-1);
        }
        if frame.key_pressed(Key::R) {
            self.controls.reset();
            log::info!("controls reset");
        }

        if input.button_down(MouseButton::Left) {
            let (dx, dy) = frame.pointer_delta;
            self.camera.orbit(-dx * ORBIT_SPEED, dy * ORBIT_SPEED);
        }
        if frame.wheel_lines != 0.0 {
            self.camera.zoom(frame.wheel_lines * ZOOM_SPEED);
        }

        AppControl::Continue
    }

    /// Records one frame into `ctx` and advances the frame counter.
    ///
    /// Does nothing while `Idle`.
    pub fn tick(&mut self, ctx: &mut RenderContext) -> Result<(), ProgramError> {
        let Some(scene) = self.scene.as_mut() else {
            log::warn!("tick before the scene is loaded");
            return Ok(());
        };

        scene.sync_sphere(self.controls.tessellations);

        let uniforms = self.controls.frame_uniforms(self.time);
        scene.record(ctx, &self.renderer, &self.camera, &uniforms)?;

        self.time = self.time.wrapping_add(1);
        self.phase = Phase::Rendering;
        Ok(())
    }
}

/// Runtime adapter around [`FrameDriver`].
pub struct Studio {
    driver: FrameDriver,
}

impl Studio {
    pub fn new(driver: FrameDriver) -> Self {
        Self { driver }
    }
}

impl App for Studio {
    fn on_resize(&mut self, _window_id: WindowId, width: u32, height: u32) {
        self.driver.resize(width, height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.driver.handle_input(ctx.input, ctx.input_frame) == AppControl::Exit {
            return AppControl::Exit;
        }

        let driver = &mut self.driver;
        ctx.render(|rc| {
            driver.tick(rc)?;
            Ok(())
        })
    }
}
