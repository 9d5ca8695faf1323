//! The sketch context: everything the render loop owns, in one place.
//!
//! The host drives it with [`SketchContext::frame`] at its refresh cadence and
//! forwards translated input through [`SketchContext::handle_control`]. The
//! model arrives asynchronously; until then frames render the stage alone.

use crate::{
    clouds::Clouds,
    controls::{ControlEvent, ControlSettings, Controls, Cursor},
    loader::{AssetLoader, LoadError, LoadGate, LoadTicket, LoadedModel, PendingLoad},
    renderer::FrameRenderer,
    stage::{RenderSettings, Stage, DEFAULT_BACKGROUND},
};
use glam::{Vec2, Vec3};
use mapfit::{
    fit::{fit_node, log_fit_summary, reset_rotations, FootprintShape},
    picking::nearest_hit,
    pin::{attach_pin, PinConfig},
    zoom::ZoomDirection,
    CameraFrame, CameraView, CameraZoom, FitConfig, FitError, FitResult, NodeId,
    PerspectiveCamera, SceneGraph, Viewport, ZoomConfig, ZoomPhase,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Length of the decorative animation loop.
pub const LOOP_DURATION_SECS: f32 = 6.0;

const CAMERA_DISTANCE: f32 = 12.0;
const CAMERA_ELEVATION_DEG: f32 = 30.0;

#[derive(Debug, Clone)]
pub struct SketchOptions {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: Option<f32>,
    pub max_pixel_ratio: f32,
    pub background: u32,
    pub fit: FitConfig,
    pub pin: PinConfig,
    pub zoom: ZoomConfig,
    pub controls: ControlSettings,
    /// Seed for the cloud jitter.
    pub seed: u64,
}

impl Default for SketchOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_pixel_ratio: None,
            max_pixel_ratio: 2.0,
            background: DEFAULT_BACKGROUND,
            fit: FitConfig::default(),
            pin: PinConfig::default(),
            zoom: ZoomConfig::default(),
            controls: ControlSettings::default(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct InstalledModel {
    name: String,
    raw_size: Vec3,
    root: NodeId,
    pin: Option<NodeId>,
    fit: Option<FitResult>,
}

pub struct SketchContext {
    pub scene: SceneGraph,
    pub camera: PerspectiveCamera,
    pub settings: RenderSettings,
    pub stage: Stage,
    pub controls: Controls,
    pub zoom: CameraZoom,
    clouds: Clouds,
    model: Option<InstalledModel>,
    options: SketchOptions,
    gate: LoadGate,
    pending: Option<PendingLoad>,
    elapsed: f32,
    frames: u64,
    torn_down: bool,
    disposed_meshes: usize,
}

impl SketchContext {
    /// Builds the stage, clouds and default camera. No model yet.
    pub fn new(options: SketchOptions) -> Result<Self, FitError> {
        let mut scene = SceneGraph::new();
        let stage = Stage::build(&mut scene, options.background)?;

        let mut rng = StdRng::seed_from_u64(options.seed);
        let clouds = Clouds::build(&mut scene, &mut rng)?;

        let camera = PerspectiveCamera::isometric(
            options.width as f32,
            options.height as f32,
            CAMERA_DISTANCE,
            CAMERA_ELEVATION_DEG.to_radians(),
        );
        let zoom = CameraZoom::new(camera.frame(), options.zoom);

        let settings = RenderSettings::new(
            options.width,
            options.height,
            options.device_pixel_ratio,
            options.max_pixel_ratio,
            options.background,
        );

        let (physical_width, physical_height) = settings.physical_size();
        log::info!(
            "Sketch ready: {}x{} @ {:.2}x ({}x{} device pixels, antialias: {}), {} scene nodes",
            settings.width,
            settings.height,
            settings.pixel_ratio,
            physical_width,
            physical_height,
            settings.antialias,
            scene.len()
        );

        Ok(Self {
            scene,
            camera,
            settings,
            stage,
            controls: Controls::new(options.controls),
            zoom,
            clouds,
            model: None,
            options,
            gate: LoadGate::default(),
            pending: None,
            elapsed: 0.0,
            frames: 0,
            torn_down: false,
            disposed_meshes: 0,
        })
    }

    pub fn options(&self) -> &SketchOptions {
        &self.options
    }

    pub fn model_root(&self) -> Option<NodeId> {
        self.model.as_ref().map(|m| m.root)
    }

    pub fn pin(&self) -> Option<NodeId> {
        self.model.as_ref().and_then(|m| m.pin)
    }

    pub fn fit_result(&self) -> Option<&FitResult> {
        self.model.as_ref().and_then(|m| m.fit.as_ref())
    }

    pub fn clouds(&self) -> &Clouds {
        &self.clouds
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Issues a ticket for a new load; earlier tickets go stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.gate.invalidate();
        self.pending = None;
        self.gate.ticket()
    }

    /// Starts loading `path` on a worker thread. Frames keep rendering
    /// meanwhile and pick the result up in [`Self::frame`].
    pub fn load_in_background(&mut self, loader: Arc<dyn AssetLoader>, path: PathBuf) -> LoadTicket {
        let ticket = self.begin_load();
        self.pending = Some(PendingLoad::spawn(loader, path, ticket));
        ticket
    }

    /// Blocks up to `timeout` for the background load. Returns whether a
    /// model was installed.
    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let Some(result) = pending.wait(timeout) else {
            return false;
        };
        let ticket = pending.ticket();
        self.pending = None;
        self.complete_load(ticket, result)
    }

    fn poll_load(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        if let Some(result) = pending.try_take() {
            let ticket = pending.ticket();
            self.pending = None;
            self.complete_load(ticket, result);
        }
    }

    /// Delivers a load result. Stale tickets and failures leave the scene
    /// untouched. Returns whether a model was installed.
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<LoadedModel, LoadError>) -> bool {
        if self.torn_down || !self.gate.is_current(ticket) {
            log::info!("Discarding model load that completed after teardown or was superseded");
            return false;
        }

        let model = match result {
            Ok(model) => model,
            Err(err) => {
                log::error!("Failed to load model: {err}");
                return false;
            }
        };

        match self.install(model) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to add model to the scene: {err}");
                false
            }
        }
    }

    fn install(&mut self, model: LoadedModel) -> Result<(), FitError> {
        if let Some(old) = self.model.take() {
            self.disposed_meshes += self.scene.dispose(old.root)?;
        }

        let raw_size = model.bounds().size();
        log::info!(
            "Model '{}' loaded: {} parts, {} triangles, extent ({:.2}, {:.2}, {:.2})",
            model.name,
            model.meshes.len(),
            model.triangle_count(),
            raw_size.x,
            raw_size.y,
            raw_size.z
        );
        if model.animation_count > 0 {
            log::info!("Model has {} animation clip(s)", model.animation_count);
        }

        let name = model.name.clone();
        let root = model.instantiate(&mut self.scene)?;
        reset_rotations(&mut self.scene, root)?;
        self.scene.add(root)?;

        // Fit against the resting view, not wherever the camera is right now.
        let view = CameraView {
            fov_y_deg: self.camera.fov_y_deg,
            aspect: self.camera.aspect,
            distance: self.zoom.default_frame().position.length(),
        };
        let ground = self.stage.ground_plane;

        let (fit, pin) = match fit_node(&mut self.scene, root, &ground, &view, &self.options.fit) {
            Ok(result) => {
                log_fit_summary(&result, &ground);
                let pin = attach_pin(&mut self.scene, root, &result, &self.options.pin)?;
                (Some(result), Some(pin))
            }
            Err(err) => {
                log::warn!("Skipping model fit, leaving it at identity without a pin: {err}");
                (None, None)
            }
        };

        self.model = Some(InstalledModel {
            name,
            raw_size,
            root,
            pin,
            fit,
        });
        Ok(())
    }

    /// Forwards one input event. Clicks are hit-tested against the pin.
    pub fn handle_control(&mut self, event: &ControlEvent) {
        if self.torn_down {
            return;
        }
        let model = self.model_root();
        match self.controls.handle_event(event, &mut self.scene, model) {
            Ok(Some(at)) => {
                self.click(at.x, at.y);
            }
            Ok(None) => {}
            Err(err) => log::warn!("Dropping input event {event:?}: {err}"),
        }
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(self.settings.width as f32, self.settings.height as f32)
    }

    /// Hit-tests a click in canvas pixels against the pin. A hit toggles the
    /// zoom; a miss changes nothing.
    pub fn click(&mut self, x: f32, y: f32) -> Option<ZoomDirection> {
        let pin = self.pin()?;
        let ndc = self.viewport().to_ndc(x, y);
        let ray = self.camera.ray_from_ndc(ndc)?;

        match nearest_hit(&self.scene, pin, &ray) {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(err) => {
                log::warn!("Pin hit-test failed: {err}");
                return None;
            }
        }

        let pin_world = match self.scene.world_position(pin) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("Pin has no world position: {err}");
                return None;
            }
        };
        Some(self.zoom.on_pin_hit(self.camera.frame(), pin_world))
    }

    /// Normalised position within the decorative loop, in [0, 1).
    pub fn playhead(&self) -> f32 {
        (self.elapsed % LOOP_DURATION_SECS) / LOOP_DURATION_SECS
    }

    /// One tick of the render loop. Never fails: every error is logged.
    pub fn frame(&mut self, dt_secs: f32, renderer: &mut dyn FrameRenderer) {
        if self.torn_down {
            return;
        }
        self.poll_load();

        let dt = dt_secs.max(0.0);
        self.elapsed += dt;
        self.frames += 1;

        if let Some(root) = self.model_root() {
            if let Err(err) = self.controls.apply_keys(dt, &mut self.scene, root) {
                log::error!("Keyboard rotation failed: {err}");
            }
        }

        if let Some(frame) = self.zoom.tick(dt) {
            self.camera.set_frame(frame);
        }

        let playhead = self.playhead();
        if let Err(err) = self.clouds.drift(&mut self.scene, playhead) {
            log::error!("Cloud drift failed: {err}");
        }

        if let Err(err) = renderer.render(&self.scene, &self.camera) {
            log::error!("Render error: {err:#}");
        }
    }

    pub fn resize(&mut self, width: u32, height: u32, renderer: &mut dyn FrameRenderer) {
        if width == 0 || height == 0 {
            return;
        }
        self.settings.resize(width, height);
        self.camera.set_aspect(width as f32, height as f32);
        renderer.resize(&self.settings);
    }

    /// Canvas pixel under the pin's centre, when the pin is on screen side
    /// of the camera.
    pub fn pin_screen_position(&self) -> Option<Vec2> {
        let pin = self.pin()?;
        let centre = self.scene.world_bounds(pin).ok()?.center();
        let ndc = self.camera.project(centre)?;
        Some(self.viewport().to_pixels(ndc))
    }

    /// Releases the model, clouds and stage, and orphans any in-flight load.
    /// Returns the number of meshes released; zero on repeat calls.
    pub fn teardown(&mut self, renderer: &mut dyn FrameRenderer) -> usize {
        if self.torn_down {
            return 0;
        }
        self.torn_down = true;
        self.gate.invalidate();
        self.pending = None;

        let mut released = 0;
        if let Some(model) = self.model.take() {
            released += self.scene.dispose(model.root).unwrap_or_else(|err| {
                log::warn!("Model was already gone at teardown: {err}");
                0
            });
        }
        released += self.clouds.dispose(&mut self.scene);
        released += self.stage.dispose(&mut self.scene);

        self.controls.reset();
        renderer.dispose();

        self.disposed_meshes += released;
        log::info!("Sketch torn down, {released} meshes released");
        released
    }

    pub fn report(&self) -> SketchReport {
        let model = self.model.as_ref().map(|m| ModelReport {
            name: m.name.clone(),
            raw_size: m.raw_size,
            rotation: self
                .scene
                .transform(m.root)
                .map(|t| t.rotation)
                .unwrap_or(Vec3::ZERO),
            fit: m.fit,
            shape: m.fit.map(|f| f.shape()),
            pin_world: m.pin.and_then(|p| self.scene.world_position(p).ok()),
        });

        SketchReport {
            frames: self.frames,
            elapsed_secs: self.elapsed,
            playhead: self.playhead(),
            camera: self.camera.frame(),
            zoom_phase: self.zoom.phase(),
            zoom_progress: self.zoom.progress(),
            pin_focused: self.zoom.is_pin_focused(),
            cursor: self.controls.cursor(),
            model,
            scene_nodes: self.scene.len(),
            torn_down: self.torn_down,
            disposed_meshes: self.disposed_meshes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub name: String,
    /// Extent of the model as loaded, before fitting.
    pub raw_size: Vec3,
    pub rotation: Vec3,
    pub fit: Option<FitResult>,
    pub shape: Option<FootprintShape>,
    pub pin_world: Option<Vec3>,
}

/// Snapshot printed by the headless runner.
#[derive(Debug, Clone, Serialize)]
pub struct SketchReport {
    pub frames: u64,
    pub elapsed_secs: f32,
    pub playhead: f32,
    pub camera: CameraFrame,
    pub zoom_phase: ZoomPhase,
    pub zoom_progress: f32,
    pub pin_focused: bool,
    /// Pointer cursor the host should show.
    pub cursor: Cursor,
    pub model: Option<ModelReport>,
    pub scene_nodes: usize,
    pub torn_down: bool,
    pub disposed_meshes: usize,
}
