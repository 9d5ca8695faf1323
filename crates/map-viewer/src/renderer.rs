//! The drawing seam. The sketch hands over the scene and camera once per
//! frame; what happens to them after that is the renderer's business.

use crate::stage::RenderSettings;
use mapfit::{CameraFrame, PerspectiveCamera, SceneGraph};

pub trait FrameRenderer {
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> anyhow::Result<()>;

    fn resize(&mut self, _settings: &RenderSettings) {}

    fn dispose(&mut self) {}
}

/// Counts what would have been drawn. Used by the headless binary and tests.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    pub frames: u64,
    pub draw_calls: u64,
    pub last_camera: Option<CameraFrame>,
    pub last_settings: Option<RenderSettings>,
    pub disposed: bool,
}

impl HeadlessRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            last_settings: Some(settings),
            ..Self::default()
        }
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        if self.disposed {
            anyhow::bail!("render called after dispose");
        }

        let meshes = scene.visible_meshes();
        log::trace!(
            "Rendering frame {}: {} meshes, camera at {:?}",
            self.frames,
            meshes.len(),
            camera.position()
        );

        self.frames += 1;
        self.draw_calls += meshes.len() as u64;
        self.last_camera = Some(camera.frame());
        Ok(())
    }

    fn resize(&mut self, settings: &RenderSettings) {
        self.last_settings = Some(*settings);
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapfit::{
        geometry::{Geometry, Material, Mesh},
        Transform,
    };

    #[test]
    fn counts_frames_and_draw_calls() {
        let mut scene = SceneGraph::new();
        let cube = scene.spawn_mesh(
            "cube",
            Mesh::new(
                Geometry::Cuboid {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
                Material::default(),
            ),
            Transform::IDENTITY,
        );
        scene.add(cube).unwrap();
        let camera = PerspectiveCamera::isometric(800.0, 600.0, 12.0, 30f32.to_radians());

        let mut renderer = HeadlessRenderer::default();
        renderer.render(&scene, &camera).unwrap();
        renderer.render(&scene, &camera).unwrap();

        assert_eq!(renderer.frames, 2);
        assert_eq!(renderer.draw_calls, 2);
        assert_eq!(renderer.last_camera, Some(camera.frame()));

        renderer.dispose();
        assert!(renderer.render(&scene, &camera).is_err());
    }
}
