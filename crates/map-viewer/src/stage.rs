//! Static scene furniture: ground, lights, background colour and the
//! renderer's pixel settings.

use glam::Vec3;
use mapfit::{
    geometry::{Geometry, Material, Mesh},
    scene::{Light, NodeId, NodeKind, SceneGraph},
    GroundPlane, SceneError, Transform,
};

pub const GROUND_WIDTH: f32 = 15.0;
pub const GROUND_DEPTH: f32 = 15.0;
pub const GROUND_Y: f32 = -2.0;

pub const DEFAULT_BACKGROUND: u32 = 0x9f988c;
pub const AMBIENT_COLOUR: u32 = 0x9f988c;

/// Parses `#rrggbb` or `rrggbb`.
pub fn parse_hex_colour(s: &str) -> Option<u32> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Theme background, falling back to the default when unset or malformed.
pub fn background_colour(theme: Option<&str>) -> u32 {
    match theme.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_hex_colour(s).unwrap_or_else(|| {
            log::warn!("Ignoring malformed background colour {s:?}");
            DEFAULT_BACKGROUND
        }),
        None => DEFAULT_BACKGROUND,
    }
}

#[derive(Debug, Clone)]
pub struct Stage {
    pub ground: NodeId,
    pub ground_plane: GroundPlane,
    pub lights: Vec<NodeId>,
}

impl Stage {
    /// Adds the ground and both lights to the scene.
    pub fn build(scene: &mut SceneGraph, background: u32) -> Result<Self, SceneError> {
        let ground_plane = GroundPlane {
            width: GROUND_WIDTH,
            depth: GROUND_DEPTH,
            y: GROUND_Y,
        };

        // Plane geometry lies in XY; tip it flat onto XZ.
        let ground = scene.spawn_mesh(
            "ground",
            Mesh::new(
                Geometry::Plane {
                    width: ground_plane.width,
                    height: ground_plane.depth,
                },
                Material::solid(background),
            ),
            Transform::from_position(Vec3::new(0.0, ground_plane.y, 0.0))
                .with_rotation(Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0)),
        );
        scene.add(ground)?;

        let ambient = scene.spawn(
            "ambient-light",
            NodeKind::Light(Light::Ambient {
                color: AMBIENT_COLOUR,
                intensity: 0.8,
            }),
        );
        scene.add(ambient)?;

        let sun = scene.spawn(
            "directional-light",
            NodeKind::Light(Light::Directional {
                color: 0xffffff,
                intensity: 0.5,
                cast_shadow: true,
            }),
        );
        scene.set_transform(sun, Transform::from_position(Vec3::new(10.0, 10.0, 5.0)))?;
        scene.add(sun)?;

        Ok(Self {
            ground,
            ground_plane,
            lights: vec![ambient, sun],
        })
    }

    /// Releases the ground and lights. Returns released meshes.
    pub fn dispose(&self, scene: &mut SceneGraph) -> usize {
        std::iter::once(self.ground)
            .chain(self.lights.iter().copied())
            .filter_map(|id| scene.dispose(id).ok())
            .sum()
    }
}

/// What the external renderer is configured with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Canvas size in logical pixels.
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub antialias: bool,
    pub clear_colour: u32,
    pub clear_alpha: f32,
}

impl RenderSettings {
    /// Clamps the device pixel ratio to `max_pixel_ratio`; antialiasing is
    /// turned off on displays denser than that.
    pub fn new(
        width: u32,
        height: u32,
        device_pixel_ratio: Option<f32>,
        max_pixel_ratio: f32,
        clear_colour: u32,
    ) -> Self {
        let requested = device_pixel_ratio.unwrap_or(1.0);
        Self {
            width,
            height,
            pixel_ratio: requested.min(max_pixel_ratio),
            antialias: requested <= max_pixel_ratio,
            clear_colour,
            clear_alpha: 0.0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Backing-store size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).round() as u32,
            (self.height as f32 * self.pixel_ratio).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn colour_parsing() {
        assert_eq!(parse_hex_colour("#9f988c"), Some(0x9f988c));
        assert_eq!(parse_hex_colour("FFFFFF"), Some(0xffffff));
        assert_eq!(parse_hex_colour("#fff"), None);
        assert_eq!(background_colour(None), DEFAULT_BACKGROUND);
        assert_eq!(background_colour(Some("  ")), DEFAULT_BACKGROUND);
        assert_eq!(background_colour(Some("zzzzzz")), DEFAULT_BACKGROUND);
        assert_eq!(background_colour(Some("#102030")), 0x102030);
    }

    #[test]
    fn ground_lies_flat_at_ground_height() {
        let mut scene = SceneGraph::new();
        let stage = Stage::build(&mut scene, DEFAULT_BACKGROUND).unwrap();
        let b = scene.world_bounds(stage.ground).unwrap();
        assert_abs_diff_eq!(b.min.y, GROUND_Y, epsilon = 1e-5);
        assert_abs_diff_eq!(b.max.y, GROUND_Y, epsilon = 1e-5);
        assert_abs_diff_eq!(b.size().x, GROUND_WIDTH, epsilon = 1e-4);
        assert_abs_diff_eq!(b.size().z, GROUND_DEPTH, epsilon = 1e-4);
        assert_eq!(scene.roots().len(), 3);

        assert_eq!(stage.dispose(&mut scene), 1);
        assert!(scene.roots().is_empty());
    }

    #[test]
    fn high_dpi_is_clamped_without_antialias() {
        let s = RenderSettings::new(800, 600, Some(3.0), 2.0, DEFAULT_BACKGROUND);
        assert_eq!(s.pixel_ratio, 2.0);
        assert!(!s.antialias);
        assert_eq!(s.physical_size(), (1600, 1200));

        let s = RenderSettings::new(800, 600, None, 2.0, DEFAULT_BACKGROUND);
        assert_eq!(s.pixel_ratio, 1.0);
        assert!(s.antialias);
    }
}
