//! Decorative blocky clouds that drift slowly over the map.

use glam::Vec3;
use mapfit::{
    geometry::{Geometry, Material, Mesh},
    scene::{NodeId, NodeKind, SceneGraph},
    SceneError, Transform,
};
use rand::Rng;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPlacement {
    pub position: Vec3,
    pub size: f32,
}

const fn placement(x: f32, y: f32, z: f32, size: f32) -> CloudPlacement {
    CloudPlacement {
        position: Vec3::new(x, y, z),
        size,
    }
}

pub const CLOUD_PLACEMENTS: [CloudPlacement; 5] = [
    placement(-15.0, 8.0, -10.0, 2.0),
    placement(10.0, 10.0, -8.0, 2.5),
    placement(-5.0, 12.0, 5.0, 2.2),
    placement(15.0, 9.0, 8.0, 2.3),
    placement(0.0, 11.0, -12.0, 2.1),
];

/// Per-frame drift amplitude.
const DRIFT: f32 = 0.001;
/// Random yaw of each cloud part lies in `[-MAX_JITTER, MAX_JITTER)`.
const MAX_JITTER: f32 = 0.2;

fn cloud_material() -> Material {
    Material {
        color: 0xffffff,
        roughness: 0.9,
        metalness: 0.0,
        opacity: 0.9,
    }
}

/// Offset and box extents of the four parts of one cloud, scaled by `size`.
fn cloud_parts(size: f32) -> [(Vec3, Vec3); 4] {
    [
        (Vec3::ZERO, Vec3::new(size * 2.0, size * 1.2, size * 1.5)),
        (Vec3::new(size * 1.2, 0.0, 0.0), Vec3::new(size * 1.4, size, size * 1.2)),
        (Vec3::new(-size, 0.0, size * 0.6), Vec3::new(size * 1.2, size * 0.8, size)),
        (Vec3::new(0.0, size * 0.5, 0.0), Vec3::new(size * 1.8, size, size * 1.4)),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct Clouds {
    pub groups: Vec<NodeId>,
    pub parts: Vec<NodeId>,
}

impl Clouds {
    pub fn build<R: Rng>(scene: &mut SceneGraph, rng: &mut R) -> Result<Self, SceneError> {
        let mut clouds = Self::default();

        for (i, place) in CLOUD_PLACEMENTS.iter().enumerate() {
            let group = scene.spawn(format!("cloud-{i}"), NodeKind::Group);
            scene.set_transform(group, Transform::from_position(place.position))?;

            for (offset, extent) in cloud_parts(place.size) {
                let yaw = rng.gen_range(-MAX_JITTER..MAX_JITTER);
                let part = scene.spawn_mesh(
                    format!("cloud-{i}-part"),
                    Mesh::new(
                        Geometry::Cuboid {
                            width: extent.x,
                            height: extent.y,
                            depth: extent.z,
                        },
                        cloud_material(),
                    ),
                    Transform::from_position(offset).with_rotation(Vec3::new(0.0, yaw, 0.0)),
                );
                scene.attach(group, part)?;
                clouds.parts.push(part);
            }

            scene.add(group)?;
            clouds.groups.push(group);
        }

        Ok(clouds)
    }

    /// Nudges every cloud along a circle; `playhead` is the loop position in [0, 1).
    pub fn drift(&self, scene: &mut SceneGraph, playhead: f32) -> Result<(), SceneError> {
        for (i, group) in self.groups.iter().enumerate() {
            let phase = playhead * TAU + i as f32;
            let t = scene.transform_mut(*group)?;
            t.position.x += phase.sin() * DRIFT;
            t.position.z += phase.cos() * DRIFT;
        }
        Ok(())
    }

    /// Releases all clouds. Returns released meshes.
    pub fn dispose(&mut self, scene: &mut SceneGraph) -> usize {
        let released = self
            .groups
            .drain(..)
            .filter_map(|g| scene.dispose(g).ok())
            .sum();
        self.parts.clear();
        released
    }
}
