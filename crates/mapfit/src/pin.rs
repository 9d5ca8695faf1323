//! The map pin: a thin stem with a ball on top, parented to the model.

use crate::{
    error::SceneError,
    fit::FitResult,
    geometry::{Geometry, Material, Mesh},
    scene::{NodeId, NodeKind, SceneGraph},
    transform::Transform,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub color: u32,
    pub stem_height: f32,
    pub stem_width: f32,
    pub head_radius: f32,
    /// How far below the model's top face (in model-local units) the pin base sits.
    pub drop: f32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            color: 0xff3333,
            stem_height: 0.3,
            stem_width: 0.08,
            head_radius: 0.11,
            drop: 1.5,
        }
    }
}

impl PinConfig {
    /// Total height of stem plus head in the pin's own frame.
    pub fn height(&self) -> f32 {
        self.stem_height + 2.0 * self.head_radius
    }
}

/// Builds the detached pin group. The stem's base is at the local origin.
pub fn build_pin(scene: &mut SceneGraph, config: &PinConfig) -> NodeId {
    let pin = scene.spawn("pin", NodeKind::Group);

    let stem = scene.spawn_mesh(
        "pin-stem",
        Mesh::new(
            Geometry::Cuboid {
                width: config.stem_width,
                height: config.stem_height,
                depth: config.stem_width,
            },
            Material::solid(config.color),
        ),
        Transform::from_position(Vec3::new(0.0, config.stem_height * 0.5, 0.0)),
    );

    let head = scene.spawn_mesh(
        "pin-head",
        Mesh::new(
            Geometry::Sphere {
                radius: config.head_radius,
            },
            Material::solid(config.color),
        ),
        Transform::from_position(Vec3::new(0.0, config.stem_height + config.head_radius, 0.0)),
    );

    // Both children are freshly spawned and `pin` is a group, so attach cannot cycle.
    for part in [stem, head] {
        if let Err(err) = scene.attach(pin, part) {
            log::error!("Failed to assemble pin: {err}");
        }
    }

    pin
}

/// Pin position in the model's local frame.
pub fn pin_offset(fit: &FitResult, config: &PinConfig) -> Vec3 {
    Vec3::new(0.0, fit.final_size.y * 0.5 - config.drop, 0.0)
}

/// Builds the pin and parents it under the fitted model.
pub fn attach_pin(
    scene: &mut SceneGraph,
    model: NodeId,
    fit: &FitResult,
    config: &PinConfig,
) -> Result<NodeId, SceneError> {
    scene.node(model)?;
    let pin = build_pin(scene, config);
    scene.set_transform(pin, Transform::from_position(pin_offset(fit, config)))?;
    scene.attach(model, pin)?;
    Ok(pin)
}
