//! Places a loaded model on the ground plane and sizes it to the view.
//!
//! The fit runs in two passes. The ground pass stretches the footprint to a
//! fraction of the ground and derives the height from the footprint scale.
//! The view pass multiplies all three scale factors by one number so the
//! model's width fills a fraction of what the camera sees at the origin.
//! After each pass the model is dropped so its lowest point rests just above
//! the ground.

use crate::{
    bounds::BoundingBox,
    camera::{horizontal_fov_rad, PerspectiveCamera},
    error::FitError,
    scene::{NodeId, SceneGraph},
    transform::Transform,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunable constants of the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Fraction of the smaller ground side used as the footprint target.
    pub ground_padding: f32,
    pub stretch_x: f32,
    pub stretch_z: f32,
    /// Height scale relative to the mean footprint scale.
    pub height_multiplier: f32,
    /// Gap between the ground and the model's lowest point.
    pub clearance: f32,
    /// Fraction of the visible width at the origin the model should cover.
    pub view_fill: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ground_padding: 0.8,
            stretch_x: 1.25,
            stretch_z: 0.9,
            height_multiplier: 2.5,
            clearance: 0.1,
            view_fill: 0.8,
        }
    }
}

impl FitConfig {
    /// Every constant must be finite and positive; `clearance` may be zero.
    pub fn validate(&self) -> Result<(), FitError> {
        let positive = [
            ("ground_padding", self.ground_padding),
            ("stretch_x", self.stretch_x),
            ("stretch_z", self.stretch_z),
            ("height_multiplier", self.height_multiplier),
            ("view_fill", self.view_fill),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(FitError::InvalidConfig { field, value });
            }
        }
        if !(self.clearance.is_finite() && self.clearance >= 0.0) {
            return Err(FitError::InvalidConfig {
                field: "clearance",
                value: self.clearance,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPlane {
    pub width: f32,
    /// Extent along Z.
    pub depth: f32,
    pub y: f32,
}

/// The camera quantities the view pass needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub fov_y_deg: f32,
    pub aspect: f32,
    /// Distance from the camera to the origin it looks at.
    pub distance: f32,
}

impl CameraView {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self {
            fov_y_deg: camera.fov_y_deg,
            aspect: camera.aspect,
            distance: camera.position().length(),
        }
    }

    pub fn fov_x_rad(&self) -> f32 {
        horizontal_fov_rad(self.fov_y_deg.to_radians(), self.aspect)
    }

    /// Width of the view frustum at the origin.
    pub fn full_view_width(&self) -> f32 {
        2.0 * self.distance * (self.fov_x_rad() * 0.5).tan()
    }

    fn validate(&self) -> Result<(), FitError> {
        if !(self.fov_y_deg > 0.0 && self.fov_y_deg < 180.0) {
            return Err(FitError::InvalidView("vertical field of view outside (0, 180)"));
        }
        if !(self.aspect > 0.0 && self.aspect.is_finite()) {
            return Err(FitError::InvalidView("aspect ratio must be positive"));
        }
        if !(self.distance > 0.0 && self.distance.is_finite()) {
            return Err(FitError::InvalidView("camera sits on the origin"));
        }
        Ok(())
    }
}

/// Top-view outline of the fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FootprintShape {
    Square,
    Wider,
    Deeper,
}

impl FootprintShape {
    pub fn classify(aspect: f32) -> Self {
        if (aspect - 1.0).abs() < 0.1 {
            Self::Square
        } else if aspect > 1.0 {
            Self::Wider
        } else {
            Self::Deeper
        }
    }
}

impl fmt::Display for FootprintShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Square => "SQUARE",
            Self::Wider => "RECTANGULAR (wider)",
            Self::Deeper => "RECTANGULAR (deeper)",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitResult {
    pub position: Vec3,
    pub scale: Vec3,
    pub raw_size: Vec3,
    /// Scale after the ground pass, before the view correction.
    pub ground_scale: Vec3,
    pub width_scale: f32,
    pub final_size: Vec3,
    pub view_width: f32,
    pub target_width: f32,
}

impl FitResult {
    pub fn transform(&self) -> Transform {
        Transform::from_position(self.position).with_scale(self.scale)
    }

    pub fn footprint_aspect(&self) -> f32 {
        self.final_size.x / self.final_size.z
    }

    pub fn shape(&self) -> FootprintShape {
        FootprintShape::classify(self.footprint_aspect())
    }
}

/// Y translation that puts the lowest point of `raw` (scaled by `scale`)
/// at `ground_y + clearance`.
fn rest_on_ground(raw: &BoundingBox, scale: Vec3, ground_y: f32, clearance: f32) -> f32 {
    let scaled_height = raw.size().y * scale.y;
    ground_y + scaled_height * 0.5 + clearance - raw.center().y * scale.y
}

/// Computes the model transform. Deterministic in its inputs.
pub fn fit(
    raw: &BoundingBox,
    ground: &GroundPlane,
    view: &CameraView,
    config: &FitConfig,
) -> Result<FitResult, FitError> {
    config.validate()?;
    let size = raw.size();
    if raw.is_degenerate() {
        return Err(FitError::DegenerateGeometry { size });
    }
    view.validate()?;

    let center = raw.center();

    // Ground pass.
    let target_size = ground.width.min(ground.depth) * config.ground_padding;
    let scale_x = target_size * config.stretch_x / size.x;
    let scale_z = target_size * config.stretch_z / size.z;
    let scale_y = (scale_x + scale_z) * 0.5 * config.height_multiplier;
    let ground_scale = Vec3::new(scale_x, scale_y, scale_z);
    let scaled_size = size * ground_scale;

    // View pass.
    let view_width = view.full_view_width();
    let target_width = view_width * config.view_fill;
    let width_scale = target_width / scaled_size.x;
    let scale = ground_scale * width_scale;
    let final_size = size * scale;

    let position = Vec3::new(
        -center.x * scale.x,
        rest_on_ground(raw, scale, ground.y, config.clearance),
        -center.z * scale.z,
    );

    Ok(FitResult {
        position,
        scale,
        raw_size: size,
        ground_scale,
        width_scale,
        final_size,
        view_width,
        target_width,
    })
}

/// Zeroes the rotation of `root` and every descendant.
pub fn reset_rotations(scene: &mut SceneGraph, root: NodeId) -> Result<(), FitError> {
    scene.traverse_mut(root, |node| node.transform.rotation = Vec3::ZERO)?;
    Ok(())
}

/// Fits `model` in place.
///
/// On error the model is left at the identity transform.
pub fn fit_node(
    scene: &mut SceneGraph,
    model: NodeId,
    ground: &GroundPlane,
    view: &CameraView,
    config: &FitConfig,
) -> Result<FitResult, FitError> {
    scene.set_transform(model, Transform::IDENTITY)?;
    let raw = scene.world_bounds(model)?;

    let result = fit(&raw, ground, view, config)?;
    scene.set_transform(model, result.transform())?;

    let placed = scene.world_bounds(model)?;
    log::debug!(
        "Fitted model: lowest y={:.4} (ground {:.2} + clearance {:.2}), size=({:.3}, {:.3}, {:.3})",
        placed.min.y,
        ground.y,
        config.clearance,
        placed.size().x,
        placed.size().y,
        placed.size().z,
    );

    Ok(result)
}

/// Emits the shape analysis block after a successful fit.
pub fn log_fit_summary(result: &FitResult, ground: &GroundPlane) {
    let raw = result.raw_size;
    let fin = result.final_size;
    log::info!("=== MODEL SHAPE ANALYSIS (TOP VIEW) ===");
    log::info!(
        "Original model size: width={:.2} height={:.2} depth={:.2} aspect={:.2}",
        raw.x,
        raw.y,
        raw.z,
        raw.x / raw.z
    );
    log::info!(
        "Applied scaling: scaleX={:.3} scaleY={:.3} scaleZ={:.3} widthScale={:.3}",
        result.ground_scale.x,
        result.ground_scale.y,
        result.ground_scale.z,
        result.width_scale
    );
    log::info!(
        "Final model size: width={:.2} height={:.2} depth={:.2} topViewAspect={:.2} viewWidth={:.2} targetWidth={:.2}",
        fin.x,
        fin.y,
        fin.z,
        result.footprint_aspect(),
        result.view_width,
        result.target_width
    );
    log::info!("Top view shape: {}", result.shape());
    log::info!(
        "Ground: width={} depth={} aspect={:.2}",
        ground.width,
        ground.depth,
        ground.width / ground.depth
    );
}
