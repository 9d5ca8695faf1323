use crate::scene::NodeId;
use glam::Vec3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("node {0:?} does not exist (disposed or never created)")]
    UnknownNode(NodeId),
    #[error("cannot parent {child:?} under {parent:?}: it would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("bounding box is empty or flat (size {size}); fitting skipped")]
    DegenerateGeometry { size: Vec3 },
    #[error("camera view cannot be fitted: {0}")]
    InvalidView(&'static str),
    #[error("fit constant `{field}` must be finite and positive, got {value}")]
    InvalidConfig { field: &'static str, value: f32 },
    #[error(transparent)]
    Scene(#[from] SceneError),
}
