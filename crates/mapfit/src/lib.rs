//! Fits a loaded map model onto a ground plane, hangs a pin on it and
//! animates the camera between the default view and the pin.
//!
//! Everything here is plain data plus math on top of `glam`; rendering,
//! asset decoding and input translation live with the caller.

pub mod bounds;
pub mod camera;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod picking;
pub mod pin;
pub mod scene;
pub mod transform;
pub mod zoom;

pub use bounds::BoundingBox;
pub use camera::{CameraFrame, PerspectiveCamera, Ray, Viewport};
pub use error::{FitError, SceneError};
pub use fit::{fit, CameraView, FitConfig, FitResult, GroundPlane};
pub use scene::{NodeId, SceneGraph};
pub use transform::Transform;
pub use zoom::{CameraZoom, ZoomClock, ZoomConfig, ZoomPhase};
