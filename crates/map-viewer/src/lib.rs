//! Map viewer sketch.
//!
//! Drives the `mapfit` core from a render loop: stage and clouds, model
//! loading off the frame thread, keyboard and pointer rotation, and the
//! click-to-zoom pin. Drawing goes through [`renderer::FrameRenderer`].

pub mod app;
pub mod clouds;
pub mod config;
pub mod controls;
pub mod loader;
pub mod renderer;
pub mod script;
pub mod stage;
