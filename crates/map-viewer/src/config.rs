use crate::{
    app::SketchOptions, controls::ControlSettings, loader::find_model_asset,
    stage::background_colour,
};
use anyhow::{Context, Result};
use clap::Parser;
use mapfit::{pin::PinConfig, FitConfig, ZoomClock, ZoomConfig};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};

/// `map_viewer` - fits a map model onto the stage and replays input headlessly.
///
/// Loads the model, runs the render loop for a fixed number of frames with a
/// counting renderer, then prints a JSON report of the final scene state.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ViewerConfig {
    /// Model file, or a directory searched for the first `.obj`.
    #[arg(long, env = "MAP_VIEWER_MODEL", default_value = "assets/models")]
    pub model: PathBuf,

    /// Canvas width in logical pixels.
    #[arg(long, env = "MAP_VIEWER_WIDTH", default_value_t = 1280)]
    pub width: u32,

    /// Canvas height in logical pixels.
    #[arg(long, env = "MAP_VIEWER_HEIGHT", default_value_t = 720)]
    pub height: u32,

    /// Device pixel ratio reported by the host display.
    #[arg(long, env = "MAP_VIEWER_PIXEL_RATIO")]
    pub pixel_ratio: Option<f32>,

    #[arg(long, env = "MAP_VIEWER_MAX_PIXEL_RATIO", default_value_t = 2.0)]
    pub max_pixel_ratio: f32,

    /// Frames to run before tearing down.
    #[arg(long, env = "MAP_VIEWER_FRAMES", default_value_t = 120)]
    pub frames: u32,

    /// Host refresh rate; frame delta is `1 / fps`.
    #[arg(long, env = "MAP_VIEWER_FPS", default_value_t = 60.0)]
    pub fps: f32,

    /// Zoom animation length in seconds [default: 1/3].
    #[arg(long, env = "MAP_VIEWER_ZOOM_DURATION")]
    pub zoom_duration: Option<f32>,

    /// Advance zoom progress by a fixed 0.05 per frame instead of by time.
    #[arg(long, env = "MAP_VIEWER_FIXED_STEP")]
    pub fixed_step: bool,

    /// JSON input script to replay.
    #[arg(long, env = "MAP_VIEWER_SCRIPT")]
    pub script: Option<PathBuf>,

    /// JSON file overriding the fitting constants.
    #[arg(long, env = "MAP_VIEWER_FIT_CONFIG")]
    pub fit_config: Option<PathBuf>,

    /// Seed for the cloud jitter.
    #[arg(long, env = "MAP_VIEWER_SEED", default_value_t = 0)]
    pub seed: u64,

    /// Theme background colour, `#rrggbb`.
    #[arg(long, env = "MAP_VIEWER_BACKGROUND")]
    pub background: Option<String>,
}

/// Optional overrides file. Missing sections keep their defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TuningFile {
    pub fit: FitConfig,
    pub pin: PinConfig,
    pub zoom: Option<ZoomConfig>,
    pub controls: ControlSettings,
}

impl TuningFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read fit config '{}'", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("invalid fit config '{}'", path.display()))
    }

    /// Parses and validates the overrides.
    pub fn from_json(text: &str) -> Result<Self> {
        let tuning: Self = serde_json::from_str(text)?;
        tuning.fit.validate()?;
        Ok(tuning)
    }
}

impl ViewerConfig {
    pub fn frame_dt(&self) -> f32 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            1.0 / 60.0
        }
    }

    /// The clock requested on the command line, if any.
    pub fn zoom_clock(&self) -> Option<ZoomClock> {
        if self.fixed_step {
            Some(ZoomClock::LEGACY)
        } else {
            self.zoom_duration
                .map(|duration_secs| ZoomClock::Timed { duration_secs })
        }
    }

    pub fn resolve_model_path(&self) -> Result<PathBuf> {
        find_model_asset(&self.model)
            .with_context(|| format!("no model found at '{}'", self.model.display()))
    }

    /// Builds the sketch options; CLI clock flags win over the tuning file.
    pub fn sketch_options(&self) -> Result<SketchOptions> {
        let tuning = match &self.fit_config {
            Some(path) => TuningFile::load(path)?,
            None => TuningFile::default(),
        };

        let mut zoom = tuning.zoom.unwrap_or_default();
        if let Some(clock) = self.zoom_clock() {
            zoom.clock = clock;
        }

        Ok(SketchOptions {
            width: self.width,
            height: self.height,
            device_pixel_ratio: self.pixel_ratio,
            max_pixel_ratio: self.max_pixel_ratio,
            background: background_colour(self.background.as_deref()),
            fit: tuning.fit,
            pin: tuning.pin,
            zoom,
            controls: tuning.controls,
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn defaults_match_design_constants() {
        let cfg = ViewerConfig::parse_from(["map_viewer"]);
        assert_eq!(cfg.max_pixel_ratio, 2.0);
        assert_abs_diff_eq!(cfg.frame_dt(), 1.0 / 60.0);

        let opts = cfg.sketch_options().unwrap();
        assert_eq!(opts.background, 0x9f988c);
        assert_eq!(opts.zoom.clock, ZoomClock::default());
        assert_eq!(opts.fit, FitConfig::default());
    }

    #[test]
    fn fixed_step_flag_selects_legacy_clock() {
        let cfg = ViewerConfig::parse_from(["map_viewer", "--fixed-step", "--background", "#102030"]);
        let opts = cfg.sketch_options().unwrap();
        assert_eq!(opts.zoom.clock, ZoomClock::LEGACY);
        assert_eq!(opts.background, 0x102030);
    }

    #[test]
    fn tuning_file_overrides_only_given_fields() {
        let tuning =
            TuningFile::from_json(r#"{ "fit": { "stretch_x": 1.5 }, "pin": { "drop": 1.0 }, "controls": { "click_slop_px": 5.0 } }"#).unwrap();
        assert_eq!(tuning.fit.stretch_x, 1.5);
        assert_eq!(tuning.fit.stretch_z, 0.9);
        assert_eq!(tuning.pin.drop, 1.0);
        assert!(tuning.zoom.is_none());
        assert_eq!(tuning.controls.click_slop_px, 5.0);
        assert_eq!(tuning.controls.drag_rotation_speed, 0.005);
    }

    #[test]
    fn tuning_file_rejects_unusable_fit_constants() {
        let err = TuningFile::from_json(r#"{ "fit": { "stretch_x": 0.0 } }"#).unwrap_err();
        assert!(err.to_string().contains("stretch_x"), "{err:#}");

        assert!(TuningFile::from_json(r#"{ "fit": { "view_fill": -0.8 } }"#).is_err());
        assert!(TuningFile::from_json(r#"{ "fit": { "clearance": 0.0 } }"#).is_ok());
    }
}
