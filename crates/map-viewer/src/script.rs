//! Scripted input for the headless runner: which events to feed on which frame.

use crate::{
    app::SketchContext,
    controls::{ControlEvent, Key},
    renderer::FrameRenderer,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptAction {
    KeyDown { key: Key },
    KeyUp { key: Key },
    /// Press and release at one canvas pixel.
    Click { x: f32, y: f32 },
    /// Click wherever the pin currently projects to.
    ClickPin,
    Drag { from: [f32; 2], to: [f32; 2] },
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptStep {
    /// Applied before this frame is rendered.
    pub frame: u64,
    pub action: ScriptAction,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InputScript {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl InputScript {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read input script '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse input script '{}'", path.display()))
    }

    pub fn steps_at(&self, frame: u64) -> impl Iterator<Item = &ScriptAction> {
        self.steps
            .iter()
            .filter(move |s| s.frame == frame)
            .map(|s| &s.action)
    }

    /// Feeds every action scheduled for `frame` into the sketch.
    pub fn apply(&self, frame: u64, sketch: &mut SketchContext, renderer: &mut dyn FrameRenderer) {
        for action in self.steps_at(frame) {
            log::debug!("Frame {frame}: {action:?}");
            match *action {
                ScriptAction::KeyDown { key } => sketch.handle_control(&ControlEvent::KeyDown(key)),
                ScriptAction::KeyUp { key } => sketch.handle_control(&ControlEvent::KeyUp(key)),
                ScriptAction::Click { x, y } => click(sketch, x, y),
                ScriptAction::ClickPin => match sketch.pin_screen_position() {
                    Some(at) => click(sketch, at.x, at.y),
                    None => log::warn!("Frame {frame}: no pin on screen to click"),
                },
                ScriptAction::Drag { from, to } => {
                    sketch.handle_control(&ControlEvent::PointerDown { x: from[0], y: from[1] });
                    sketch.handle_control(&ControlEvent::PointerMove { x: to[0], y: to[1] });
                    sketch.handle_control(&ControlEvent::PointerUp { x: to[0], y: to[1] });
                }
                ScriptAction::Resize { width, height } => sketch.resize(width, height, renderer),
            }
        }
    }
}

fn click(sketch: &mut SketchContext, x: f32, y: f32) {
    sketch.handle_control(&ControlEvent::PointerDown { x, y });
    sketch.handle_control(&ControlEvent::PointerUp { x, y });
}
