//! Translates raw keyboard/pointer events into model rotation and clicks.

use glam::{Vec2, Vec3};
use mapfit::{NodeId, SceneError, SceneGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Keys the sketch reacts to. Names follow DOM `key` / `code` values,
/// lower-cased (`"arrowleft"`, `"a"`, `"keya"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    A,
    D,
    W,
    S,
    Q,
    E,
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("key").unwrap_or(&lower);
        Ok(match name {
            "arrowleft" => Key::ArrowLeft,
            "arrowright" => Key::ArrowRight,
            "arrowup" => Key::ArrowUp,
            "arrowdown" => Key::ArrowDown,
            "a" => Key::A,
            "d" => Key::D,
            "w" => Key::W,
            "s" => Key::S,
            "q" => Key::Q,
            "e" => Key::E,
            _ => return Err(format!("unmapped key {s:?}")),
        })
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Default, Clone)]
pub struct KeyState {
    pressed: HashSet<Key>,
}

impl KeyState {
    pub fn press(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    fn any(&self, keys: &[Key]) -> bool {
        keys.iter().any(|k| self.is_pressed(*k))
    }

    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    /// Signed rotation direction per axis from the held keys.
    pub fn rotation_axes(&self) -> Vec3 {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        Vec3::new(
            axis(
                self.any(&[Key::ArrowUp, Key::W]),
                self.any(&[Key::ArrowDown, Key::S]),
            ),
            axis(
                self.any(&[Key::ArrowLeft, Key::A]),
                self.any(&[Key::ArrowRight, Key::D]),
            ),
            axis(self.is_pressed(Key::Q), self.is_pressed(Key::E)),
        )
    }
}

/// Raw input, in canvas-local logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    KeyDown(Key),
    KeyUp(Key),
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    PointerLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    Default,
    Grabbing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Keyboard rotation speed, radians per second.
    pub key_rotation_speed: f32,
    /// Drag rotation, radians per pixel.
    pub drag_rotation_speed: f32,
    /// Press/release further apart than this is a drag, not a click.
    pub click_slop_px: f32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            // 0.02 rad per 60 Hz frame.
            key_rotation_speed: 1.2,
            drag_rotation_speed: 0.005,
            click_slop_px: 3.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Controls {
    pub keys: KeyState,
    settings: ControlSettings,
    dragging: bool,
    last_pointer: Option<Vec2>,
    press_origin: Option<Vec2>,
}

impl Controls {
    pub fn new(settings: ControlSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn cursor(&self) -> Cursor {
        if self.dragging {
            Cursor::Grabbing
        } else {
            Cursor::Default
        }
    }

    /// Handles one event. Drags rotate `model` directly; returns the click
    /// position when a press/release pair stays within the click slop.
    pub fn handle_event(
        &mut self,
        event: &ControlEvent,
        scene: &mut SceneGraph,
        model: Option<NodeId>,
    ) -> Result<Option<Vec2>, SceneError> {
        match *event {
            ControlEvent::KeyDown(key) => self.keys.press(key),
            ControlEvent::KeyUp(key) => self.keys.release(key),
            ControlEvent::PointerDown { x, y } => {
                let p = Vec2::new(x, y);
                self.dragging = true;
                self.last_pointer = Some(p);
                self.press_origin = Some(p);
            }
            ControlEvent::PointerMove { x, y } => {
                let p = Vec2::new(x, y);
                if let (true, Some(last), Some(model)) = (self.dragging, self.last_pointer, model) {
                    let delta = p - last;
                    let rotation = &mut scene.transform_mut(model)?.rotation;
                    rotation.y += delta.x * self.settings.drag_rotation_speed;
                    rotation.x += delta.y * self.settings.drag_rotation_speed;
                }
                self.last_pointer = Some(p);
            }
            ControlEvent::PointerUp { x, y } => {
                let p = Vec2::new(x, y);
                let was_dragging = std::mem::take(&mut self.dragging);
                let origin = self.press_origin.take();
                if let (true, Some(origin)) = (was_dragging, origin) {
                    if origin.distance(p) <= self.settings.click_slop_px {
                        return Ok(Some(p));
                    }
                }
            }
            ControlEvent::PointerLeave => {
                self.dragging = false;
                self.press_origin = None;
            }
        }
        Ok(None)
    }

    /// Applies held-key rotation for one frame of `dt_secs`.
    pub fn apply_keys(&self, dt_secs: f32, scene: &mut SceneGraph, model: NodeId) -> Result<(), SceneError> {
        let axes = self.keys.rotation_axes();
        if axes == Vec3::ZERO {
            return Ok(());
        }
        scene.transform_mut(model)?.rotation += axes * self.settings.key_rotation_speed * dt_secs;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.keys.clear();
        self.dragging = false;
        self.last_pointer = None;
        self.press_origin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mapfit::scene::NodeKind;

    fn setup() -> (SceneGraph, NodeId, Controls) {
        let mut scene = SceneGraph::new();
        let model = scene.spawn("model", NodeKind::Group);
        (scene, model, Controls::new(ControlSettings::default()))
    }

    #[test]
    fn key_names_parse_from_key_and_code() {
        assert_eq!("ArrowLeft".parse::<Key>(), Ok(Key::ArrowLeft));
        assert_eq!("KeyA".parse::<Key>(), Ok(Key::A));
        assert_eq!("e".parse::<Key>(), Ok(Key::E));
        assert!("Escape".parse::<Key>().is_err());
    }

    #[test]
    fn held_keys_rotate_per_second() {
        let (mut scene, model, mut controls) = setup();
        for key in [Key::A, Key::W, Key::E] {
            controls.handle_event(&ControlEvent::KeyDown(key), &mut scene, Some(model)).unwrap();
        }
        controls.apply_keys(1.0 / 60.0, &mut scene, model).unwrap();

        let r = scene.transform(model).unwrap().rotation;
        assert_abs_diff_eq!(r.y, 0.02, epsilon = 1e-6);
        assert_abs_diff_eq!(r.x, 0.02, epsilon = 1e-6);
        assert_abs_diff_eq!(r.z, -0.02, epsilon = 1e-6);

        controls.handle_event(&ControlEvent::KeyUp(Key::A), &mut scene, Some(model)).unwrap();
        controls.handle_event(&ControlEvent::KeyDown(Key::D), &mut scene, Some(model)).unwrap();
        assert_eq!(controls.keys.rotation_axes().y, -1.0);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut keys = KeyState::default();
        keys.press(Key::ArrowLeft);
        keys.press(Key::D);
        assert_eq!(keys.rotation_axes(), Vec3::ZERO);
    }

    #[test]
    fn drag_rotates_and_is_not_a_click() {
        let (mut scene, model, mut controls) = setup();
        let m = Some(model);
        controls.handle_event(&ControlEvent::PointerDown { x: 100.0, y: 100.0 }, &mut scene, m).unwrap();
        assert_eq!(controls.cursor(), Cursor::Grabbing);
        controls.handle_event(&ControlEvent::PointerMove { x: 140.0, y: 90.0 }, &mut scene, m).unwrap();
        let click = controls.handle_event(&ControlEvent::PointerUp { x: 140.0, y: 90.0 }, &mut scene, m).unwrap();

        assert!(click.is_none());
        assert_eq!(controls.cursor(), Cursor::Default);
        let r = scene.transform(model).unwrap().rotation;
        assert_abs_diff_eq!(r.y, 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(r.x, -0.05, epsilon = 1e-6);
    }

    #[test]
    fn press_release_in_place_is_a_click() {
        let (mut scene, model, mut controls) = setup();
        let m = Some(model);
        controls.handle_event(&ControlEvent::PointerDown { x: 10.0, y: 20.0 }, &mut scene, m).unwrap();
        let click = controls.handle_event(&ControlEvent::PointerUp { x: 11.0, y: 21.0 }, &mut scene, m).unwrap();
        assert_eq!(click, Some(Vec2::new(11.0, 21.0)));
    }

    #[test]
    fn leave_cancels_drag() {
        let (mut scene, model, mut controls) = setup();
        let m = Some(model);
        controls.handle_event(&ControlEvent::PointerDown { x: 0.0, y: 0.0 }, &mut scene, m).unwrap();
        controls.handle_event(&ControlEvent::PointerLeave, &mut scene, m).unwrap();
        controls.handle_event(&ControlEvent::PointerMove { x: 50.0, y: 50.0 }, &mut scene, m).unwrap();
        assert_eq!(scene.transform(model).unwrap().rotation, Vec3::ZERO);
    }

    #[test]
    fn moves_without_model_are_ignored() {
        let (mut scene, _model, mut controls) = setup();
        controls.handle_event(&ControlEvent::PointerDown { x: 0.0, y: 0.0 }, &mut scene, None).unwrap();
        assert!(controls
            .handle_event(&ControlEvent::PointerMove { x: 9.0, y: 9.0 }, &mut scene, None)
            .unwrap()
            .is_none());
    }
}
