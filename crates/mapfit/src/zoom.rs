//! Click-to-zoom camera animation between the default view and the pin.

use crate::camera::CameraFrame;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How animation progress advances per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoomClock {
    /// Fixed increment per frame regardless of elapsed time.
    FixedStep { step: f32 },
    /// Elapsed-time interpolation over a fixed duration.
    Timed { duration_secs: f32 },
}

impl Default for ZoomClock {
    fn default() -> Self {
        // Twenty 60 Hz frames.
        ZoomClock::Timed {
            duration_secs: 1.0 / 3.0,
        }
    }
}

impl ZoomClock {
    pub const LEGACY: Self = ZoomClock::FixedStep { step: 0.05 };

    pub fn advance(&self, progress: f32, dt_secs: f32) -> f32 {
        let next = match *self {
            ZoomClock::FixedStep { step } => progress + step,
            ZoomClock::Timed { duration_secs } if duration_secs > 0.0 => {
                progress + dt_secs.max(0.0) / duration_secs
            }
            ZoomClock::Timed { .. } => 1.0,
        };
        next.min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Camera offset from the pin when zoomed in.
    pub pin_offset: Vec3,
    pub clock: ZoomClock,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            pin_offset: Vec3::new(0.0, 2.5, 3.0),
            clock: ZoomClock::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ZoomDirection {
    ToPin,
    ToDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ZoomPhase {
    Idle { pin_focused: bool },
    AnimatingToPin,
    AnimatingToDefault,
}

#[derive(Debug, Clone)]
pub struct CameraZoom {
    phase: ZoomPhase,
    progress: f32,
    start: CameraFrame,
    target: CameraFrame,
    default_frame: CameraFrame,
    config: ZoomConfig,
}

impl CameraZoom {
    pub fn new(default_frame: CameraFrame, config: ZoomConfig) -> Self {
        Self {
            phase: ZoomPhase::Idle { pin_focused: false },
            progress: 0.0,
            start: default_frame,
            target: default_frame,
            default_frame,
            config,
        }
    }

    pub fn phase(&self) -> ZoomPhase {
        self.phase
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn start_frame(&self) -> CameraFrame {
        self.start
    }

    pub fn target_frame(&self) -> CameraFrame {
        self.target
    }

    pub fn default_frame(&self) -> CameraFrame {
        self.default_frame
    }

    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    pub fn is_animating(&self) -> bool {
        !matches!(self.phase, ZoomPhase::Idle { .. })
    }

    /// Pin-focused when resting on the pin or already heading there.
    pub fn is_pin_focused(&self) -> bool {
        match self.phase {
            ZoomPhase::Idle { pin_focused } => pin_focused,
            ZoomPhase::AnimatingToPin => true,
            ZoomPhase::AnimatingToDefault => false,
        }
    }

    /// Reacts to a click that hit the pin. `current` is the camera as it is
    /// right now (possibly mid-animation); `pin_world` must be sampled at
    /// click time since the pin moves with the model.
    pub fn on_pin_hit(&mut self, current: CameraFrame, pin_world: Vec3) -> ZoomDirection {
        let direction = if self.is_pin_focused() {
            ZoomDirection::ToDefault
        } else {
            ZoomDirection::ToPin
        };

        self.start = current;
        self.progress = 0.0;
        match direction {
            ZoomDirection::ToPin => {
                self.target = CameraFrame::new(pin_world + self.config.pin_offset, pin_world);
                self.phase = ZoomPhase::AnimatingToPin;
            }
            ZoomDirection::ToDefault => {
                self.target = self.default_frame;
                self.phase = ZoomPhase::AnimatingToDefault;
            }
        }

        log::debug!(
            "Zoom {:?}: from {:?} to {:?}",
            direction,
            self.start.position,
            self.target.position
        );
        direction
    }

    /// Advances one frame. Returns the camera frame to apply while animating.
    pub fn tick(&mut self, dt_secs: f32) -> Option<CameraFrame> {
        let heading_to_pin = match self.phase {
            ZoomPhase::Idle { .. } => return None,
            ZoomPhase::AnimatingToPin => true,
            ZoomPhase::AnimatingToDefault => false,
        };

        self.progress = self.config.clock.advance(self.progress, dt_secs);
        if self.progress < 1.0 {
            return Some(self.start.lerp(&self.target, self.progress));
        }

        self.progress = 1.0;
        self.phase = ZoomPhase::Idle {
            pin_focused: heading_to_pin,
        };
        log::debug!("Zoom finished; pin focused: {heading_to_pin}");
        Some(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn default_frame() -> CameraFrame {
        CameraFrame::new(Vec3::new(10.0, 6.0, 10.0), Vec3::ZERO)
    }

    fn legacy() -> CameraZoom {
        CameraZoom::new(
            default_frame(),
            ZoomConfig {
                clock: ZoomClock::LEGACY,
                ..ZoomConfig::default()
            },
        )
    }

    #[test]
    fn hit_from_default_animates_to_pin_and_settles() {
        let mut zoom = legacy();
        let pin = Vec3::new(0.5, 1.0, -0.5);
        assert_eq!(zoom.on_pin_hit(default_frame(), pin), ZoomDirection::ToPin);
        assert_eq!(zoom.phase(), ZoomPhase::AnimatingToPin);
        assert_eq!(zoom.progress(), 0.0);
        assert_eq!(zoom.target_frame().look_at, pin);
        assert_eq!(zoom.target_frame().position, pin + Vec3::new(0.0, 2.5, 3.0));

        for tick in 1..20 {
            assert!(zoom.tick(DT).is_some());
            assert_eq!(zoom.phase(), ZoomPhase::AnimatingToPin, "settled early at tick {tick}");
            assert!(zoom.progress() < 1.0);
        }

        let twentieth = zoom.tick(DT);
        assert_eq!(zoom.progress(), 1.0);
        assert_eq!(zoom.phase(), ZoomPhase::Idle { pin_focused: true });
        assert_eq!(twentieth, Some(zoom.target_frame()));
        assert!(zoom.tick(DT).is_none());
    }

    #[test]
    fn second_hit_returns_to_default() {
        let mut zoom = legacy();
        let pin = Vec3::new(1.0, 0.0, 0.0);
        zoom.on_pin_hit(default_frame(), pin);
        while zoom.tick(DT).is_some() && zoom.is_animating() {}

        let at_pin = zoom.target_frame();
        assert_eq!(zoom.on_pin_hit(at_pin, pin), ZoomDirection::ToDefault);
        assert_eq!(zoom.start_frame(), at_pin);
        assert_eq!(zoom.target_frame(), default_frame());
        while zoom.tick(DT).is_some() && zoom.is_animating() {}
        assert_eq!(zoom.phase(), ZoomPhase::Idle { pin_focused: false });
    }

    #[test]
    fn retrigger_mid_flight_reverses_from_current_frame() {
        let mut zoom = legacy();
        zoom.on_pin_hit(default_frame(), Vec3::new(0.0, 1.0, 0.0));
        let mut current = default_frame();
        for _ in 0..8 {
            current = zoom.tick(DT).unwrap();
        }
        assert!((zoom.progress() - 0.4).abs() < 1e-5);

        assert_eq!(zoom.on_pin_hit(current, Vec3::new(0.0, 1.0, 0.0)), ZoomDirection::ToDefault);
        assert_eq!(zoom.phase(), ZoomPhase::AnimatingToDefault);
        assert_eq!(zoom.progress(), 0.0);
        assert_eq!(zoom.start_frame(), current);
        assert_ne!(zoom.start_frame(), default_frame());
    }

    #[test]
    fn timed_clock_is_independent_of_frame_rate() {
        let run = |hz: f32| {
            let mut zoom = CameraZoom::new(default_frame(), ZoomConfig::default());
            zoom.on_pin_hit(default_frame(), Vec3::ZERO);
            let mut frames = 0;
            while zoom.is_animating() {
                zoom.tick(1.0 / hz);
                frames += 1;
            }
            frames as f32 / hz
        };
        let at_60 = run(60.0);
        let at_144 = run(144.0);
        assert!((at_60 - 1.0 / 3.0).abs() < 1.0 / 60.0 + 1e-4);
        assert!((at_144 - 1.0 / 3.0).abs() < 1.0 / 144.0 + 1e-4);
    }

    #[test]
    fn idle_tick_is_a_no_op() {
        let mut zoom = legacy();
        assert!(zoom.tick(DT).is_none());
        assert_eq!(zoom.progress(), 0.0);
        assert_eq!(zoom.phase(), ZoomPhase::Idle { pin_focused: false });
    }

    #[test]
    fn clock_clamps_to_one() {
        assert_eq!(ZoomClock::LEGACY.advance(0.99, DT), 1.0);
        assert_eq!(ZoomClock::Timed { duration_secs: 0.0 }.advance(0.0, DT), 1.0);
        assert_eq!(ZoomClock::Timed { duration_secs: 1.0 }.advance(0.5, -3.0), 0.5);
    }
}
