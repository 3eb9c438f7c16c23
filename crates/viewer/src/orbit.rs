use foundation::LngLat;
use foundation::time::Time;
use layers::{CameraPose, MapEngine};
use runtime::TimerArena;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TimerKey;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    #[default]
    Globe,
    Focus,
}

/// The camera as the visualization wants it. Only [`CameraOrbitController`]
/// writes it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraState {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub mode: CameraMode,
}

impl CameraState {
    pub fn from_pose(pose: CameraPose, mode: CameraMode) -> Self {
        Self {
            center: pose.center,
            zoom: pose.zoom,
            pitch: pose.pitch,
            bearing: pose.bearing.rem_euclid(360.0),
            mode,
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.center, self.zoom, self.pitch, self.bearing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    /// Bearing step per frame in the globe overview, degrees.
    pub globe_step_deg: f64,
    /// Bearing step per frame around a focused site, degrees.
    pub focus_step_deg: f64,
    pub resume_delay_s: f64,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            globe_step_deg: 0.06,
            focus_step_deg: 0.2,
            resume_delay_s: 5.0,
        }
    }
}

impl OrbitSettings {
    pub fn step(&self, mode: CameraMode) -> f64 {
        match mode {
            CameraMode::Globe => self.globe_step_deg,
            CameraMode::Focus => self.focus_step_deg,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrbitPhase {
    Running,
    /// Stopped by user interaction; a resume timer is pending.
    Paused,
    /// Stopped until re-anchored (camera flight in progress, teardown).
    Halted,
}

#[derive(Debug)]
pub struct CameraOrbitController {
    state: CameraState,
    settings: OrbitSettings,
    phase: OrbitPhase,
}

impl CameraOrbitController {
    pub fn new(initial: CameraPose, settings: OrbitSettings) -> Self {
        Self {
            state: CameraState::from_pose(initial, CameraMode::Globe),
            settings,
            phase: OrbitPhase::Running,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn phase(&self) -> OrbitPhase {
        self.phase
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    /// Advances the bearing one step and commits the pose. Returns whether
    /// the camera moved.
    pub fn tick(&mut self, engine: &mut dyn MapEngine) -> bool {
        if self.phase != OrbitPhase::Running {
            return false;
        }
        let step = self.settings.step(self.state.mode);
        self.state.bearing = (self.state.bearing + step).rem_euclid(360.0);
        engine.jump_to(&self.state.pose());
        true
    }

    /// Stops orbiting and (re)arms the resume timer. Has no effect while halted.
    pub fn pause(&mut self, now: Time, timers: &mut TimerArena<TimerKey>) {
        if self.phase == OrbitPhase::Halted {
            return;
        }
        self.phase = OrbitPhase::Paused;
        let at = now.after(self.settings.resume_delay_s);
        timers.schedule(TimerKey::OrbitResume, at);
        debug!("orbit paused until {:.3}s", at.seconds());
    }

    pub fn resume(&mut self, timers: &mut TimerArena<TimerKey>) {
        timers.cancel(TimerKey::OrbitResume);
        if self.phase == OrbitPhase::Paused {
            self.phase = OrbitPhase::Running;
            debug!("orbit resumed at bearing {:.2}", self.state.bearing);
        }
    }

    pub fn halt(&mut self, timers: &mut TimerArena<TimerKey>) {
        timers.cancel(TimerKey::OrbitResume);
        self.phase = OrbitPhase::Halted;
    }

    /// Takes over `pose` (the camera position the engine reports, e.g. after
    /// a flight lands) and starts orbiting from its bearing.
    pub fn anchor(&mut self, pose: CameraPose, mode: CameraMode) {
        self.state = CameraState::from_pose(pose, mode);
        self.phase = OrbitPhase::Running;
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        self.state.pitch = pitch;
    }

    /// Records a camera pose the user moved to, keeping the orbit phase.
    pub fn observe(&mut self, pose: CameraPose) {
        self.state = CameraState::from_pose(pose, self.state.mode);
    }
}
