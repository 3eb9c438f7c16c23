//! Globe/focus stage and 2D/3D projection as one closed state.
//!
//! Projection changes are serialized: while one is in flight, further
//! requests queue up and start only after [`ModeStateMachine::complete_projection`].

use std::collections::VecDeque;

use foundation::{LngLat, Projection};
use layers::{CameraPose, MapProjection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::orbit::CameraMode;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub name: String,
    pub center: LngLat,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Stage {
    #[default]
    Globe,
    Focus(Selection),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusSettings {
    pub zoom: f64,
    /// Pitch of the 3D view; the 2D view always looks straight down.
    pub pitch: f64,
    pub bearing: f64,
    pub duration_ms: u32,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            zoom: 10.5,
            pitch: 60.0,
            bearing: -20.0,
            duration_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeSettings {
    /// Where a reset flies back to.
    pub home: CameraPose,
    pub duration_ms: u32,
}

impl Default for GlobeSettings {
    fn default() -> Self {
        Self {
            home: CameraPose::new(LngLat::new(78.9629, 20.5937), 1.6, 0.0, 0.0),
            duration_ms: 2500,
        }
    }
}

/// A camera flight the caller must issue to the engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlyPlan {
    pub pose: CameraPose,
    pub duration_ms: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProjectionRequest {
    /// No transition was in flight; this one starts now.
    Started(Projection),
    /// Applied after the in-flight transition completes.
    Queued(Projection),
    /// Already the current (or last pending) projection.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ModeStateMachine {
    stage: Stage,
    projection: Projection,
    in_flight: Option<Projection>,
    queued: VecDeque<Projection>,
    focus: FocusSettings,
    globe: GlobeSettings,
}

impl ModeStateMachine {
    pub fn new(focus: FocusSettings, globe: GlobeSettings) -> Self {
        Self {
            focus,
            globe,
            ..Self::default()
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.stage {
            Stage::Focus(sel) => Some(sel),
            Stage::Globe => None,
        }
    }

    pub fn location_selected(&self) -> bool {
        matches!(self.stage, Stage::Focus(_))
    }

    pub fn camera_mode(&self) -> CameraMode {
        match self.stage {
            Stage::Globe => CameraMode::Globe,
            Stage::Focus(_) => CameraMode::Focus,
        }
    }

    /// Projection currently in effect. An in-flight change is not counted
    /// until it completes.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn in_flight(&self) -> Option<Projection> {
        self.in_flight
    }

    pub fn queued(&self) -> impl Iterator<Item = Projection> + '_ {
        self.queued.iter().copied()
    }

    /// Engine projection for `projection` in the current stage. The overview
    /// is always a globe; a focused site follows the projection.
    pub fn engine_projection(&self, projection: Projection) -> MapProjection {
        match (&self.stage, projection) {
            (Stage::Globe, _) | (Stage::Focus(_), Projection::ThreeD) => MapProjection::Globe,
            (Stage::Focus(_), Projection::TwoD) => MapProjection::Mercator,
        }
    }

    pub fn focus_pitch(&self, projection: Projection) -> f64 {
        match projection {
            Projection::TwoD => 0.0,
            Projection::ThreeD => self.focus.pitch,
        }
    }

    /// Enters focus on `selection` and returns the flight to it.
    pub fn select(&mut self, selection: Selection) -> FlyPlan {
        info!("focusing {} at {:?}", selection.name, selection.center.as_array());
        let pose = CameraPose::new(
            selection.center,
            self.focus.zoom,
            self.focus_pitch(self.target_projection()),
            self.focus.bearing,
        );
        self.stage = Stage::Focus(selection);
        FlyPlan {
            pose,
            duration_ms: self.focus.duration_ms,
        }
    }

    /// Returns to the globe overview. `None` when already there.
    pub fn reset(&mut self) -> Option<FlyPlan> {
        if matches!(self.stage, Stage::Globe) {
            return None;
        }
        info!("resetting to globe overview");
        self.stage = Stage::Globe;
        Some(FlyPlan {
            pose: self.globe.home,
            duration_ms: self.globe.duration_ms,
        })
    }

    /// Toggles relative to the last requested projection.
    pub fn request_toggle(&mut self) -> ProjectionRequest {
        self.request_projection(self.target_projection().toggled())
    }

    pub fn request_projection(&mut self, target: Projection) -> ProjectionRequest {
        if target == self.target_projection() {
            return ProjectionRequest::Unchanged;
        }
        if self.in_flight.is_some() {
            debug!("projection change to {target:?} queued");
            self.queued.push_back(target);
            return ProjectionRequest::Queued(target);
        }
        self.in_flight = Some(target);
        ProjectionRequest::Started(target)
    }

    /// Commits the in-flight change and starts the next queued one, if any.
    pub fn complete_projection(&mut self) -> Option<Projection> {
        let done = self.in_flight.take()?;
        self.projection = done;
        while let Some(next) = self.queued.pop_front() {
            if next != self.projection {
                self.in_flight = Some(next);
                return Some(next);
            }
        }
        None
    }

    /// Drops every pending change; the current projection stays.
    pub fn cancel_projection(&mut self) {
        self.in_flight = None;
        self.queued.clear();
    }

    /// Projection once every pending change has been applied.
    pub fn target_projection(&self) -> Projection {
        self.queued
            .back()
            .copied()
            .or(self.in_flight)
            .unwrap_or(self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paris() -> Selection {
        Selection {
            name: "Paris".to_string(),
            center: LngLat::new(2.3522, 48.8566),
        }
    }

    #[test]
    fn select_and_reset() {
        let mut m = ModeStateMachine::new(FocusSettings::default(), GlobeSettings::default());
        assert_eq!(m.camera_mode(), CameraMode::Globe);
        assert_eq!(m.reset(), None);

        let plan = m.select(paris());
        assert!(m.location_selected());
        assert_eq!(plan.pose.center, paris().center);
        assert_eq!(plan.pose.pitch, 0.0);
        assert_eq!(plan.duration_ms, FocusSettings::default().duration_ms);
        assert_eq!(m.engine_projection(m.projection()), MapProjection::Mercator);

        let back = m.reset().unwrap();
        assert_eq!(back.pose, GlobeSettings::default().home);
        assert_eq!(m.selection(), None);
        assert_eq!(m.engine_projection(m.projection()), MapProjection::Globe);
    }

    #[test]
    fn projection_changes_are_serialized() {
        let mut m = ModeStateMachine::default();
        assert_eq!(m.request_toggle(), ProjectionRequest::Started(Projection::ThreeD));
        assert_eq!(m.projection(), Projection::TwoD);
        assert_eq!(m.request_toggle(), ProjectionRequest::Queued(Projection::TwoD));
        assert_eq!(m.request_projection(Projection::TwoD), ProjectionRequest::Unchanged);

        assert_eq!(m.complete_projection(), Some(Projection::TwoD));
        assert_eq!(m.projection(), Projection::ThreeD);
        assert_eq!(m.complete_projection(), None);
        assert_eq!(m.projection(), Projection::TwoD);
        assert_eq!(m.in_flight(), None);
    }

    #[test]
    fn focus_in_3d_uses_pitch() {
        let mut m = ModeStateMachine::default();
        m.request_projection(Projection::ThreeD);
        m.complete_projection();
        let plan = m.select(paris());
        assert_eq!(plan.pose.pitch, FocusSettings::default().pitch);
        assert_eq!(m.engine_projection(m.projection()), MapProjection::Globe);
    }
}
