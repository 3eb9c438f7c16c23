use foundation::math::ScreenPoint;
use layers::MapEngine;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::particles::{Particle, ParticleField};
use crate::series::FlowSeries;

/// One short line segment on the overlay canvas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Arrow {
    pub origin: ScreenPoint,
    /// Compass heading on screen, radians clockwise from up.
    pub heading_rad: f64,
    pub length_px: f64,
}

impl Arrow {
    pub fn tip(&self) -> ScreenPoint {
        self.origin.toward(self.heading_rad, self.length_px)
    }
}

/// 2D drawing surface layered over the map.
pub trait ArrowCanvas {
    fn clear(&mut self);
    fn draw_arrow(&mut self, arrow: &Arrow);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrowSettings {
    pub particle_count: usize,
    /// Frames a particle lives before it is respawned.
    pub max_age: u32,
    pub length_cap_px: f64,
    /// Pixels of arrow per m/s of wind speed.
    pub px_per_speed: f64,
    /// Per-frame advection as a fraction of the visible longitude span.
    pub step_fraction: f64,
}

impl Default for ArrowSettings {
    fn default() -> Self {
        Self {
            particle_count: 200,
            max_age: 90,
            length_cap_px: 22.0,
            px_per_speed: 3.0,
            step_fraction: 0.0015,
        }
    }
}

/// Particles advected across the visible region, drawn as short arrows.
#[derive(Debug)]
pub struct ScreenSpaceArrowRenderer {
    settings: ArrowSettings,
    field: ParticleField,
    series: FlowSeries,
    suppressed: bool,
}

impl ScreenSpaceArrowRenderer {
    pub fn new(settings: ArrowSettings, series: FlowSeries, engine: &dyn MapEngine, rng: SmallRng) -> Self {
        let field = ParticleField::new(settings.particle_count, settings.max_age, engine.bounds(), rng);
        Self {
            settings,
            field,
            series,
            suppressed: false,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        self.field.particles()
    }

    pub fn series(&self) -> &FlowSeries {
        &self.series
    }

    pub fn set_series(&mut self, series: FlowSeries) {
        self.series.replace(series);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn arrow_length(&self, speed_ms: f64) -> f64 {
        (speed_ms * self.settings.px_per_speed).min(self.settings.length_cap_px)
    }

    /// Draws one frame and advances particles and the frame cursor.
    /// Returns the number of arrows drawn.
    pub fn repaint(&mut self, engine: &dyn MapEngine, canvas: &mut dyn ArrowCanvas) -> usize {
        canvas.clear();
        if self.suppressed {
            return 0;
        }
        let Some(frame) = self.series.current().copied() else {
            return 0;
        };

        let heading_rad = frame.heading_rad();
        let length_px = self.arrow_length(frame.speed_ms);
        for p in self.field.particles() {
            canvas.draw_arrow(&Arrow {
                origin: engine.project(p.position()),
                heading_rad,
                length_px,
            });
        }

        let bounds = engine.bounds();
        let step_deg = self.settings.step_fraction * bounds.width().abs();
        self.field.advance(heading_rad, step_deg, bounds);
        self.series.advance();
        self.field.particles().len()
    }

    pub fn dispose(&mut self, canvas: &mut dyn ArrowCanvas) {
        canvas.clear();
        self.field.clear();
    }
}
