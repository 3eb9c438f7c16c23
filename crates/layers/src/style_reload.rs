//! Re-attachment of core-owned layers after a basemap swap.
//!
//! Swapping the basemap style discards every source and layer the core added.
//! On each "style ready" signal the coordinator replays a fixed, ordered list
//! of attachments. Every step is idempotent, so replaying over layers that
//! survived (or were re-added by someone else) is harmless.

use tracing::{debug, info, warn};

use crate::engine::{EngineError, MapEngine};
use crate::highlight::HighlightOverlayManager;
use crate::registration::{Attach, LayerRegistration, attach_custom_layer};
use crate::terrain::TerrainOverlay;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    Terrain,
    Buildings,
    Highlight,
    FlowLayer,
}

pub const REPLAY_ORDER: [ReplayStep; 4] = [
    ReplayStep::Terrain,
    ReplayStep::Buildings,
    ReplayStep::Highlight,
    ReplayStep::FlowLayer,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Attached,
    AlreadyPresent,
    /// Nothing to attach (no highlight stored, no 3D flow layer active).
    Skipped,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    pub steps: Vec<(ReplayStep, StepOutcome)>,
    pub errors: Vec<(ReplayStep, EngineError)>,
}

impl ReplayReport {
    pub fn outcome(&self, step: ReplayStep) -> Option<StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| *o)
    }

    fn record(&mut self, step: ReplayStep, result: Result<Option<Attach>, EngineError>) {
        let outcome = match result {
            Ok(Some(Attach::Added)) => StepOutcome::Attached,
            Ok(Some(Attach::AlreadyPresent)) => StepOutcome::AlreadyPresent,
            Ok(None) => StepOutcome::Skipped,
            Err(err) => {
                warn!("style replay step {step:?} failed: {err}");
                self.errors.push((step, err));
                StepOutcome::Failed
            }
        };
        self.steps.push((step, outcome));
    }
}

#[derive(Debug)]
pub struct StyleReloadCoordinator {
    terrain: TerrainOverlay,
    ready: bool,
    replays: u64,
}

impl StyleReloadCoordinator {
    pub fn new(terrain: TerrainOverlay) -> Self {
        Self {
            terrain,
            ready: false,
            replays: 0,
        }
    }

    /// True once a replay has completed for the current style.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn replay_count(&self) -> u64 {
        self.replays
    }

    pub fn terrain(&self) -> &TerrainOverlay {
        &self.terrain
    }

    /// Starts a basemap swap. Layers must not be assumed present until the
    /// next [`replay`](Self::replay) completes.
    pub fn begin_swap(&mut self, engine: &mut dyn MapEngine, style: &str) {
        info!("swapping basemap style to {style}");
        self.ready = false;
        engine.set_style(style);
    }

    /// Replays all attachments in [`REPLAY_ORDER`]. Runs to completion
    /// synchronously; a failing step is logged and does not stop later steps.
    /// The flow layer goes beneath the new style's first label layer.
    pub fn replay(
        &mut self,
        engine: &mut dyn MapEngine,
        highlight: &mut HighlightOverlayManager,
        flow_layer: Option<&LayerRegistration>,
    ) -> ReplayReport {
        let mut report = ReplayReport::default();
        for step in REPLAY_ORDER {
            let result = match step {
                ReplayStep::Terrain => self.terrain.attach_terrain(engine).map(Some),
                ReplayStep::Buildings => self.terrain.attach_buildings(engine).map(Some),
                ReplayStep::Highlight => highlight
                    .restore(engine)
                    .map(|restored| restored.then_some(Attach::Added)),
                ReplayStep::FlowLayer => match flow_layer {
                    Some(reg) => {
                        let below_labels = reg.clone().with_insert_before(engine.first_symbol_layer());
                        attach_custom_layer(engine, &below_labels).map(Some)
                    }
                    None => Ok(None),
                },
            };
            report.record(step, result);
        }

        self.ready = report.errors.iter().all(|(_, e)| *e != EngineError::NotReady);
        self.replays += 1;
        debug!("style replay #{} finished: {:?}", self.replays, report.steps);
        report
    }

    /// Removes terrain and buildings. Used on teardown.
    pub fn teardown(&mut self, engine: &mut dyn MapEngine) {
        self.terrain.detach(engine);
        self.ready = false;
    }
}
