//! The visualization component.
//!
//! One [`Visualization`] owns the camera, the mode state, the overlays and the
//! flow renderer for a single map. The host drives it with:
//!
//! - [`Visualization::frame`] once per display frame,
//! - [`Visualization::on_style_ready`] whenever the engine finishes a style load,
//! - [`Visualization::render_flow_layer`] from the engine's custom-layer callback,
//! - events ([`Visualization::push_event`]) for user input,
//! - [`Visualization::deliver`] with the replies to the requests it takes from
//!   [`Visualization::take_requests`].

use flow::{ArrowCanvas, FlowRendererSlot, FlowTargets, PointCloudGpu};
use foundation::math::mat4_from_slice;
use foundation::time::Time;
use foundation::{LngLat, Projection};
use layers::highlight::{HighlightFeature, HighlightOverlayManager};
use layers::style_reload::{ReplayReport, StyleReloadCoordinator};
use layers::terrain::TerrainOverlay;
use layers::{CameraPose, EngineError, MapEngine};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use runtime::{EventQueue, Frame, Job, Scheduler, TimerArena};
use tracing::{debug, info, warn};

use crate::TimerKey;
use crate::backend::{BackendClient, BoundaryResponse, FetchError, FluxQuery, FluxReport};
use crate::config::VizConfig;
use crate::mode::{FlyPlan, ModeStateMachine, ProjectionRequest, Selection};
use crate::orbit::{CameraMode, CameraOrbitController};

const DEFAULT_SEED: u64 = 0x5eed_f10e;

/// Input from the host page.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    LocationSelected { name: String, center: LngLat },
    RunSimulation(FluxQuery),
    Reset,
    ToggleProjection,
    SetProjection(Projection),
    /// Pointer or wheel input on the map, with the camera pose it left behind.
    UserInteraction { pose: Option<CameraPose> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryTicket {
    pub generation: u64,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FluxTicket {
    pub generation: u64,
    pub query: FluxQuery,
}

/// A backend call the host should perform.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    Boundary(BoundaryTicket),
    Flux(FluxTicket),
}

impl BackendRequest {
    pub async fn send<B: BackendClient>(self, backend: &B) -> BackendReply {
        match self {
            BackendRequest::Boundary(ticket) => {
                let result = backend.boundary(&ticket.city).await;
                BackendReply::Boundary(ticket, result)
            }
            BackendRequest::Flux(ticket) => {
                let result = backend.flux(&ticket.query).await;
                BackendReply::Flux(ticket, result)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    Boundary(BoundaryTicket, Result<BoundaryResponse, FetchError>),
    Flux(FluxTicket, Result<FluxReport, FetchError>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Applied,
    /// Applied to state, but the engine attachment waits for the next style load.
    Deferred,
    /// Superseded by a newer selection, a reset or teardown.
    Stale,
    Failed,
}

/// A camera flight in progress. A drag during the flight ends it wherever
/// the user left the camera.
#[derive(Debug, Copy, Clone, PartialEq)]
struct PendingFlight {
    plan: FlyPlan,
    mode: CameraMode,
    user_pose: Option<CameraPose>,
}

/// Engine, overlay canvas and GPU context the visualization draws into.
#[derive(Debug)]
struct Surfaces<E, C, G> {
    engine: E,
    canvas: C,
    gpu: G,
}

impl<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu> Surfaces<E, C, G> {
    fn targets(&mut self) -> FlowTargets<'_> {
        FlowTargets {
            engine: &mut self.engine,
            canvas: &mut self.canvas,
            gpu: &mut self.gpu,
        }
    }
}

struct VizState<E, C, G> {
    surfaces: Surfaces<E, C, G>,
    config: VizConfig,
    orbit: CameraOrbitController,
    mode: ModeStateMachine,
    timers: TimerArena<TimerKey>,
    events: EventQueue<ViewerEvent>,
    outbox: Vec<BackendRequest>,
    highlight: HighlightOverlayManager,
    style: StyleReloadCoordinator,
    flow: FlowRendererSlot,
    pending_flight: Option<PendingFlight>,
    generation: u64,
    last_report: Option<FluxReport>,
    now: Time,
    torn_down: bool,
}

pub struct Visualization<E, C, G> {
    scheduler: Scheduler<VizState<E, C, G>>,
    state: VizState<E, C, G>,
}

impl<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu> Visualization<E, C, G> {
    /// Wires a visualization onto an engine created from `config.engine`.
    pub fn new(engine: E, canvas: C, gpu: G, config: VizConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed.unwrap_or(DEFAULT_SEED));
        let state = VizState {
            surfaces: Surfaces { engine, canvas, gpu },
            orbit: CameraOrbitController::new(config.engine.initial, config.orbit.clone()),
            mode: ModeStateMachine::new(config.focus.clone(), config.globe.clone()),
            timers: TimerArena::new(),
            events: EventQueue::new(),
            outbox: Vec::new(),
            highlight: HighlightOverlayManager::new(config.highlight),
            style: StyleReloadCoordinator::new(TerrainOverlay::new(config.terrain.clone())),
            flow: FlowRendererSlot::new(config.arrows.clone(), config.point_cloud.clone(), rng),
            pending_flight: None,
            generation: 0,
            last_report: None,
            now: Time::ZERO,
            torn_down: false,
            config,
        };

        let mut scheduler = Scheduler::new();
        scheduler.add_job(Job::with_priority("input", -10, input_job::<E, C, G>));
        scheduler.add_job(Job::with_priority("orbit", 0, orbit_job::<E, C, G>));
        scheduler.add_job(Job::with_priority("flow", 10, flow_job::<E, C, G>));

        Self { scheduler, state }
    }

    pub fn engine(&self) -> &E {
        &self.state.surfaces.engine
    }

    /// Direct engine access for host plumbing (viewport, bounds). Layer
    /// changes made here are not replayed after a style swap.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.state.surfaces.engine
    }

    pub fn canvas(&self) -> &C {
        &self.state.surfaces.canvas
    }

    pub fn gpu(&self) -> &G {
        &self.state.surfaces.gpu
    }

    pub fn config(&self) -> &VizConfig {
        &self.state.config
    }

    pub fn orbit(&self) -> &CameraOrbitController {
        &self.state.orbit
    }

    pub fn mode(&self) -> &ModeStateMachine {
        &self.state.mode
    }

    pub fn highlight(&self) -> &HighlightOverlayManager {
        &self.state.highlight
    }

    pub fn flow(&self) -> &FlowRendererSlot {
        &self.state.flow
    }

    pub fn style(&self) -> &StyleReloadCoordinator {
        &self.state.style
    }

    pub fn timers(&self) -> &TimerArena<TimerKey> {
        &self.state.timers
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Latest successful simulation report.
    pub fn last_report(&self) -> Option<&FluxReport> {
        self.state.last_report.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Queues an event for the start of the next frame.
    pub fn push_event(&mut self, event: ViewerEvent) {
        if !self.state.torn_down {
            self.state.events.push(event);
        }
    }

    /// Handles an event immediately.
    pub fn dispatch(&mut self, event: ViewerEvent) {
        if !self.state.torn_down {
            self.state.handle(event);
        }
    }

    /// Backend calls requested since the last call.
    pub fn take_requests(&mut self) -> Vec<BackendRequest> {
        std::mem::take(&mut self.state.outbox)
    }

    pub fn deliver(&mut self, reply: BackendReply) -> ReplyOutcome {
        self.state.deliver(reply)
    }

    /// Runs one display frame: due timers and queued events, then the orbit
    /// step, then the 2D flow repaint. `None` once torn down.
    pub fn frame(&mut self, now: Time) -> Option<Frame> {
        self.state.now = now;
        self.scheduler.run_frame(&mut self.state, now)
    }

    /// Swaps the basemap. Overlays come back on the next [`on_style_ready`](Self::on_style_ready).
    pub fn set_basemap(&mut self, style_url: &str) {
        if self.state.torn_down {
            return;
        }
        let s = &mut self.state;
        s.style.begin_swap(&mut s.surfaces.engine, style_url);
    }

    /// Re-attaches terrain, buildings, the highlight and the 3D flow layer.
    pub fn on_style_ready(&mut self) -> ReplayReport {
        if self.state.torn_down {
            return ReplayReport::default();
        }
        let s = &mut self.state;
        let report = s
            .style
            .replay(&mut s.surfaces.engine, &mut s.highlight, s.flow.custom_layer());
        info!("style ready, {} overlay steps replayed", report.steps.len());
        report
    }

    /// Custom-layer render callback with the engine's 16-element matrix.
    /// Returns whether anything was drawn.
    pub fn render_flow_layer(&mut self, matrix: &[f32]) -> bool {
        if self.state.torn_down {
            return false;
        }
        let Some(matrix) = mat4_from_slice(matrix) else {
            warn!("custom layer matrix has {} elements, expected 16", matrix.len());
            return false;
        };
        let s = &mut self.state;
        match s
            .flow
            .render_custom(&mut s.surfaces.engine, &mut s.surfaces.gpu, &matrix)
        {
            Ok(drawn) => drawn,
            Err(err) => {
                warn!("point cloud render failed: {err}");
                false
            }
        }
    }

    /// Stops the loop and releases every timer, layer, source and buffer.
    pub fn teardown(&mut self) {
        if self.state.torn_down {
            return;
        }
        self.scheduler.stop();
        let s = &mut self.state;
        s.torn_down = true;
        s.generation += 1;
        s.timers.clear();
        s.events.clear();
        s.outbox.clear();
        s.mode.cancel_projection();
        s.orbit.halt(&mut s.timers);
        s.flow.clear(&mut s.surfaces.targets());
        s.highlight.clear_highlight(&mut s.surfaces.engine);
        s.style.teardown(&mut s.surfaces.engine);
        info!("visualization torn down");
    }
}

fn input_job<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu>(s: &mut VizState<E, C, G>, frame: Frame) {
    for key in s.timers.fire_due(frame.time) {
        s.on_timer(key);
    }
    for event in s.events.drain() {
        s.handle(event);
    }
}

fn orbit_job<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu>(s: &mut VizState<E, C, G>, _frame: Frame) {
    s.orbit.tick(&mut s.surfaces.engine);
}

fn flow_job<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu>(s: &mut VizState<E, C, G>, _frame: Frame) {
    s.flow.repaint(&s.surfaces.engine, &mut s.surfaces.canvas);
}

impl<E: MapEngine, C: ArrowCanvas, G: PointCloudGpu> VizState<E, C, G> {
    fn anchor(&self) -> LngLat {
        self.mode
            .selection()
            .map(|sel| sel.center)
            .unwrap_or_else(|| self.config.anchor_or_home())
    }

    fn handle(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::LocationSelected { name, center } => self.select(name, center),
            ViewerEvent::RunSimulation(query) => {
                let ticket = FluxTicket {
                    generation: self.generation,
                    query,
                };
                debug!("simulation requested for {}", ticket.query.city);
                self.outbox.push(BackendRequest::Flux(ticket));
            }
            ViewerEvent::Reset => self.reset(),
            ViewerEvent::ToggleProjection => {
                let request = self.mode.request_toggle();
                self.on_projection_request(request);
            }
            ViewerEvent::SetProjection(target) => {
                let request = self.mode.request_projection(target);
                self.on_projection_request(request);
            }
            ViewerEvent::UserInteraction { pose } => {
                if let Some(pose) = pose {
                    self.orbit.observe(pose);
                    if let Some(flight) = &mut self.pending_flight {
                        flight.user_pose = Some(pose);
                    }
                }
                self.orbit.pause(self.now, &mut self.timers);
            }
        }
    }

    fn on_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::OrbitResume => self.orbit.resume(&mut self.timers),
            TimerKey::FlyArrival => {
                if let Some(flight) = self.pending_flight.take() {
                    match flight.user_pose {
                        Some(pose) => {
                            debug!("flight taken over by the user at {:?}", pose.center.as_array());
                            self.orbit.anchor(pose, flight.mode);
                            self.orbit.pause(self.now, &mut self.timers);
                        }
                        None => {
                            debug!("camera arrived at {:?}", flight.plan.pose.center.as_array());
                            self.orbit.anchor(flight.plan.pose, flight.mode);
                        }
                    }
                }
            }
            TimerKey::ProjectionSettled => self.settle_projection(),
        }
    }

    fn fly(&mut self, plan: FlyPlan, mode: CameraMode) {
        self.orbit.halt(&mut self.timers);
        self.surfaces.engine.fly_to(&plan.pose, plan.duration_ms);
        self.pending_flight = Some(PendingFlight {
            plan,
            mode,
            user_pose: None,
        });
        self.timers
            .schedule(TimerKey::FlyArrival, self.now.after(plan.duration_ms as f64 / 1000.0));
    }

    /// Focuses a new site. The previous site's highlight and flow renderer
    /// go away; the next simulation builds a renderer around the new anchor.
    fn select(&mut self, name: String, center: LngLat) {
        self.generation += 1;
        self.highlight.clear_highlight(&mut self.surfaces.engine);
        self.flow.clear(&mut self.surfaces.targets());
        self.last_report = None;
        let plan = self.mode.select(Selection {
            name: name.clone(),
            center,
        });
        let projection = self.mode.engine_projection(self.mode.target_projection());
        self.surfaces.engine.set_projection(projection);
        self.fly(plan, CameraMode::Focus);
        self.outbox.push(BackendRequest::Boundary(BoundaryTicket {
            generation: self.generation,
            city: name,
        }));
    }

    fn reset(&mut self) {
        self.generation += 1;
        let Some(plan) = self.mode.reset() else {
            return;
        };
        self.highlight.clear_highlight(&mut self.surfaces.engine);
        self.flow.clear(&mut self.surfaces.targets());
        self.last_report = None;
        let projection = self.mode.engine_projection(self.mode.target_projection());
        self.surfaces.engine.set_projection(projection);
        self.fly(plan, CameraMode::Globe);
    }

    fn on_projection_request(&mut self, request: ProjectionRequest) {
        match request {
            ProjectionRequest::Started(target) => self.start_projection(target),
            ProjectionRequest::Queued(target) => debug!("projection {target:?} waits for the current change"),
            ProjectionRequest::Unchanged => {}
        }
    }

    /// Commits the engine side of a projection change. The renderer swap
    /// happens when the change settles.
    fn start_projection(&mut self, target: Projection) {
        info!("projection change to {target:?} started");
        self.flow.set_suppressed(true);
        self.surfaces.engine.set_projection(self.mode.engine_projection(target));

        if self.mode.location_selected() {
            let pitch = self.mode.focus_pitch(target);
            self.orbit.set_pitch(pitch);
            match &mut self.pending_flight {
                Some(flight) => {
                    flight.plan.pose.pitch = pitch;
                    if let Some(pose) = &mut flight.user_pose {
                        pose.pitch = pitch;
                    }
                }
                None => self.surfaces.engine.jump_to(&self.orbit.state().pose()),
            }
        }

        let settle_s = self.config.projection.settle_ms as f64 / 1000.0;
        self.timers
            .schedule(TimerKey::ProjectionSettled, self.now.after(settle_s));
    }

    fn settle_projection(&mut self) {
        let Some(done) = self.mode.in_flight() else {
            return;
        };
        let next = self.mode.complete_projection();
        let anchor = self.anchor();
        self.flow.switch(done, anchor, &mut self.surfaces.targets());
        self.flow.set_suppressed(false);
        info!("projection change to {done:?} settled");
        if let Some(next) = next {
            self.start_projection(next);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.torn_down && generation == self.generation
    }

    fn deliver(&mut self, reply: BackendReply) -> ReplyOutcome {
        match reply {
            BackendReply::Boundary(ticket, result) => {
                if !self.is_current(ticket.generation) {
                    debug!("dropping stale boundary for {}", ticket.city);
                    return ReplyOutcome::Stale;
                }
                match result {
                    Ok(response) => self.apply_boundary(&ticket.city, response),
                    Err(err) => {
                        warn!("boundary fetch failed for {}: {err}", ticket.city);
                        ReplyOutcome::Failed
                    }
                }
            }
            BackendReply::Flux(ticket, result) => {
                if !self.is_current(ticket.generation) {
                    debug!("dropping stale simulation for {}", ticket.query.city);
                    return ReplyOutcome::Stale;
                }
                match result.and_then(|report| report.flow_series().map(|series| (report, series))) {
                    Ok((report, series)) => {
                        let projection = self.mode.target_projection();
                        let anchor = self.anchor();
                        self.flow.load(series, projection, anchor, &mut self.surfaces.targets());
                        self.last_report = Some(report);
                        ReplyOutcome::Applied
                    }
                    Err(err) => {
                        warn!("simulation fetch failed for {}: {err}", ticket.query.city);
                        ReplyOutcome::Failed
                    }
                }
            }
        }
    }

    fn apply_boundary(&mut self, city: &str, response: BoundaryResponse) -> ReplyOutcome {
        if response.approx_boundary {
            info!("boundary for {city} is approximate");
        }
        let feature = match HighlightFeature::from_geojson(response.geojson) {
            Ok(feature) => feature,
            Err(err) => {
                warn!("boundary for {city} not usable: {err}");
                return ReplyOutcome::Failed;
            }
        };
        match self.highlight.set_highlight(&mut self.surfaces.engine, feature) {
            Ok(()) => ReplyOutcome::Applied,
            Err(EngineError::NotReady) => {
                debug!("highlight for {city} waits for the style");
                ReplyOutcome::Deferred
            }
            Err(err) => {
                warn!("highlight for {city} not attached: {err}");
                ReplyOutcome::Failed
            }
        }
    }
}
