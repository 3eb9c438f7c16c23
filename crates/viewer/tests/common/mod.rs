#![allow(dead_code)]

use std::cell::Cell;

use flow::{Arrow, ArrowCanvas, BufferHandle, PointCloudGpu, PointDraw};
use foundation::LngLat;
use foundation::time::Time;
use layers::EngineError;
use layers::memory::MemoryEngine;
use serde_json::json;
use viewer::{
    BackendClient, BackendReply, BoundaryResponse, FetchError, FluxQuery, FluxReport, ReplyOutcome, Visualization,
    VizConfig, WindSample,
};

#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub arrows: Vec<Arrow>,
    pub clears: usize,
}

impl ArrowCanvas for RecordingCanvas {
    fn clear(&mut self) {
        self.arrows.clear();
        self.clears += 1;
    }

    fn draw_arrow(&mut self, arrow: &Arrow) {
        self.arrows.push(*arrow);
    }
}

#[derive(Debug, Default)]
pub struct RecordingGpu {
    next: u32,
    pub live: Vec<BufferHandle>,
    pub uploads: usize,
    pub draws: usize,
}

impl PointCloudGpu for RecordingGpu {
    fn upload(&mut self, _vertices: &[u8], _count: usize) -> Result<BufferHandle, EngineError> {
        self.next += 1;
        self.uploads += 1;
        let handle = BufferHandle(self.next);
        self.live.push(handle);
        Ok(handle)
    }

    fn draw(&mut self, _buffer: BufferHandle, _draw: &PointDraw) {
        self.draws += 1;
    }

    fn release(&mut self, buffer: BufferHandle) {
        self.live.retain(|b| *b != buffer);
    }
}

/// Backend stub that answers from fixed data and counts calls.
#[derive(Debug)]
pub struct StubBackend {
    pub boundary_calls: Cell<usize>,
    pub flux_calls: Cell<usize>,
    pub wind: Vec<WindSample>,
    pub boundary: serde_json::Value,
    pub fail_boundary: bool,
    pub fail_flux: bool,
}

impl StubBackend {
    pub fn with_wind(samples: &[(f64, f64)]) -> Self {
        Self {
            boundary_calls: Cell::new(0),
            flux_calls: Cell::new(0),
            wind: samples
                .iter()
                .map(|&(direction_deg, speed_ms)| WindSample {
                    speed_ms,
                    direction_deg,
                    date: None,
                })
                .collect(),
            boundary: paris_polygon(),
            fail_boundary: false,
            fail_flux: false,
        }
    }
}

pub fn paris_polygon() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "Paris"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[2.22, 48.81], [2.47, 48.81], [2.47, 48.90], [2.22, 48.90], [2.22, 48.81]]]
            }
        }]
    })
}

impl BackendClient for StubBackend {
    async fn boundary(&self, _city: &str) -> Result<BoundaryResponse, FetchError> {
        self.boundary_calls.set(self.boundary_calls.get() + 1);
        if self.fail_boundary {
            return Err(FetchError::Status(502));
        }
        Ok(BoundaryResponse {
            geojson: self.boundary.clone(),
            approx_boundary: false,
        })
    }

    async fn flux(&self, query: &FluxQuery) -> Result<FluxReport, FetchError> {
        self.flux_calls.set(self.flux_calls.get() + 1);
        if self.fail_flux {
            return Err(FetchError::Status(500));
        }
        Ok(FluxReport {
            city: query.city.clone(),
            net_flux_l: 1200.0,
            demand_l: 4000.0,
            wind_series: self.wind.clone(),
            ..FluxReport::default()
        })
    }
}

pub type TestViz = Visualization<MemoryEngine, RecordingCanvas, RecordingGpu>;

pub fn visualization(config: VizConfig) -> TestViz {
    let engine = MemoryEngine::loaded(&config.engine);
    let mut viz = Visualization::new(engine, RecordingCanvas::default(), RecordingGpu::default(), config);
    viz.on_style_ready();
    viz
}

/// Performs every pending backend request and delivers the replies.
pub fn pump(viz: &mut TestViz, backend: &StubBackend) -> Vec<BackendReply> {
    let mut replies = Vec::new();
    for request in viz.take_requests() {
        let reply = pollster::block_on(request.send(backend));
        viz.deliver(reply.clone());
        replies.push(reply);
    }
    replies
}

/// Performs the oldest pending request and returns how its reply was handled.
pub fn deliver_next(viz: &mut TestViz, backend: &StubBackend) -> ReplyOutcome {
    let request = viz.take_requests().remove(0);
    let reply = pollster::block_on(request.send(backend));
    viz.deliver(reply)
}

pub fn paris() -> LngLat {
    LngLat::new(2.3522, 48.8566)
}

pub fn berlin() -> LngLat {
    LngLat::new(13.405, 52.52)
}

pub fn query(city: &str) -> FluxQuery {
    FluxQuery {
        city: city.to_string(),
        start_date: "2024-12-15".to_string(),
        end_date: "2024-12-20".to_string(),
        interval: Default::default(),
    }
}

/// Runs frames at 60 Hz over `[from, to)` and returns the time after the last one.
pub fn run_frames(viz: &mut TestViz, from: f64, to: f64, mut each: impl FnMut(&TestViz)) -> f64 {
    let mut t = from;
    while t < to {
        viz.frame(Time(t));
        each(viz);
        t += 1.0 / 60.0;
    }
    t
}
