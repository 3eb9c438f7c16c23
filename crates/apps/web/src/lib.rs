//! Browser host for the globe flow visualization.
//!
//! The page loads Mapbox GL JS, then calls [`start`] with a JSON config. From
//! there the crate owns the `requestAnimationFrame` loop; the page only
//! forwards UI actions through the exported functions below.
#![cfg(target_arch = "wasm32")]

mod canvas;
mod http;
mod logging;
mod mapbox;
mod webgl;

use std::cell::RefCell;
use std::rc::Rc;

use foundation::time::Time;
use foundation::{LngLat, Projection};
use js_sys::Float32Array;
use tracing::{debug, info, warn};
use viewer::{BackendRequest, FluxQuery, Interval, ViewerEvent, Visualization, VizConfig};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use canvas::OverlayCanvas;
use http::HttpBackend;
use mapbox::{MapboxEngine, fg_install, fg_overlay_canvas, fg_uninstall};
use webgl::WebGlPoints;

type WebViz = Visualization<MapboxEngine, OverlayCanvas, WebGlPoints>;

#[derive(Default)]
struct WebState {
    viz: Option<WebViz>,
    backend: Option<Rc<HttpBackend>>,
    // Kept across restarts: a frame may still be pending on the old instance.
    frame_loop: Option<Rc<Closure<dyn FnMut(f64)>>>,
    frame_pending: bool,
    // Engine event handlers; JS holds them only while installed.
    listeners: Vec<Closure<dyn FnMut()>>,
    render_listener: Option<Closure<dyn FnMut(Float32Array)>>,
}

thread_local! {
    static STATE: RefCell<WebState> = RefCell::new(WebState::default());
}

/// TLS access that yields a default during thread teardown instead of panicking.
fn with_state<F, R>(f: F) -> R
where
    F: FnOnce(&RefCell<WebState>) -> R,
    R: Default,
{
    STATE.try_with(f).unwrap_or_default()
}

/// Runs `f` on the live visualization. Re-entrant calls (an engine event
/// fired while the visualization is already borrowed) are skipped.
fn with_viz<F, R>(f: F) -> R
where
    F: FnOnce(&mut WebViz) -> R,
    R: Default,
{
    with_state(|state| match state.try_borrow_mut() {
        Ok(mut s) => s.viz.as_mut().map(f).unwrap_or_default(),
        Err(_) => {
            debug!("visualization busy, engine callback skipped");
            R::default()
        }
    })
}

fn request_frame() {
    let Some(frame_loop) = with_state(|state| state.borrow().frame_loop.clone()) else {
        return;
    };
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback: &js_sys::Function = (*frame_loop).as_ref().unchecked_ref();
    match window.request_animation_frame(callback) {
        Ok(_) => with_state(|state| state.borrow_mut().frame_pending = true),
        Err(err) => warn!("requestAnimationFrame failed: {err:?}"),
    }
}

fn on_animation_frame(now_ms: f64) {
    with_state(|state| state.borrow_mut().frame_pending = false);
    let (running, requests) = with_viz(|viz| {
        let running = viz.frame(Time::from_millis(now_ms)).is_some();
        (running, viz.take_requests())
    });
    send_requests(requests);
    if running {
        request_frame();
    } else {
        debug!("frame loop stopped");
    }
}

fn send_requests(requests: Vec<BackendRequest>) {
    if requests.is_empty() {
        return;
    }
    let Some(backend) = with_state(|state| state.borrow().backend.clone()) else {
        return;
    };
    for request in requests {
        let backend = Rc::clone(&backend);
        spawn_local(async move {
            let reply = request.send(&*backend).await;
            let outcome = with_viz(|viz| Some(viz.deliver(reply)));
            debug!("backend reply handled: {outcome:?}");
        });
    }
}

fn push(event: ViewerEvent) {
    with_viz(|viz| viz.push_event(event));
}

/// Creates the map and starts the visualization. `config_json` may be `"{}"`;
/// every field has a default. Calling it again replaces the running instance.
#[wasm_bindgen]
pub fn start(config_json: &str, log_filter: Option<String>) -> Result<(), JsValue> {
    logging::init(log_filter.as_deref().unwrap_or("info"));
    let mut config = VizConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    if config.seed.is_none() {
        config.seed = Some((js_sys::Math::random() * u64::MAX as f64) as u64);
    }
    teardown();

    let engine = MapboxEngine::create(&config.engine)?;
    let canvas = OverlayCanvas::new(fg_overlay_canvas()?)?;
    let backend = Rc::new(HttpBackend::new(&config.backend.base_url));
    let viz = Visualization::new(engine, canvas, WebGlPoints::default(), config);

    let on_style_ready = Closure::<dyn FnMut()>::new(|| {
        with_viz(|viz| {
            viz.engine_mut().mark_style_loaded();
            viz.on_style_ready();
        });
    });
    let on_render = Closure::<dyn FnMut(Float32Array)>::new(|matrix: Float32Array| {
        with_viz(|viz| viz.render_flow_layer(&matrix.to_vec()));
    });
    let on_interaction = Closure::<dyn FnMut()>::new(|| {
        with_viz(|viz| {
            let pose = viz.engine().camera();
            viz.push_event(ViewerEvent::UserInteraction { pose: Some(pose) });
        });
    });
    fg_install(on_style_ready.as_ref(), on_render.as_ref(), on_interaction.as_ref());

    let pending = with_state(|state| {
        let mut s = state.borrow_mut();
        s.viz = Some(viz);
        s.backend = Some(backend);
        s.listeners = vec![on_style_ready, on_interaction];
        s.render_listener = Some(on_render);
        if s.frame_loop.is_none() {
            s.frame_loop = Some(Rc::new(Closure::<dyn FnMut(f64)>::new(on_animation_frame)));
        }
        s.frame_pending
    });
    if !pending {
        request_frame();
    }
    info!("visualization started");
    Ok(())
}

#[wasm_bindgen]
pub fn select_location(name: String, lng: f64, lat: f64) {
    push(ViewerEvent::LocationSelected {
        name,
        center: LngLat::new(lng, lat),
    });
}

#[wasm_bindgen]
pub fn run_simulation(city: String, start_date: String, end_date: String, interval: &str) {
    push(ViewerEvent::RunSimulation(FluxQuery {
        city,
        start_date,
        end_date,
        interval: Interval::from_str(interval),
    }));
}

#[wasm_bindgen]
pub fn reset_view() {
    push(ViewerEvent::Reset);
}

#[wasm_bindgen]
pub fn toggle_projection() {
    push(ViewerEvent::ToggleProjection);
}

/// Accepts `"2d"` or `"3d"`.
#[wasm_bindgen]
pub fn set_projection(mode: &str) {
    push(ViewerEvent::SetProjection(Projection::from_str(mode)));
}

#[wasm_bindgen]
pub fn set_basemap(style_url: &str) {
    with_viz(|viz| viz.set_basemap(style_url));
}

/// Latest simulation report as JSON, for the page's summary panel.
#[wasm_bindgen]
pub fn last_report() -> Option<String> {
    with_viz(|viz| {
        let report = viz.last_report()?;
        serde_json::to_string(report)
            .map_err(|err| warn!("report not serializable: {err}"))
            .ok()
    })
}

/// Stops the loop and releases everything the visualization added to the map.
#[wasm_bindgen]
pub fn teardown() {
    fg_uninstall();
    with_viz(|viz| viz.teardown());
    with_state(|state| {
        if let Ok(mut s) = state.try_borrow_mut() {
            s.listeners.clear();
            s.render_listener = None;
            s.viz = None;
        }
    });
}
