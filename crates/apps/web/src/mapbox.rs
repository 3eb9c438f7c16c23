//! Mapbox GL JS behind [`MapEngine`].
//!
//! The JS side keeps one map per page in module scope. Rust talks to it only
//! through the functions below; engine events come back through the callbacks
//! passed to `fg_install`.

use foundation::math::ScreenPoint;
use foundation::{LayerId, LngLat, LngLatBounds, SourceId};
use js_sys::Float64Array;
use layers::{CameraPose, EngineConfig, EngineError, LayerSpec, MapEngine, MapProjection, SourceSpec};
use wasm_bindgen::prelude::*;

#[wasm_bindgen(inline_js = "
let __fg_map = null;
let __fg_gl = null;
let __fg_callbacks = null;

function __fg_camera_array() {
    const c = __fg_map.getCenter();
    return new Float64Array([c.lng, c.lat, __fg_map.getZoom(), __fg_map.getPitch(), __fg_map.getBearing()]);
}

export function fg_create_map(token, container, style, lng, lat, zoom, pitch, bearing, projection) {
    __fg_map = new mapboxgl.Map({
        accessToken: token,
        container,
        style,
        center: [lng, lat],
        zoom,
        pitch,
        bearing,
        projection,
        antialias: true,
    });
}

export function fg_install(onStyleReady, onRender, onInteraction) {
    __fg_callbacks = { onStyleReady, onRender, onInteraction };
    __fg_map.on('style.load', () => __fg_callbacks && __fg_callbacks.onStyleReady());
    for (const name of ['mousedown', 'touchstart', 'wheel', 'dragstart']) {
        __fg_map.on(name, () => __fg_callbacks && __fg_callbacks.onInteraction());
    }
    __fg_map.on('moveend', (e) => {
        if (e.originalEvent && __fg_callbacks) __fg_callbacks.onInteraction();
    });
}

export function fg_uninstall() {
    __fg_callbacks = null;
}

export function fg_overlay_canvas() {
    const container = __fg_map.getCanvasContainer();
    const canvas = document.createElement('canvas');
    canvas.style.position = 'absolute';
    canvas.style.left = '0';
    canvas.style.top = '0';
    canvas.style.pointerEvents = 'none';
    const fit = () => {
        const base = __fg_map.getCanvas();
        canvas.width = base.clientWidth;
        canvas.height = base.clientHeight;
        canvas.style.width = base.clientWidth + 'px';
        canvas.style.height = base.clientHeight + 'px';
    };
    fit();
    __fg_map.on('resize', fit);
    container.appendChild(canvas);
    return canvas;
}

export function fg_gl() {
    return __fg_gl;
}

export function fg_set_style(url) {
    __fg_map.setStyle(url);
}

export function fg_add_source(id, json) {
    __fg_map.addSource(id, JSON.parse(json));
}

export function fg_add_layer(json, before) {
    __fg_map.addLayer(JSON.parse(json), before || undefined);
}

export function fg_add_custom_layer(id, before) {
    __fg_map.addLayer({
        id,
        type: 'custom',
        renderingMode: '3d',
        onAdd(_map, gl) { __fg_gl = gl; },
        render(gl, matrix) {
            __fg_gl = gl;
            if (__fg_callbacks) __fg_callbacks.onRender(new Float32Array(matrix));
        },
    }, before || undefined);
}

export function fg_remove_layer(id) {
    if (__fg_map.getLayer(id)) __fg_map.removeLayer(id);
}

export function fg_remove_source(id) {
    if (__fg_map.getSource(id)) __fg_map.removeSource(id);
}

export function fg_has_layer(id) {
    return !!__fg_map.getLayer(id);
}

export function fg_has_source(id) {
    return !!__fg_map.getSource(id);
}

export function fg_first_symbol_layer() {
    const style = __fg_map.getStyle();
    const layer = style && style.layers ? style.layers.find((l) => l.type === 'symbol') : null;
    return layer ? layer.id : undefined;
}

export function fg_set_terrain(source, exaggeration) {
    __fg_map.setTerrain(source ? { source, exaggeration } : null);
}

export function fg_project(lng, lat) {
    const p = __fg_map.project([lng, lat]);
    return new Float64Array([p.x, p.y]);
}

export function fg_bounds() {
    const b = __fg_map.getBounds();
    return new Float64Array([b.getWest(), b.getSouth(), b.getEast(), b.getNorth()]);
}

export function fg_camera() {
    return __fg_camera_array();
}

export function fg_fly_to(lng, lat, zoom, pitch, bearing, duration) {
    __fg_map.flyTo({ center: [lng, lat], zoom, pitch, bearing, duration, essential: true });
}

export function fg_jump_to(lng, lat, zoom, pitch, bearing) {
    __fg_map.jumpTo({ center: [lng, lat], zoom, pitch, bearing });
}

export function fg_set_projection(name) {
    __fg_map.setProjection(name);
}

export function fg_terrain_elevation(lng, lat) {
    const h = __fg_map.queryTerrainElevation([lng, lat]);
    return h == null ? undefined : h;
}

export function fg_trigger_repaint() {
    __fg_map.triggerRepaint();
}
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn fg_create_map(
        token: &str,
        container: &str,
        style: &str,
        lng: f64,
        lat: f64,
        zoom: f64,
        pitch: f64,
        bearing: f64,
        projection: &str,
    ) -> Result<(), JsValue>;
    pub(crate) fn fg_install(
        on_style_ready: &JsValue,
        on_render: &JsValue,
        on_interaction: &JsValue,
    );
    pub(crate) fn fg_uninstall();
    #[wasm_bindgen(catch)]
    pub(crate) fn fg_overlay_canvas() -> Result<web_sys::HtmlCanvasElement, JsValue>;
    pub(crate) fn fg_gl() -> JsValue;
    fn fg_set_style(url: &str);
    #[wasm_bindgen(catch)]
    fn fg_add_source(id: &str, json: &str) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn fg_add_layer(json: &str, before: Option<String>) -> Result<(), JsValue>;
    #[wasm_bindgen(catch)]
    fn fg_add_custom_layer(id: &str, before: Option<String>) -> Result<(), JsValue>;
    fn fg_remove_layer(id: &str);
    fn fg_remove_source(id: &str);
    fn fg_has_layer(id: &str) -> bool;
    fn fg_has_source(id: &str) -> bool;
    fn fg_first_symbol_layer() -> Option<String>;
    fn fg_set_terrain(source: Option<String>, exaggeration: f64);
    fn fg_project(lng: f64, lat: f64) -> Float64Array;
    fn fg_bounds() -> Float64Array;
    fn fg_camera() -> Float64Array;
    fn fg_fly_to(lng: f64, lat: f64, zoom: f64, pitch: f64, bearing: f64, duration: u32);
    fn fg_jump_to(lng: f64, lat: f64, zoom: f64, pitch: f64, bearing: f64);
    fn fg_set_projection(name: &str);
    fn fg_terrain_elevation(lng: f64, lat: f64) -> Option<f64>;
    fn fg_trigger_repaint();
}

fn js_error(err: JsValue) -> EngineError {
    EngineError::Backend(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

/// Handle to the page's Mapbox map.
///
/// Style readiness is tracked here rather than asked of the map: Mapbox's own
/// `isStyleLoaded` flickers while tiles stream in.
#[derive(Debug)]
pub struct MapboxEngine {
    style_ready: bool,
}

impl MapboxEngine {
    pub fn create(config: &EngineConfig) -> Result<Self, JsValue> {
        let pose = config.initial;
        fg_create_map(
            &config.access_token,
            &config.container,
            &config.style,
            pose.center.lon,
            pose.center.lat,
            pose.zoom,
            pose.pitch,
            pose.bearing,
            config.projection.as_str(),
        )?;
        Ok(Self { style_ready: false })
    }

    /// Called from the map's `style.load` event.
    pub fn mark_style_loaded(&mut self) {
        self.style_ready = true;
    }

    pub fn camera(&self) -> CameraPose {
        let c = fg_camera().to_vec();
        match c.as_slice() {
            [lng, lat, zoom, pitch, bearing] => CameraPose::new(LngLat::new(*lng, *lat), *zoom, *pitch, *bearing),
            _ => CameraPose::new(LngLat::new(0.0, 0.0), 0.0, 0.0, 0.0),
        }
    }
}

impl MapEngine for MapboxEngine {
    fn is_style_loaded(&self) -> bool {
        self.style_ready
    }

    fn set_style(&mut self, style: &str) {
        self.style_ready = false;
        fg_set_style(style);
    }

    fn add_source(&mut self, id: &SourceId, spec: &SourceSpec) -> Result<(), EngineError> {
        if !self.style_ready {
            return Err(EngineError::NotReady);
        }
        if fg_has_source(id.as_str()) {
            return Err(EngineError::DuplicateSource(id.clone()));
        }
        let json = serde_json::to_string(spec).map_err(|e| EngineError::Backend(e.to_string()))?;
        fg_add_source(id.as_str(), &json).map_err(js_error)
    }

    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&LayerId>) -> Result<(), EngineError> {
        if !self.style_ready {
            return Err(EngineError::NotReady);
        }
        if fg_has_layer(spec.id.as_str()) {
            return Err(EngineError::DuplicateLayer(spec.id.clone()));
        }
        if !fg_has_source(spec.source.as_str()) {
            return Err(EngineError::MissingSource(spec.source.clone()));
        }
        let json = serde_json::to_string(spec).map_err(|e| EngineError::Backend(e.to_string()))?;
        fg_add_layer(&json, before.map(|b| b.as_str().to_string())).map_err(js_error)
    }

    fn add_custom_layer(&mut self, id: &LayerId, before: Option<&LayerId>) -> Result<(), EngineError> {
        if !self.style_ready {
            return Err(EngineError::NotReady);
        }
        if fg_has_layer(id.as_str()) {
            return Err(EngineError::DuplicateLayer(id.clone()));
        }
        fg_add_custom_layer(id.as_str(), before.map(|b| b.as_str().to_string())).map_err(js_error)
    }

    fn remove_layer(&mut self, id: &LayerId) {
        fg_remove_layer(id.as_str());
    }

    fn remove_source(&mut self, id: &SourceId) {
        fg_remove_source(id.as_str());
    }

    fn has_layer(&self, id: &LayerId) -> bool {
        self.style_ready && fg_has_layer(id.as_str())
    }

    fn has_source(&self, id: &SourceId) -> bool {
        self.style_ready && fg_has_source(id.as_str())
    }

    fn first_symbol_layer(&self) -> Option<LayerId> {
        if !self.style_ready {
            return None;
        }
        fg_first_symbol_layer().map(LayerId::new)
    }

    fn set_terrain(&mut self, source: Option<&SourceId>, exaggeration: f64) {
        fg_set_terrain(source.map(|s| s.as_str().to_string()), exaggeration);
    }

    fn project(&self, p: LngLat) -> ScreenPoint {
        let xy = fg_project(p.lon, p.lat).to_vec();
        match xy.as_slice() {
            [x, y] => ScreenPoint::new(*x, *y),
            _ => ScreenPoint::new(f64::NAN, f64::NAN),
        }
    }

    fn bounds(&self) -> LngLatBounds {
        let b = fg_bounds().to_vec();
        match b.as_slice() {
            [w, s, e, n] => LngLatBounds::new(*w, *s, *e, *n),
            _ => LngLatBounds::new(-180.0, -85.0, 180.0, 85.0),
        }
    }

    fn fly_to(&mut self, pose: &CameraPose, duration_ms: u32) {
        fg_fly_to(pose.center.lon, pose.center.lat, pose.zoom, pose.pitch, pose.bearing, duration_ms);
    }

    fn jump_to(&mut self, pose: &CameraPose) {
        fg_jump_to(pose.center.lon, pose.center.lat, pose.zoom, pose.pitch, pose.bearing);
    }

    fn set_projection(&mut self, projection: MapProjection) {
        fg_set_projection(projection.as_str());
    }

    fn query_terrain_elevation(&self, p: LngLat) -> Option<f64> {
        fg_terrain_elevation(p.lon, p.lat)
    }

    fn trigger_repaint(&mut self) {
        fg_trigger_repaint();
    }
}
