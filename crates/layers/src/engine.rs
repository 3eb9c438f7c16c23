//! The mapping engine as seen by the visualization core.
//!
//! The engine renders tiles, owns projection math and fires lifecycle events.
//! The core only issues the commands below and reads back a few queries; the
//! browser build implements this trait over Mapbox GL JS, tests use
//! [`MemoryEngine`](crate::memory::MemoryEngine).

use foundation::math::ScreenPoint;
use foundation::{LayerId, LngLat, LngLatBounds, SourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The style has not finished loading; mutations would be discarded.
    NotReady,
    DuplicateLayer(LayerId),
    DuplicateSource(SourceId),
    MissingSource(SourceId),
    /// Failure reported by the engine implementation itself.
    Backend(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotReady => write!(f, "map style is not loaded yet"),
            EngineError::DuplicateLayer(id) => write!(f, "layer already exists: {id}"),
            EngineError::DuplicateSource(id) => write!(f, "source already exists: {id}"),
            EngineError::MissingSource(id) => write!(f, "source does not exist: {id}"),
            EngineError::Backend(msg) => write!(f, "map engine error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Camera pose in the engine's terms (degrees, zoom level).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl CameraPose {
    pub fn new(center: LngLat, zoom: f64, pitch: f64, bearing: f64) -> Self {
        Self {
            center,
            zoom,
            pitch,
            bearing,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapProjection {
    #[default]
    Globe,
    Mercator,
}

impl MapProjection {
    pub fn as_str(self) -> &'static str {
        match self {
            MapProjection::Globe => "globe",
            MapProjection::Mercator => "mercator",
        }
    }
}

/// Everything needed to create a map. The access token travels with the
/// config rather than being set on a global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub access_token: String,
    /// DOM id of the map container.
    pub container: String,
    pub style: String,
    pub initial: CameraPose,
    pub projection: MapProjection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            container: "map".to_string(),
            style: "mapbox://styles/mapbox/satellite-streets-v12".to_string(),
            initial: CameraPose::new(LngLat::new(78.9629, 20.5937), 1.6, 0.0, 0.0),
            projection: MapProjection::Globe,
        }
    }
}

/// Data source description, serialized in the engine's style-spec shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceSpec {
    Geojson {
        data: Value,
    },
    RasterDem {
        url: String,
        #[serde(rename = "tileSize")]
        tile_size: u32,
        maxzoom: u8,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    Fill,
    Line,
    FillExtrusion,
}

/// Style layer description, serialized in the engine's style-spec shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: LayerId,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: SourceId,
    #[serde(rename = "source-layer", skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    pub paint: Value,
}

impl LayerSpec {
    pub fn new(id: impl Into<LayerId>, kind: LayerKind, source: impl Into<SourceId>, paint: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            source_layer: None,
            filter: None,
            minzoom: None,
            paint,
        }
    }
}

/// Command/query surface of the mapping engine.
///
/// Removal of ids that do not exist must be a no-op. Style readiness is
/// signalled out of band: the host forwards the engine's "style loaded" event
/// to the visualization, which then replays its attachments.
pub trait MapEngine {
    fn is_style_loaded(&self) -> bool;
    /// Hot-swaps the basemap. All sources and layers added so far are discarded.
    fn set_style(&mut self, style: &str);

    fn add_source(&mut self, id: &SourceId, spec: &SourceSpec) -> Result<(), EngineError>;
    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&LayerId>) -> Result<(), EngineError>;
    /// Registers a custom render pass. The engine calls back into the host
    /// with its projection matrix every repaint while the layer is present.
    fn add_custom_layer(&mut self, id: &LayerId, before: Option<&LayerId>) -> Result<(), EngineError>;
    fn remove_layer(&mut self, id: &LayerId);
    fn remove_source(&mut self, id: &SourceId);
    fn has_layer(&self, id: &LayerId) -> bool;
    fn has_source(&self, id: &SourceId) -> bool;
    /// First label layer in the current style, used as the insertion anchor
    /// for layers that must stay beneath labels.
    fn first_symbol_layer(&self) -> Option<LayerId>;
    fn set_terrain(&mut self, source: Option<&SourceId>, exaggeration: f64);

    fn project(&self, p: LngLat) -> ScreenPoint;
    fn bounds(&self) -> LngLatBounds;
    fn fly_to(&mut self, pose: &CameraPose, duration_ms: u32);
    fn jump_to(&mut self, pose: &CameraPose);
    fn set_projection(&mut self, projection: MapProjection);
    fn query_terrain_elevation(&self, p: LngLat) -> Option<f64>;
    fn trigger_repaint(&mut self);
}
