//! In-memory mapping engine.
//!
//! Mirrors the observable behaviour the core depends on: a style that loads
//! asynchronously, a layer stack that a basemap swap wipes, idempotent removal,
//! and a linear screen projection over the current bounds. Used for headless
//! runs and throughout the test suites.

use std::collections::BTreeMap;

use foundation::math::ScreenPoint;
use foundation::{LayerId, LngLat, LngLatBounds, SourceId};

use crate::engine::{CameraPose, EngineConfig, EngineError, LayerSpec, MapEngine, MapProjection, SourceSpec};

/// Label layer every loaded basemap starts with.
pub const BASEMAP_LABEL_LAYER: &str = "road-label";
/// Vector source every loaded basemap starts with.
pub const BASEMAP_COMPOSITE_SOURCE: &str = "composite";

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryLayer {
    Basemap { id: LayerId, symbol: bool },
    Style(LayerSpec),
    Custom(LayerId),
}

impl MemoryLayer {
    pub fn id(&self) -> &LayerId {
        match self {
            MemoryLayer::Basemap { id, .. } => id,
            MemoryLayer::Style(spec) => &spec.id,
            MemoryLayer::Custom(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    FlyTo { pose: CameraPose, duration_ms: u32 },
    JumpTo(CameraPose),
}

#[derive(Debug)]
pub struct MemoryEngine {
    style: String,
    style_loaded: bool,
    style_loads: u32,
    sources: BTreeMap<SourceId, SourceSpec>,
    layers: Vec<MemoryLayer>,
    terrain: Option<(SourceId, f64)>,
    camera: CameraPose,
    projection: MapProjection,
    bounds: LngLatBounds,
    viewport_px: [f64; 2],
    ground_elevation_m: f64,
    commands: Vec<CameraCommand>,
    repaint_requests: u64,
    label_layer: LayerId,
}

impl MemoryEngine {
    /// Creates an engine whose style is still loading.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            style: config.style.clone(),
            style_loaded: false,
            style_loads: 0,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            terrain: None,
            camera: config.initial,
            projection: config.projection,
            bounds: LngLatBounds::new(-180.0, -85.0, 180.0, 85.0),
            viewport_px: [1280.0, 720.0],
            ground_elevation_m: 0.0,
            commands: Vec::new(),
            repaint_requests: 0,
            label_layer: LayerId::new(BASEMAP_LABEL_LAYER),
        }
    }

    /// Creates an engine whose initial style has already loaded.
    pub fn loaded(config: &EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.finish_style_load();
        engine
    }

    /// Completes the pending style load, populating the basemap's own layers.
    pub fn finish_style_load(&mut self) {
        self.sources.insert(
            SourceId::new(BASEMAP_COMPOSITE_SOURCE),
            SourceSpec::Geojson {
                data: serde_json::json!({"type": "FeatureCollection", "features": []}),
            },
        );
        self.layers.push(MemoryLayer::Basemap {
            id: LayerId::new("background"),
            symbol: false,
        });
        self.layers.push(MemoryLayer::Basemap {
            id: self.label_layer.clone(),
            symbol: true,
        });
        self.style_loaded = true;
        self.style_loads += 1;
    }

    /// Label layer id used by the next style load.
    pub fn set_label_layer(&mut self, id: impl Into<LayerId>) {
        self.label_layer = id.into();
    }

    pub fn set_bounds(&mut self, bounds: LngLatBounds) {
        self.bounds = bounds;
    }

    pub fn set_viewport(&mut self, width_px: f64, height_px: f64) {
        self.viewport_px = [width_px.max(1.0), height_px.max(1.0)];
    }

    pub fn set_ground_elevation(&mut self, meters: f64) {
        self.ground_elevation_m = meters;
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn style_loads(&self) -> u32 {
        self.style_loads
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id().clone()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&MemoryLayer> {
        self.layers.iter().find(|l| l.id().as_str() == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(&SourceId::new(id))
    }

    pub fn custom_layer_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l, MemoryLayer::Custom(_)))
            .count()
    }

    pub fn terrain(&self) -> Option<&(SourceId, f64)> {
        self.terrain.as_ref()
    }

    pub fn camera(&self) -> CameraPose {
        self.camera
    }

    pub fn projection(&self) -> MapProjection {
        self.projection
    }

    pub fn commands(&self) -> &[CameraCommand] {
        &self.commands
    }

    pub fn repaint_requests(&self) -> u64 {
        self.repaint_requests
    }

    fn insert_layer(&mut self, layer: MemoryLayer, before: Option<&LayerId>) {
        let at = before
            .and_then(|b| self.layers.iter().position(|l| l.id() == b))
            .unwrap_or(self.layers.len());
        self.layers.insert(at, layer);
    }
}

impl MapEngine for MemoryEngine {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn set_style(&mut self, style: &str) {
        self.style = style.to_string();
        self.style_loaded = false;
        self.sources.clear();
        self.layers.clear();
        self.terrain = None;
    }

    fn add_source(&mut self, id: &SourceId, spec: &SourceSpec) -> Result<(), EngineError> {
        if !self.style_loaded {
            return Err(EngineError::NotReady);
        }
        if self.sources.contains_key(id) {
            return Err(EngineError::DuplicateSource(id.clone()));
        }
        self.sources.insert(id.clone(), spec.clone());
        Ok(())
    }

    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&LayerId>) -> Result<(), EngineError> {
        if !self.style_loaded {
            return Err(EngineError::NotReady);
        }
        if self.has_layer(&spec.id) {
            return Err(EngineError::DuplicateLayer(spec.id.clone()));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(EngineError::MissingSource(spec.source.clone()));
        }
        self.insert_layer(MemoryLayer::Style(spec.clone()), before);
        Ok(())
    }

    fn add_custom_layer(&mut self, id: &LayerId, before: Option<&LayerId>) -> Result<(), EngineError> {
        if !self.style_loaded {
            return Err(EngineError::NotReady);
        }
        if self.has_layer(id) {
            return Err(EngineError::DuplicateLayer(id.clone()));
        }
        self.insert_layer(MemoryLayer::Custom(id.clone()), before);
        Ok(())
    }

    fn remove_layer(&mut self, id: &LayerId) {
        self.layers.retain(|l| l.id() != id);
    }

    fn remove_source(&mut self, id: &SourceId) {
        self.sources.remove(id);
        if self.terrain.as_ref().is_some_and(|(src, _)| src == id) {
            self.terrain = None;
        }
    }

    fn has_layer(&self, id: &LayerId) -> bool {
        self.layers.iter().any(|l| l.id() == id)
    }

    fn has_source(&self, id: &SourceId) -> bool {
        self.sources.contains_key(id)
    }

    fn first_symbol_layer(&self) -> Option<LayerId> {
        self.layers.iter().find_map(|l| match l {
            MemoryLayer::Basemap { id, symbol: true } => Some(id.clone()),
            _ => None,
        })
    }

    fn set_terrain(&mut self, source: Option<&SourceId>, exaggeration: f64) {
        self.terrain = source.map(|s| (s.clone(), exaggeration));
    }

    fn project(&self, p: LngLat) -> ScreenPoint {
        let b = self.bounds;
        let w = b.width().max(1e-12);
        let h = b.height().max(1e-12);
        ScreenPoint::new(
            (p.lon - b.west) / w * self.viewport_px[0],
            (b.north - p.lat) / h * self.viewport_px[1],
        )
    }

    fn bounds(&self) -> LngLatBounds {
        self.bounds
    }

    fn fly_to(&mut self, pose: &CameraPose, duration_ms: u32) {
        self.camera = *pose;
        self.commands.push(CameraCommand::FlyTo {
            pose: *pose,
            duration_ms,
        });
    }

    fn jump_to(&mut self, pose: &CameraPose) {
        self.camera = *pose;
        self.commands.push(CameraCommand::JumpTo(*pose));
    }

    fn set_projection(&mut self, projection: MapProjection) {
        self.projection = projection;
    }

    fn query_terrain_elevation(&self, _p: LngLat) -> Option<f64> {
        self.terrain.as_ref().map(|(_, exaggeration)| self.ground_elevation_m * exaggeration)
    }

    fn trigger_repaint(&mut self) {
        self.repaint_requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_swap_discards_everything() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        engine.add_custom_layer(&LayerId::new("c"), None).unwrap();
        engine.set_terrain(Some(&SourceId::new(BASEMAP_COMPOSITE_SOURCE)), 1.0);

        engine.set_style("mapbox://styles/mapbox/dark-v11");
        assert!(!engine.is_style_loaded());
        assert!(engine.layer_ids().is_empty());
        assert!(engine.terrain().is_none());
        assert_eq!(
            engine.add_custom_layer(&LayerId::new("c"), None),
            Err(EngineError::NotReady)
        );

        engine.finish_style_load();
        assert_eq!(engine.style_loads(), 2);
        assert_eq!(engine.first_symbol_layer(), Some(LayerId::new(BASEMAP_LABEL_LAYER)));
    }

    #[test]
    fn label_layer_id_applies_from_the_next_load() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        engine.set_label_layer("place-label");
        assert_eq!(engine.first_symbol_layer(), Some(LayerId::new(BASEMAP_LABEL_LAYER)));

        engine.set_style("mapbox://styles/mapbox/light-v11");
        engine.finish_style_load();
        assert_eq!(engine.first_symbol_layer(), Some(LayerId::new("place-label")));
        assert!(!engine.has_layer(&LayerId::new(BASEMAP_LABEL_LAYER)));
    }

    #[test]
    fn removing_missing_ids_is_a_noop() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let before = engine.layer_ids();
        engine.remove_layer(&LayerId::new("missing"));
        engine.remove_source(&SourceId::new("missing"));
        assert_eq!(engine.layer_ids(), before);
    }

    #[test]
    fn projects_linearly_over_bounds() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        engine.set_bounds(LngLatBounds::new(0.0, 0.0, 10.0, 10.0));
        engine.set_viewport(100.0, 200.0);
        assert_eq!(engine.project(LngLat::new(0.0, 10.0)), ScreenPoint::new(0.0, 0.0));
        assert_eq!(engine.project(LngLat::new(5.0, 5.0)), ScreenPoint::new(50.0, 100.0));
    }

    #[test]
    fn elevation_requires_terrain() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        engine.set_ground_elevation(900.0);
        assert_eq!(engine.query_terrain_elevation(LngLat::new(0.0, 0.0)), None);
        engine.set_terrain(Some(&SourceId::new(BASEMAP_COMPOSITE_SOURCE)), 1.5);
        assert_eq!(engine.query_terrain_elevation(LngLat::new(0.0, 0.0)), Some(1350.0));
    }
}
