use foundation::{LayerId, SourceId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::{EngineError, LayerKind, LayerSpec, MapEngine, SourceSpec};
use crate::registration::{Attach, attach_layer, attach_source};

pub const TERRAIN_SOURCE: &str = "mapbox-dem";
pub const BUILDINGS_LAYER: &str = "3d-buildings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub dem_url: String,
    pub exaggeration: f64,
    /// Vector source and source-layer that carry building footprints.
    pub buildings_source: String,
    pub buildings_source_layer: String,
    pub buildings_min_zoom: f64,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            dem_url: "mapbox://mapbox.mapbox-terrain-dem-v1".to_string(),
            exaggeration: 1.3,
            buildings_source: "composite".to_string(),
            buildings_source_layer: "building".to_string(),
            buildings_min_zoom: 15.0,
        }
    }
}

/// Raster-DEM terrain plus extruded buildings.
#[derive(Debug, Clone)]
pub struct TerrainOverlay {
    settings: TerrainSettings,
    source: SourceId,
    buildings: LayerSpec,
}

impl TerrainOverlay {
    pub fn new(settings: TerrainSettings) -> Self {
        let mut buildings = LayerSpec::new(
            BUILDINGS_LAYER,
            LayerKind::FillExtrusion,
            settings.buildings_source.as_str(),
            json!({
                "fill-extrusion-color": "#aaa",
                "fill-extrusion-height": ["get", "height"],
                "fill-extrusion-base": ["get", "min_height"],
                "fill-extrusion-opacity": 0.6,
            }),
        );
        buildings.source_layer = Some(settings.buildings_source_layer.clone());
        buildings.filter = Some(json!(["==", "extrude", "true"]));
        buildings.minzoom = Some(settings.buildings_min_zoom);

        Self {
            settings,
            source: SourceId::new(TERRAIN_SOURCE),
            buildings,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source
    }

    pub fn buildings_id(&self) -> &LayerId {
        &self.buildings.id
    }

    /// Adds the DEM source and enables terrain on it.
    pub fn attach_terrain(&self, engine: &mut dyn MapEngine) -> Result<Attach, EngineError> {
        let spec = SourceSpec::RasterDem {
            url: self.settings.dem_url.clone(),
            tile_size: 512,
            maxzoom: 14,
        };
        let attach = attach_source(engine, &self.source, &spec)?;
        engine.set_terrain(Some(&self.source), self.settings.exaggeration);
        Ok(attach)
    }

    /// Adds the building extrusion beneath the first label layer.
    pub fn attach_buildings(&self, engine: &mut dyn MapEngine) -> Result<Attach, EngineError> {
        let labels = engine.first_symbol_layer();
        attach_layer(engine, &self.buildings, labels.as_ref())
    }

    pub fn detach(&self, engine: &mut dyn MapEngine) {
        if engine.has_layer(&self.buildings.id) {
            engine.remove_layer(&self.buildings.id);
        }
        if engine.has_source(&self.source) {
            engine.set_terrain(None, 0.0);
            engine.remove_source(&self.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::memory::{BASEMAP_LABEL_LAYER, MemoryEngine};

    #[test]
    fn attaches_terrain_and_buildings_idempotently() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let overlay = TerrainOverlay::new(TerrainSettings::default());

        assert_eq!(overlay.attach_terrain(&mut engine), Ok(Attach::Added));
        assert_eq!(overlay.attach_terrain(&mut engine), Ok(Attach::AlreadyPresent));
        assert_eq!(engine.terrain().map(|(s, _)| s.as_str()), Some(TERRAIN_SOURCE));

        assert_eq!(overlay.attach_buildings(&mut engine), Ok(Attach::Added));
        assert_eq!(overlay.attach_buildings(&mut engine), Ok(Attach::AlreadyPresent));
        let ids = engine.layer_ids();
        let b = ids.iter().position(|id| id.as_str() == BUILDINGS_LAYER).unwrap();
        let l = ids.iter().position(|id| id.as_str() == BASEMAP_LABEL_LAYER).unwrap();
        assert!(b < l);
    }

    #[test]
    fn detach_removes_both() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let overlay = TerrainOverlay::new(TerrainSettings::default());
        overlay.attach_terrain(&mut engine).unwrap();
        overlay.attach_buildings(&mut engine).unwrap();
        overlay.detach(&mut engine);
        assert!(!engine.has_layer(overlay.buildings_id()));
        assert!(!engine.has_source(overlay.source_id()));
        assert!(engine.terrain().is_none());
    }
}
