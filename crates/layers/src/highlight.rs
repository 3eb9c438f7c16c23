//! Boundary overlay for the selected location.
//!
//! The stored [`HighlightFeature`] is the source of truth: engine layers are a
//! projection of it that a basemap swap may wipe at any time, and
//! [`HighlightOverlayManager::restore`] rebuilds them from the cached geometry.

use foundation::{LayerId, SourceId};
use serde_json::{Value, json};
use tracing::debug;

use crate::engine::{EngineError, LayerKind, LayerSpec, MapEngine, SourceSpec};
use crate::registration::{attach_layer, attach_source};
use crate::symbology::HighlightStyle;

pub const HIGHLIGHT_SOURCE: &str = "highlight";
pub const HIGHLIGHT_FILL: &str = "highlight-fill";
pub const HIGHLIGHT_OUTLINE: &str = "highlight-outline";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    NotGeoJson(String),
    NoPolygon,
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::NotGeoJson(kind) => write!(f, "unsupported GeoJSON object: {kind}"),
            FeatureError::NoPolygon => write!(f, "GeoJSON contains no polygon geometry"),
        }
    }
}

impl std::error::Error for FeatureError {}

/// Boundary polygon(s), normalized to a FeatureCollection.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightFeature {
    collection: Value,
    polygons: usize,
}

impl HighlightFeature {
    /// Accepts a FeatureCollection, a Feature or a bare (Multi)Polygon geometry.
    /// Non-polygonal features are dropped; at least one polygon must remain.
    pub fn from_geojson(value: Value) -> Result<Self, FeatureError> {
        let features = match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => value
                .get("features")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Some("Feature") => vec![value],
            Some("Polygon" | "MultiPolygon") => {
                vec![json!({"type": "Feature", "properties": {}, "geometry": value})]
            }
            Some(other) => return Err(FeatureError::NotGeoJson(other.to_string())),
            None => return Err(FeatureError::NotGeoJson("missing type".to_string())),
        };

        let polygonal: Vec<Value> = features
            .into_iter()
            .filter(|f| {
                matches!(
                    f.pointer("/geometry/type").and_then(Value::as_str),
                    Some("Polygon" | "MultiPolygon")
                )
            })
            .collect();
        if polygonal.is_empty() {
            return Err(FeatureError::NoPolygon);
        }

        Ok(Self {
            polygons: polygonal.len(),
            collection: json!({"type": "FeatureCollection", "features": polygonal}),
        })
    }

    pub fn as_geojson(&self) -> &Value {
        &self.collection
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons
    }
}

#[derive(Debug)]
pub struct HighlightOverlayManager {
    feature: Option<HighlightFeature>,
    style: HighlightStyle,
    source: SourceId,
    fill: LayerId,
    outline: LayerId,
}

impl HighlightOverlayManager {
    pub fn new(style: HighlightStyle) -> Self {
        Self {
            feature: None,
            style,
            source: SourceId::new(HIGHLIGHT_SOURCE),
            fill: LayerId::new(HIGHLIGHT_FILL),
            outline: LayerId::new(HIGHLIGHT_OUTLINE),
        }
    }

    pub fn feature(&self) -> Option<&HighlightFeature> {
        self.feature.as_ref()
    }

    pub fn is_attached(&self, engine: &dyn MapEngine) -> bool {
        engine.has_layer(&self.fill) && engine.has_layer(&self.outline)
    }

    /// Stores `feature` and (re)builds the fill and outline layers from it.
    ///
    /// The feature is stored even when the engine is not ready; the next
    /// [`restore`](Self::restore) attaches it.
    pub fn set_highlight(
        &mut self,
        engine: &mut dyn MapEngine,
        feature: HighlightFeature,
    ) -> Result<(), EngineError> {
        self.feature = Some(feature);
        self.attach_stored(engine)
    }

    /// Removes the layers and forgets the feature.
    pub fn clear_highlight(&mut self, engine: &mut dyn MapEngine) {
        self.feature = None;
        self.detach(engine);
    }

    /// Re-attaches the stored feature. Returns `Ok(false)` when nothing is stored.
    pub fn restore(&mut self, engine: &mut dyn MapEngine) -> Result<bool, EngineError> {
        if self.feature.is_none() {
            return Ok(false);
        }
        self.attach_stored(engine)?;
        Ok(true)
    }

    fn attach_stored(&self, engine: &mut dyn MapEngine) -> Result<(), EngineError> {
        let Some(feature) = self.feature.as_ref() else {
            return Ok(());
        };
        if !engine.is_style_loaded() {
            debug!("highlight deferred until the style is ready");
            return Err(EngineError::NotReady);
        }

        self.detach(engine);

        let data = SourceSpec::Geojson {
            data: feature.as_geojson().clone(),
        };
        attach_source(engine, &self.source, &data)?;

        let fill = LayerSpec::new(
            self.fill.clone(),
            LayerKind::Fill,
            self.source.clone(),
            json!({
                "fill-color": self.style.fill.to_css(),
                "fill-opacity": self.style.fill.alpha(),
            }),
        );
        let outline = LayerSpec::new(
            self.outline.clone(),
            LayerKind::Line,
            self.source.clone(),
            json!({
                "line-color": self.style.outline.to_css(),
                "line-width": self.style.outline_width_px,
            }),
        );
        let labels = engine.first_symbol_layer();
        attach_layer(engine, &fill, labels.as_ref())?;
        attach_layer(engine, &outline, labels.as_ref())?;
        debug!("highlight attached ({} polygons)", feature.polygon_count());
        Ok(())
    }

    fn detach(&self, engine: &mut dyn MapEngine) {
        if !engine.is_style_loaded() {
            return;
        }
        for id in [&self.outline, &self.fill] {
            if engine.has_layer(id) {
                engine.remove_layer(id);
            }
        }
        if engine.has_source(&self.source) {
            engine.remove_source(&self.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::memory::{MemoryEngine, MemoryLayer};
    use pretty_assertions::assert_eq;

    fn square(lon: f64, lat: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[lon, lat], [lon + 0.1, lat], [lon + 0.1, lat + 0.1], [lon, lat + 0.1], [lon, lat]]]
        })
    }

    fn source_data(engine: &MemoryEngine) -> Option<Value> {
        match engine.source(HIGHLIGHT_SOURCE)? {
            SourceSpec::Geojson { data } => Some(data.clone()),
            _ => None,
        }
    }

    #[test]
    fn normalizes_geojson_shapes() {
        let bare = HighlightFeature::from_geojson(square(2.2, 48.8)).unwrap();
        assert_eq!(bare.polygon_count(), 1);
        assert_eq!(bare.as_geojson()["type"], "FeatureCollection");

        let mixed = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {"type": "Feature", "geometry": square(0.0, 0.0)}
            ]
        });
        assert_eq!(HighlightFeature::from_geojson(mixed).unwrap().polygon_count(), 1);

        assert_eq!(
            HighlightFeature::from_geojson(json!({"type": "FeatureCollection", "features": []})),
            Err(FeatureError::NoPolygon)
        );
        assert!(matches!(
            HighlightFeature::from_geojson(json!({"error": "boom"})),
            Err(FeatureError::NotGeoJson(_))
        ));
    }

    #[test]
    fn set_replaces_previous_highlight() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let mut manager = HighlightOverlayManager::new(HighlightStyle::default());

        let a = HighlightFeature::from_geojson(square(2.2, 48.8)).unwrap();
        let b = HighlightFeature::from_geojson(square(13.3, 52.5)).unwrap();
        manager.set_highlight(&mut engine, a).unwrap();
        manager.set_highlight(&mut engine, b.clone()).unwrap();

        assert!(manager.is_attached(&engine));
        assert_eq!(source_data(&engine).as_ref(), Some(b.as_geojson()));
        let fills = engine
            .layer_ids()
            .into_iter()
            .filter(|id| id.as_str() == HIGHLIGHT_FILL)
            .count();
        assert_eq!(fills, 1);
        assert!(matches!(engine.layer(HIGHLIGHT_OUTLINE), Some(MemoryLayer::Style(_))));
    }

    #[test]
    fn restore_after_style_swap_uses_cached_feature() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let mut manager = HighlightOverlayManager::new(HighlightStyle::default());
        let f = HighlightFeature::from_geojson(square(2.2, 48.8)).unwrap();
        manager.set_highlight(&mut engine, f.clone()).unwrap();

        engine.set_style("mapbox://styles/mapbox/dark-v11");
        assert!(!manager.is_attached(&engine));
        assert_eq!(manager.restore(&mut engine), Err(EngineError::NotReady));

        engine.finish_style_load();
        assert_eq!(manager.restore(&mut engine), Ok(true));
        assert!(manager.is_attached(&engine));
        assert_eq!(source_data(&engine).as_ref(), Some(f.as_geojson()));
    }

    #[test]
    fn cleared_highlight_is_not_restored() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let mut manager = HighlightOverlayManager::new(HighlightStyle::default());
        manager
            .set_highlight(&mut engine, HighlightFeature::from_geojson(square(0.0, 0.0)).unwrap())
            .unwrap();
        manager.clear_highlight(&mut engine);
        assert!(manager.feature().is_none());

        engine.set_style("mapbox://styles/mapbox/light-v11");
        engine.finish_style_load();
        assert_eq!(manager.restore(&mut engine), Ok(false));
        assert!(!engine.has_layer(&LayerId::new(HIGHLIGHT_FILL)));
        assert!(!engine.has_layer(&LayerId::new(HIGHLIGHT_OUTLINE)));
    }

    #[test]
    fn set_before_ready_is_kept_for_later() {
        let mut engine = MemoryEngine::new(&EngineConfig::default());
        let mut manager = HighlightOverlayManager::new(HighlightStyle::default());
        let f = HighlightFeature::from_geojson(square(0.0, 0.0)).unwrap();
        assert_eq!(manager.set_highlight(&mut engine, f), Err(EngineError::NotReady));
        assert!(manager.feature().is_some());

        engine.finish_style_load();
        assert_eq!(manager.restore(&mut engine), Ok(true));
        assert!(manager.is_attached(&engine));
    }
}
