//! Idempotent attachment of sources and layers.
//!
//! Attaching something that already exists reports [`Attach::AlreadyPresent`]
//! instead of failing, so replays after a basemap swap can run any number of times.

use foundation::{LayerId, SourceId};
use tracing::debug;

use crate::engine::{EngineError, LayerSpec, MapEngine, SourceSpec};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attach {
    Added,
    AlreadyPresent,
}

/// A layer the core owns in the engine, plus where it goes in the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRegistration {
    pub id: LayerId,
    /// `None` for custom render layers, which draw their own data.
    pub source_id: Option<SourceId>,
    pub insert_before: Option<LayerId>,
}

impl LayerRegistration {
    pub fn new(id: impl Into<LayerId>, source_id: Option<SourceId>) -> Self {
        Self {
            id: id.into(),
            source_id,
            insert_before: None,
        }
    }

    pub fn custom(id: impl Into<LayerId>) -> Self {
        Self::new(id, None)
    }

    pub fn with_insert_before(mut self, before: Option<LayerId>) -> Self {
        self.insert_before = before;
        self
    }

    pub fn is_attached(&self, engine: &dyn MapEngine) -> bool {
        engine.has_layer(&self.id)
    }

    /// Removes the layer if present. The source is left alone since other
    /// layers may still read from it.
    pub fn detach(&self, engine: &mut dyn MapEngine) -> bool {
        if !engine.has_layer(&self.id) {
            return false;
        }
        engine.remove_layer(&self.id);
        true
    }
}

/// Resolves an insertion anchor against the current style. Anchors that the
/// current style does not contain fall back to the top of the stack.
pub fn resolve_anchor<'a>(engine: &dyn MapEngine, before: Option<&'a LayerId>) -> Option<&'a LayerId> {
    before.filter(|id| engine.has_layer(id))
}

pub fn attach_source(
    engine: &mut dyn MapEngine,
    id: &SourceId,
    spec: &SourceSpec,
) -> Result<Attach, EngineError> {
    if !engine.is_style_loaded() {
        return Err(EngineError::NotReady);
    }
    if engine.has_source(id) {
        return Ok(Attach::AlreadyPresent);
    }
    match engine.add_source(id, spec) {
        Ok(()) => Ok(Attach::Added),
        Err(EngineError::DuplicateSource(_)) => Ok(Attach::AlreadyPresent),
        Err(err) => Err(err),
    }
}

pub fn attach_layer(
    engine: &mut dyn MapEngine,
    spec: &LayerSpec,
    before: Option<&LayerId>,
) -> Result<Attach, EngineError> {
    if !engine.is_style_loaded() {
        return Err(EngineError::NotReady);
    }
    if engine.has_layer(&spec.id) {
        return Ok(Attach::AlreadyPresent);
    }
    if !engine.has_source(&spec.source) {
        return Err(EngineError::MissingSource(spec.source.clone()));
    }
    let before = resolve_anchor(engine, before);
    match engine.add_layer(spec, before) {
        Ok(()) => Ok(Attach::Added),
        Err(EngineError::DuplicateLayer(_)) => Ok(Attach::AlreadyPresent),
        Err(err) => Err(err),
    }
}

pub fn attach_custom_layer(
    engine: &mut dyn MapEngine,
    registration: &LayerRegistration,
) -> Result<Attach, EngineError> {
    if !engine.is_style_loaded() {
        return Err(EngineError::NotReady);
    }
    if engine.has_layer(&registration.id) {
        return Ok(Attach::AlreadyPresent);
    }
    let before = resolve_anchor(engine, registration.insert_before.as_ref());
    match engine.add_custom_layer(&registration.id, before) {
        Ok(()) => {
            debug!("custom layer {} attached before {:?}", registration.id, before);
            Ok(Attach::Added)
        }
        Err(EngineError::DuplicateLayer(_)) => Ok(Attach::AlreadyPresent),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, LayerKind};
    use crate::memory::MemoryEngine;
    use serde_json::json;

    fn geojson() -> SourceSpec {
        SourceSpec::Geojson {
            data: json!({"type": "FeatureCollection", "features": []}),
        }
    }

    #[test]
    fn attaching_twice_is_a_noop() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let src = SourceId::new("s");
        assert_eq!(attach_source(&mut engine, &src, &geojson()), Ok(Attach::Added));
        assert_eq!(attach_source(&mut engine, &src, &geojson()), Ok(Attach::AlreadyPresent));

        let spec = LayerSpec::new("l", LayerKind::Fill, "s", json!({}));
        assert_eq!(attach_layer(&mut engine, &spec, None), Ok(Attach::Added));
        assert_eq!(attach_layer(&mut engine, &spec, None), Ok(Attach::AlreadyPresent));
        assert_eq!(engine.layer_ids().iter().filter(|id| id.as_str() == "l").count(), 1);
    }

    #[test]
    fn not_ready_before_style_load() {
        let mut engine = MemoryEngine::new(&EngineConfig::default());
        let err = attach_source(&mut engine, &SourceId::new("s"), &geojson());
        assert_eq!(err, Err(EngineError::NotReady));
    }

    #[test]
    fn layer_without_source_is_rejected() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let spec = LayerSpec::new("l", LayerKind::Line, "nope", json!({}));
        assert_eq!(
            attach_layer(&mut engine, &spec, None),
            Err(EngineError::MissingSource(SourceId::new("nope")))
        );
    }

    #[test]
    fn custom_layer_goes_below_labels_and_detaches_once() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let reg = LayerRegistration::custom("flow-points").with_insert_before(engine.first_symbol_layer());
        assert_eq!(attach_custom_layer(&mut engine, &reg), Ok(Attach::Added));

        let ids = engine.layer_ids();
        let flow = ids.iter().position(|id| id.as_str() == "flow-points").unwrap();
        let label = ids.iter().position(|id| Some(id) == engine.first_symbol_layer().as_ref()).unwrap();
        assert!(flow < label);

        assert!(reg.detach(&mut engine));
        assert!(!reg.detach(&mut engine));
    }

    #[test]
    fn unknown_anchor_falls_back_to_top() {
        let mut engine = MemoryEngine::loaded(&EngineConfig::default());
        let reg = LayerRegistration::custom("x").with_insert_before(Some(LayerId::new("gone")));
        assert_eq!(attach_custom_layer(&mut engine, &reg), Ok(Attach::Added));
        assert_eq!(engine.layer_ids().last().map(|id| id.as_str()), Some("x"));
    }
}
