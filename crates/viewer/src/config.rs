use flow::{ArrowSettings, PointCloudSettings};
use foundation::LngLat;
use layers::EngineConfig;
use layers::symbology::HighlightStyle;
use layers::terrain::TerrainSettings;
use serde::{Deserialize, Serialize};

use crate::mode::{FocusSettings, GlobeSettings};
use crate::orbit::OrbitSettings;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "invalid visualization config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    /// How long a projection change is in flight before the next renderer is built.
    pub settle_ms: u32,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self { settle_ms: 900 }
    }
}

/// Everything a visualization instance is configured with. Every field has a
/// default, so hosts pass only what they override.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    pub engine: EngineConfig,
    pub backend: BackendSettings,
    pub orbit: OrbitSettings,
    pub focus: FocusSettings,
    pub globe: GlobeSettings,
    pub projection: ProjectionSettings,
    pub arrows: ArrowSettings,
    pub point_cloud: PointCloudSettings,
    pub terrain: TerrainSettings,
    pub highlight: HighlightStyle,
    /// Point cloud anchor used when 3D is entered without a selected site.
    pub default_anchor: Option<LngLat>,
    /// Seed for particle placement; random when absent.
    pub seed: Option<u64>,
}

impl VizConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    pub fn anchor_or_home(&self) -> LngLat {
        self.default_anchor.unwrap_or(self.globe.home.center)
    }
}
