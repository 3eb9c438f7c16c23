//! Simulation backend: request/response shapes and the client seam.

use flow::FlowSeries;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The request never produced a response.
    Transport(String),
    Status(u16),
    Decode(String),
    /// The body parsed but is unusable (error payload, empty or non-finite series).
    Malformed(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "request failed: {msg}"),
            FetchError::Status(code) => write!(f, "backend returned HTTP {code}"),
            FetchError::Decode(msg) => write!(f, "invalid response body: {msg}"),
            FetchError::Malformed(msg) => write!(f, "unusable response: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Daily,
    Monthly,
    Yearly,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Monthly => "monthly",
            Interval::Yearly => "yearly",
        }
    }

    /// Lenient parse for host input; anything unrecognised is daily.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Interval::Monthly,
            "yearly" | "year" | "annual" => Interval::Yearly,
            _ => Interval::Daily,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxQuery {
    pub city: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub interval: Interval,
}

impl FluxQuery {
    /// `/flux` query parameters, unencoded, in the order the backend documents them.
    pub fn params(&self) -> [(&'static str, &str); 4] {
        [
            ("city", self.city.as_str()),
            ("start_date", self.start_date.as_str()),
            ("end_date", self.end_date.as_str()),
            ("interval", self.interval.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundaryResponse {
    pub geojson: Value,
    /// Set when the backend fell back to a coarser (country) outline.
    #[serde(default)]
    pub approx_boundary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    pub speed_ms: f64,
    pub direction_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxPoint {
    pub date: String,
    #[serde(rename = "flux_L")]
    pub flux_l: f64,
}

/// `/flux` report. Only `wind_series` drives rendering; the rest is kept for
/// the host UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxReport {
    pub city: String,
    pub interval: Interval,
    pub start_date: String,
    pub end_date: String,
    pub area_km2: f64,
    #[serde(rename = "mean_AH_gm3")]
    pub mean_ah_gm3: f64,
    #[serde(rename = "total_stock_L")]
    pub total_stock_l: f64,
    pub wind_speed_ms: f64,
    #[serde(rename = "net_flux_L")]
    pub net_flux_l: f64,
    pub population_used: u64,
    pub population_source: String,
    #[serde(rename = "demand_L")]
    pub demand_l: f64,
    pub demand_source: String,
    pub flux_to_demand_ratio: f64,
    pub flux_series: Vec<FluxPoint>,
    pub wind_series: Vec<WindSample>,
    pub terrain_elevation_m: f64,
    pub terrain_factor: f64,
    pub data_timestamp: Option<String>,
}

impl FluxReport {
    /// Converts the wind series into renderer frames. Empty or non-finite
    /// series are rejected so the previous frames stay on screen.
    pub fn flow_series(&self) -> Result<FlowSeries, FetchError> {
        if self.wind_series.is_empty() {
            return Err(FetchError::Malformed("empty wind_series".to_string()));
        }
        if let Some(i) = self
            .wind_series
            .iter()
            .position(|w| !w.speed_ms.is_finite() || !w.direction_deg.is_finite())
        {
            return Err(FetchError::Malformed(format!("non-finite wind sample at {i}")));
        }
        Ok(FlowSeries::from_samples(
            self.wind_series.iter().map(|w| (w.direction_deg, w.speed_ms)),
        ))
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if let Some(err) = value.get("error") {
        let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(FetchError::Malformed(msg));
    }
    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

pub fn decode_boundary(body: &str) -> Result<BoundaryResponse, FetchError> {
    decode(body)
}

pub fn decode_flux(body: &str) -> Result<FluxReport, FetchError> {
    decode(body)
}

/// Checks the status first so an error page is reported as such.
pub fn check_status(status: u16) -> Result<(), FetchError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(FetchError::Status(status))
    }
}

/// Asynchronous access to the simulation backend. Implementations only
/// perform the request; retries and caching are theirs to decide.
#[allow(async_fn_in_trait)]
pub trait BackendClient {
    async fn boundary(&self, city: &str) -> Result<BoundaryResponse, FetchError>;
    async fn flux(&self, query: &FluxQuery) -> Result<FluxReport, FetchError>;
}
