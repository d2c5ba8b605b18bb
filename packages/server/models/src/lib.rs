#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Request and response types for the gridscore HTTP API.

use gridscore_engine::results::LayerSummary;
use serde::{Deserialize, Serialize};

const fn default_radius_km() -> f64 {
    300.0
}

const fn default_it_load_mw() -> f64 {
    10.0
}

const fn default_batch_it_load_mw() -> f64 {
    50.0
}

/// `POST /api/predict-site` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteRequest {
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
    /// Local aggregation radius, km.
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// Optional target year for temporal projection.
    #[serde(default)]
    pub year: Option<i32>,
}

/// `POST /api/predict-footprint` body.
#[derive(Debug, Clone, Deserialize)]
pub struct FootprintRequest {
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
    /// IT load to size the footprint, MW.
    #[serde(default = "default_it_load_mw")]
    pub it_load_mw: f64,
    /// Provider key for published PUE lookup.
    #[serde(default)]
    pub provider: Option<String>,
    /// Local aggregation radius, km.
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// Optional target year for temporal projection.
    #[serde(default)]
    pub year: Option<i32>,
}

/// `POST /api/predict-grid` body.
#[derive(Debug, Clone, Deserialize)]
pub struct GridBatchRequest {
    /// Latitudes, degrees.
    pub lats: Vec<f64>,
    /// Longitudes, degrees (parallel to `lats`).
    pub lons: Vec<f64>,
    /// Optional target year for temporal projection.
    #[serde(default)]
    pub year: Option<i32>,
    /// Nominal IT load for per-point footprints, MW.
    #[serde(default = "default_batch_it_load_mw")]
    pub it_load_mw: f64,
}

/// `GET /predict` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictParams {
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
    /// Optional target year for temporal projection.
    #[serde(default)]
    pub year: Option<i32>,
}

/// `GET /predict` response.
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    /// Echoed latitude.
    pub lat: f64,
    /// Echoed longitude.
    pub lon: f64,
    /// Year the prediction was projected to, when given.
    pub year: Option<i32>,
    /// Predicted carbon intensity, gCO₂/kWh.
    pub carbon_intensity: f64,
    /// Annual footprint per MW of IT load, tonnes CO₂.
    pub footprint_tonnes_per_mw: f64,
    /// Local trend coefficient, fraction per year.
    pub trend_b: f64,
}

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiHealth {
    /// Whether the engine is serving.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Loaded-layer counts.
    pub layers: LayerSummary,
}

/// `POST /api/compare-sites` response.
#[derive(Debug, Clone, Serialize)]
pub struct CompareSitesResponse {
    /// Per-site footprints, best (lowest) first.
    pub sites: Vec<gridscore_engine::results::FootprintPrediction>,
    /// Annual tonnes saved by the best site vs. the worst.
    pub savings_vs_worst: f64,
}

/// Error body for user-visible request failures.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Human-readable description.
    pub error: String,
}
