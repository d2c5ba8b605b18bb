//! Prediction result types returned to the serving layer.

use std::collections::BTreeMap;

use gridscore_trends::TrendRecord;
use serde::{Deserialize, Serialize};

use crate::footprint::{Equivalences, Grade};
use crate::live::LiveReading;
use crate::overrides::IntensitySource;

/// How the final intensity was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakdown {
    /// The model's raw prediction, when a model was loaded.
    pub model_ci: Option<f64>,
    /// Layered baseline (zone → country → world average).
    pub base_ci: f64,
    /// Which override-chain rule produced the final value.
    pub source: IntensitySource,
    /// Whether a trained model was available for this prediction.
    pub model_available: bool,
}

/// Local-neighborhood context for one query point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalContext {
    /// Emitting assets within the search radius.
    pub power_assets_in_radius: usize,
    /// Fossil operations (mines, refineries, production) within the radius.
    pub fossil_ops_in_radius: usize,
    /// Zero-emission capacity within the radius, MW.
    pub clean_capacity_mw: f64,
    /// Fossil capacity within the radius, MW.
    pub fossil_capacity_mw: f64,
    /// Clean share of in-radius capacity.
    pub renewable_ratio: f64,
    /// Distance to the nearest known data center, km.
    pub nearest_dc_km: Option<f64>,
    /// Registry key of the nearest known data center.
    pub nearest_dc_id: Option<String>,
    /// Capacity by fuel category within the radius, MW.
    pub local_fuel_mix_mw: BTreeMap<String, f64>,
}

/// Temporal projection context for one query point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    /// Capacity-weighted local trend coefficient, fraction per year.
    pub local_trend_b: f64,
    /// The same trend as percent change per year.
    pub pct_change_per_year: f64,
    /// Country-level trend record, when one was fitted.
    pub country: Option<TrendRecord>,
}

/// Full site prediction for one `(lat, lon)` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitePrediction {
    /// Final carbon intensity, gCO₂/kWh.
    pub intensity: f64,
    /// 0-100 green score derived from the intensity.
    pub green_score: f64,
    /// Letter grade.
    pub grade: Grade,
    /// Resolved country display name.
    pub country: Option<String>,
    /// Resolved ISO-3 country code.
    pub country_iso3: Option<String>,
    /// Resolved grid zone key.
    pub zone: Option<String>,
    /// How the final intensity was produced.
    pub breakdown: Breakdown,
    /// Local-neighborhood context.
    pub local_context: LocalContext,
    /// Temporal projection context.
    pub projection: Projection,
    /// No zone or country baseline resolved; defaults were used.
    pub resolution_gap: bool,
    /// Live reading that overrode the model, when one applied.
    pub live_override: Option<LiveReading>,
    /// Radius used for local aggregation, km.
    pub search_radius_km: f64,
}

/// Footprint projection to future years along the local trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintProjection {
    /// Near projection year (trend horizon + 3).
    pub near_year: i32,
    /// Projected intensity at the near year, gCO₂/kWh.
    pub near_ci: f64,
    /// Projected annual footprint at the near year, tonnes.
    pub near_tonnes: f64,
    /// Far projection year (trend horizon + 6).
    pub far_year: i32,
    /// Projected intensity at the far year, gCO₂/kWh.
    pub far_ci: f64,
    /// Projected annual footprint at the far year, tonnes.
    pub far_tonnes: f64,
    /// Local trend coefficient driving the projection.
    pub trend_b: f64,
}

/// Annual carbon footprint prediction for a data-center site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintPrediction {
    /// Query latitude, degrees.
    pub lat: f64,
    /// Query longitude, degrees.
    pub lon: f64,
    /// Resolved country display name.
    pub country: Option<String>,
    /// Resolved ISO-3 country code.
    pub country_iso3: Option<String>,
    /// IT load the footprint assumes, MW.
    pub it_load_mw: f64,
    /// Estimated power usage effectiveness.
    pub pue: f64,
    /// Provider the PUE came from, when given.
    pub provider: Option<String>,
    /// Grid carbon intensity at the site, gCO₂/kWh.
    pub intensity: f64,
    /// Annual footprint, tonnes CO₂.
    pub annual_tonnes: f64,
    /// Annual footprint per MW of IT load, tonnes CO₂.
    pub tonnes_per_mw: f64,
    /// Relatable equivalences.
    pub equivalences: Equivalences,
    /// Trend projection, when a nonzero local trend resolved.
    pub projection: Option<FootprintProjection>,
    /// 0-100 green score from the per-MW footprint.
    pub green_score: f64,
    /// Letter grade.
    pub grade: Grade,
    /// The underlying site prediction.
    pub site: SitePrediction,
}

/// Timing breakdown for one batch evaluation, microseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchTimings {
    /// Spatial index queries for the whole array.
    pub index_us: u128,
    /// Per-point feature assembly.
    pub features_us: u128,
    /// Model evaluation and overrides.
    pub predict_us: u128,
}

/// Vectorized batch prediction over coordinate arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPrediction {
    /// Carbon intensity per point, gCO₂/kWh.
    pub intensity: Vec<f64>,
    /// Annual footprint per point at the nominal IT load, tonnes.
    pub footprint: Vec<f64>,
    /// Local trend coefficient per point, fraction per year.
    pub trend: Vec<f64>,
    /// Where the time went.
    pub timings: BatchTimings,
}

/// Loaded-layer counts for the health surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Emitting assets loaded.
    pub power_assets: usize,
    /// Clean plants loaded.
    pub clean_assets: usize,
    /// Fossil operations loaded.
    pub fossil_ops: usize,
    /// Data centers loaded.
    pub data_centers: usize,
    /// Zones known (config or boundary).
    pub zones: usize,
    /// Zone boundary polygons indexed.
    pub zone_polygons: usize,
    /// Country profiles loaded.
    pub country_profiles: usize,
    /// Country trends fitted.
    pub country_trends: usize,
    /// Whether a trained model is loaded.
    pub model_available: bool,
    /// Latest reporting year of the emitting-asset layer.
    pub latest_year: i32,
}

/// One row of the ranked country table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRanking {
    /// ISO-3 country code.
    pub iso3: String,
    /// Display name.
    pub country: String,
    /// Baseline intensity, gCO₂/kWh.
    pub carbon_intensity: Option<f64>,
    /// 0-100 green score.
    pub green_score: f64,
    /// Letter grade.
    pub grade: Grade,
}
