#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Carbon-intensity fusion and inference engine.
//!
//! Fuses the loaded data layers — country profiles, point-form power and
//! industrial assets, zone boundary polygons with generation-mix estimates,
//! and an optional live feed — into a fixed feature vector per query point,
//! scored by a pre-trained linear model with an ordered override chain on
//! top.
//!
//! All tables and spatial indexes are built once by [`Engine::init`] and
//! immutable afterwards; queries are read-only, so one engine is safely
//! shared across concurrent request handlers without locking.
//! [`Engine::reload`] builds a fresh engine honoring the snapshot
//! staleness keys.

pub mod batch;
pub mod features;
pub mod footprint;
pub mod live;
pub mod model;
pub mod overrides;
pub mod results;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gridscore_assets::{AssetError, loader, reference};
use gridscore_assets_models::{
    AssetTable, CleanAsset, CountryProfile, DataCenter, FossilOp, FossilSector, FuelWeights,
};
use gridscore_spatial::{EARTH_RADIUS_KM, GreatCircleTree, ZoneIndex};
use gridscore_trends::TrendRecord;
use gridscore_zones::{ZoneError, ZoneStats, load_zone_boundaries, load_zone_stats};
use thiserror::Error;

pub use features::DEFAULT_RADIUS_KM;
use features::Fused;
use footprint::{Equivalences, Grade, annual_tonnes, estimate_pue, footprint_green_score, green_score};
use live::{LIVE_COUNTRY, LiveFeed, LiveReading};
use model::RegressionModel;
use overrides::OverrideContext;
use results::{
    Breakdown, CountryRanking, FootprintPrediction, FootprintProjection, LayerSummary,
    LocalContext, Projection, SitePrediction,
};

/// Errors from engine construction and queries.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An asset or reference layer failed to load.
    #[error(transparent)]
    Assets(#[from] AssetError),

    /// A zone layer failed to load.
    #[error(transparent)]
    Zones(#[from] ZoneError),

    /// The model artifact is present but unusable.
    #[error("Model error: {message}")]
    Model {
        /// Description of what went wrong.
        message: String,
    },

    /// HTTP client construction failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A query coordinate is out of range or non-finite.
    #[error("Invalid coordinates: ({lat}, {lon})")]
    InvalidCoordinates {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lon: f64,
    },

    /// Batch input arrays disagree in shape.
    #[error("Input shape error: {message}")]
    InputShape {
        /// Description of the mismatch.
        message: String,
    },
}

/// Source file locations for every data layer.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Emitting-asset CSV.
    pub power_assets: PathBuf,
    /// Clean-plant registry CSV.
    pub clean_assets: PathBuf,
    /// Coal-mining operations CSV.
    pub coal_mining: PathBuf,
    /// Oil-refining operations CSV.
    pub oil_refining: PathBuf,
    /// Oil/gas production operations CSV.
    pub oil_gas_production: PathBuf,
    /// Country profile JSON.
    pub country_profiles: PathBuf,
    /// Per-fuel intensity reference JSON.
    pub fuel_weights: PathBuf,
    /// Data-center registry JSON.
    pub data_centers: PathBuf,
    /// Zone config JSON (mix ratios, capacity, centroids).
    pub zone_config: PathBuf,
    /// Zone boundary `GeoJSON`.
    pub zone_boundaries: PathBuf,
    /// Trained model artifact JSON.
    pub model: PathBuf,
    /// Directory for binary snapshot caches.
    pub cache_dir: PathBuf,
}

impl DataPaths {
    /// Conventional layout under a data root directory.
    #[must_use]
    pub fn from_root(root: &Path) -> Self {
        Self {
            power_assets: root.join("power_assets.csv"),
            clean_assets: root.join("clean_assets.csv"),
            coal_mining: root.join("coal_mining.csv"),
            oil_refining: root.join("oil_refining.csv"),
            oil_gas_production: root.join("oil_gas_production.csv"),
            country_profiles: root.join("country_profiles.json"),
            fuel_weights: root.join("fuel_weights.json"),
            data_centers: root.join("data_centers.json"),
            zone_config: root.join("zones.json"),
            zone_boundaries: root.join("world.geojson"),
            model: root.join("trained_model.json"),
            cache_dir: root.join(".cache"),
        }
    }
}

/// Engine behavior switches.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Disable the live feed entirely (tests, offline operation).
    pub disable_live: bool,
    /// Live feed base URL.
    pub live_base_url: String,
    /// Live feed request timeout.
    pub live_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            disable_live: false,
            live_base_url: live::DEFAULT_LIVE_BASE_URL.to_string(),
            live_timeout: live::DEFAULT_LIVE_TIMEOUT,
        }
    }
}

/// Columnar per-asset arrays derived once at init so batch evaluation never
/// re-classifies or re-unwraps per query.
#[derive(Debug)]
pub(crate) struct AssetView {
    pub caps: Vec<f64>,
    pub emissions: Vec<f64>,
    pub ef: Vec<Option<f64>>,
    pub activity: Vec<Option<f64>>,
    pub cf: Vec<Option<f64>>,
    pub trend: Vec<f64>,
    pub fuel_ci: Vec<f64>,
    pub is_fossil: Vec<bool>,
    pub is_coal: Vec<bool>,
}

/// Columnar clean-plant arrays.
#[derive(Debug)]
pub(crate) struct CleanView {
    pub caps: Vec<f64>,
    pub fuel_ci: Vec<f64>,
}

/// The fusion-and-inference engine: every loaded layer plus its indexes.
///
/// Immutable after [`Engine::init`]; shared freely across threads.
pub struct Engine {
    paths: DataPaths,
    options: EngineOptions,

    pub(crate) power: AssetTable,
    pub(crate) power_view: AssetView,
    pub(crate) power_tree: GreatCircleTree,

    pub(crate) clean: Vec<CleanAsset>,
    pub(crate) clean_view: CleanView,
    pub(crate) clean_tree: GreatCircleTree,

    fossil_ops: Vec<FossilOp>,
    fossil_tree: GreatCircleTree,

    data_centers: Vec<DataCenter>,
    dc_tree: GreatCircleTree,

    pub(crate) zones: Vec<ZoneStats>,
    pub(crate) zone_index: ZoneIndex,
    pub(crate) zone_centroid_tree: GreatCircleTree,
    pub(crate) zone_centroid_slots: Vec<usize>,

    pub(crate) countries: BTreeMap<String, CountryProfile>,
    pub(crate) country_trends: BTreeMap<String, TrendRecord>,
    pub(crate) fuel_weights: FuelWeights,

    pub(crate) model: Option<RegressionModel>,
    live: Option<LiveFeed>,
}

impl Engine {
    /// Loads every layer, fits trends, and builds the spatial indexes.
    ///
    /// # Errors
    ///
    /// Returns an error when any required source is missing or unreadable,
    /// or when a present model artifact is internally inconsistent. A
    /// missing model artifact is not fatal — predictions degrade to the
    /// layered baseline and are flagged.
    pub fn init(paths: DataPaths, options: EngineOptions) -> Result<Self, EngineError> {
        let power_load = loader::load_power_assets(&paths.power_assets, &paths.cache_dir)?;
        let clean_load = loader::load_clean_assets(&paths.clean_assets, &paths.cache_dir)?;
        let fossil_load = loader::load_fossil_ops(
            &[
                (paths.coal_mining.as_path(), FossilSector::CoalMining),
                (paths.oil_refining.as_path(), FossilSector::OilRefining),
                (
                    paths.oil_gas_production.as_path(),
                    FossilSector::OilGasProduction,
                ),
            ],
            &paths.cache_dir,
        )?;
        let countries = reference::load_country_profiles(&paths.country_profiles)?;
        let fuel_weights = reference::load_fuel_weights(&paths.fuel_weights)?;
        let data_centers = reference::load_data_centers(&paths.data_centers)?;
        let zone_stats = load_zone_stats(&paths.zone_config, &paths.cache_dir)?;
        let boundaries = load_zone_boundaries(&paths.zone_boundaries)?;
        let model = RegressionModel::load(&paths.model)?;

        let live = if options.disable_live {
            None
        } else {
            Some(LiveFeed::new(&options.live_base_url, options.live_timeout)?)
        };

        // Merge boundary-only zone keys into the stats table so polygon
        // containment can always name its zone, even without mix data.
        let mut zones = zone_stats.stats;
        let mut slot_by_key: BTreeMap<String, usize> = zones
            .iter()
            .enumerate()
            .map(|(slot, zone)| (zone.key.clone(), slot))
            .collect();
        let mut polygons = Vec::with_capacity(boundaries.len());
        for boundary in boundaries {
            let slot = *slot_by_key
                .entry(boundary.key.clone())
                .or_insert_with(|| {
                    zones.push(ZoneStats {
                        key: boundary.key.clone(),
                        ci: None,
                        clean_cap_frac: None,
                        fossil_cap_frac: None,
                        coal_cap_mw: 0.0,
                        center_lat: None,
                        center_lon: None,
                    });
                    zones.len() - 1
                });
            polygons.push((slot, boundary.polygon));
        }
        let zone_polygons = polygons.len();
        let zone_index = ZoneIndex::build(polygons);

        // Centroid tree over zones carrying both a center and an intensity.
        let mut centroid_coords = Vec::new();
        let mut zone_centroid_slots = Vec::new();
        for (slot, zone) in zones.iter().enumerate() {
            if let (Some(lat), Some(lon), Some(_)) = (zone.center_lat, zone.center_lon, zone.ci) {
                centroid_coords.push((lat, lon));
                zone_centroid_slots.push(slot);
            }
        }
        let zone_centroid_tree = GreatCircleTree::build(&centroid_coords);

        let power = power_load.table;
        let power_coords: Vec<(f64, f64)> = power.assets.iter().map(|a| (a.lat, a.lon)).collect();
        let power_tree = GreatCircleTree::build(&power_coords);
        let power_view = AssetView {
            caps: power
                .assets
                .iter()
                .map(|a| a.capacity_mw.unwrap_or(0.0))
                .collect(),
            emissions: power.assets.iter().map(|a| a.emissions_t).collect(),
            ef: power.assets.iter().map(|a| a.emission_factor).collect(),
            activity: power.assets.iter().map(|a| a.generation_mwh).collect(),
            cf: power.assets.iter().map(|a| a.capacity_factor).collect(),
            trend: power.assets.iter().map(|a| a.trend_b).collect(),
            fuel_ci: power
                .assets
                .iter()
                .map(|a| fuel_weights.intensity(a.fuel))
                .collect(),
            is_fossil: power.assets.iter().map(|a| a.fuel.is_fossil()).collect(),
            is_coal: power
                .assets
                .iter()
                .map(|a| a.fuel == gridscore_assets_models::FuelCategory::Coal)
                .collect(),
        };

        let clean = clean_load.assets;
        let clean_coords: Vec<(f64, f64)> = clean.iter().map(|c| (c.lat, c.lon)).collect();
        let clean_tree = GreatCircleTree::build(&clean_coords);
        let clean_view = CleanView {
            caps: clean.iter().map(|c| c.capacity_mw).collect(),
            fuel_ci: clean
                .iter()
                .map(|c| fuel_weights.intensity(c.fuel))
                .collect(),
        };

        let fossil_ops = fossil_load.ops;
        let fossil_coords: Vec<(f64, f64)> = fossil_ops.iter().map(|o| (o.lat, o.lon)).collect();
        let fossil_tree = GreatCircleTree::build(&fossil_coords);

        let dc_coords: Vec<(f64, f64)> = data_centers.iter().map(|d| (d.lat, d.lon)).collect();
        let dc_tree = GreatCircleTree::build(&dc_coords);

        log::info!(
            "Engine ready: {} power assets, {} clean plants, {} fossil ops, {} zones ({zone_polygons} polygons), {} countries, model {}",
            power.assets.len(),
            clean.len(),
            fossil_ops.len(),
            zones.len(),
            countries.len(),
            if model.is_some() { "loaded" } else { "absent" }
        );

        Ok(Self {
            paths,
            options,
            power,
            power_view,
            power_tree,
            clean,
            clean_view,
            clean_tree,
            fossil_ops,
            fossil_tree,
            data_centers,
            dc_tree,
            zones,
            zone_index,
            zone_centroid_tree,
            zone_centroid_slots,
            countries,
            country_trends: power_load.country_trends,
            fuel_weights,
            model,
            live,
        })
    }

    /// Builds a fresh engine from the same sources, honoring the snapshot
    /// staleness keys. The serving layer swaps the returned engine in.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Engine::init`].
    pub fn reload(&self) -> Result<Self, EngineError> {
        Self::init(self.paths.clone(), self.options.clone())
    }

    fn validate(lat: f64, lon: f64) -> Result<(), EngineError> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(EngineError::InvalidCoordinates { lat, lon });
        }
        Ok(())
    }

    /// Predicts the carbon intensity at one point, consulting the live
    /// feed when the resolved country is live-capable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCoordinates`] for out-of-range or
    /// non-finite coordinates — the only user-visible query failure. Live
    /// feed problems degrade silently to the model's value.
    pub async fn predict(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        year: Option<i32>,
    ) -> Result<SitePrediction, EngineError> {
        Self::validate(lat, lon)?;
        let hood = self.gather(lat, lon, radius_km);
        let fused = self.fuse(lat, lon, year, &hood);

        let live = match (&self.live, fused.country_iso3.as_deref()) {
            (Some(feed), Some(LIVE_COUNTRY)) => feed.fetch().await,
            _ => None,
        };

        Ok(self.finish(lat, lon, radius_km, fused, live))
    }

    /// Deterministic prediction core with an injected live reading.
    ///
    /// The async [`Engine::predict`] wraps this with a real fetch; tests
    /// and offline batch tooling call it directly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCoordinates`] for out-of-range or
    /// non-finite coordinates.
    pub fn predict_with_live(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        year: Option<i32>,
        live: Option<LiveReading>,
    ) -> Result<SitePrediction, EngineError> {
        Self::validate(lat, lon)?;
        let hood = self.gather(lat, lon, radius_km);
        let fused = self.fuse(lat, lon, year, &hood);
        Ok(self.finish(lat, lon, radius_km, fused, live))
    }

    /// Applies the model and override chain and assembles the response.
    fn finish(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        fused: Fused,
        live: Option<LiveReading>,
    ) -> SitePrediction {
        let model_ci = self.model.as_ref().map(|model| {
            let row = Self::feature_row(&fused.features, model.features());
            model.score(&row)
        });

        let ctx = OverrideContext {
            zone_baseline: fused.zone_baseline,
            model_ci,
            base_ci: fused.base_ci,
            country_iso3: fused.country_iso3.as_deref(),
            live: live.as_ref(),
        };
        let resolution = overrides::resolve(&ctx);

        let radius_rad = radius_km / EARTH_RADIUS_KM;
        let fossil_ops_in_radius = self.fossil_tree.within_radius(lat, lon, radius_rad).len();
        let nearest_dc = self.dc_tree.nearest(lat, lon, 1).into_iter().next();

        let capacity_total = fused.clean_capacity_mw + fused.fossil_capacity_mw;
        let renewable_ratio = fused.clean_capacity_mw / capacity_total.max(1.0);

        let score = green_score(resolution.intensity);
        let live_applied = resolution.source == overrides::IntensitySource::LiveFeed;

        SitePrediction {
            intensity: resolution.intensity,
            green_score: score,
            grade: Grade::from_score(score),
            country: fused.country_name,
            country_iso3: fused.country_iso3.clone(),
            zone: fused.zone_key,
            breakdown: Breakdown {
                model_ci,
                base_ci: fused.base_ci,
                source: resolution.source,
                model_available: self.model.is_some(),
            },
            local_context: LocalContext {
                power_assets_in_radius: fused.power_in_radius,
                fossil_ops_in_radius,
                clean_capacity_mw: fused.clean_capacity_mw,
                fossil_capacity_mw: fused.fossil_capacity_mw,
                renewable_ratio,
                nearest_dc_km: nearest_dc.map(|(_, dist)| dist * EARTH_RADIUS_KM),
                nearest_dc_id: nearest_dc.map(|(idx, _)| self.data_centers[idx].id.clone()),
                local_fuel_mix_mw: fused.local_fuel_mix_mw,
            },
            projection: Projection {
                local_trend_b: fused.local_trend_b,
                pct_change_per_year: fused.local_trend_b * 100.0,
                country: fused
                    .country_iso3
                    .as_deref()
                    .and_then(|code| self.country_trends.get(code))
                    .cloned(),
            },
            resolution_gap: fused.resolution_gap,
            live_override: live_applied.then_some(live).flatten(),
            search_radius_km: radius_km,
        }
    }

    /// Predicts the annual carbon footprint for a data center at a site.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCoordinates`] for out-of-range or
    /// non-finite coordinates.
    pub async fn predict_footprint(
        &self,
        lat: f64,
        lon: f64,
        it_load_mw: f64,
        provider: Option<&str>,
        radius_km: f64,
        year: Option<i32>,
    ) -> Result<FootprintPrediction, EngineError> {
        let site = self.predict(lat, lon, radius_km, year).await?;
        Ok(self.footprint_from_site(lat, lon, it_load_mw, provider, site))
    }

    /// Footprint assembly shared by the async path and tests.
    #[must_use]
    pub fn footprint_from_site(
        &self,
        lat: f64,
        lon: f64,
        it_load_mw: f64,
        provider: Option<&str>,
        site: SitePrediction,
    ) -> FootprintPrediction {
        let pue = estimate_pue(lat, provider);
        let tonnes = annual_tonnes(it_load_mw, pue, site.intensity);
        let tonnes_per_mw = tonnes / it_load_mw.max(0.001);

        let trend_b = site.projection.local_trend_b;
        let projection = (trend_b != 0.0).then(|| {
            let project = |years_out: i32| {
                let scale = (1.0 + trend_b * f64::from(years_out)).max(0.0);
                let ci = site.intensity * scale;
                (ci, annual_tonnes(it_load_mw, pue, ci))
            };
            let (near_ci, near_tonnes) = project(3);
            let (far_ci, far_tonnes) = project(6);
            FootprintProjection {
                near_year: self.power.trend_horizon + 3,
                near_ci,
                near_tonnes,
                far_year: self.power.trend_horizon + 6,
                far_ci,
                far_tonnes,
                trend_b,
            }
        });

        let score = footprint_green_score(tonnes_per_mw);
        FootprintPrediction {
            lat,
            lon,
            country: site.country.clone(),
            country_iso3: site.country_iso3.clone(),
            it_load_mw,
            pue,
            provider: provider.map(str::to_lowercase),
            intensity: site.intensity,
            annual_tonnes: tonnes,
            tonnes_per_mw,
            equivalences: Equivalences::from_tonnes(tonnes),
            projection,
            green_score: score,
            grade: Grade::from_score(score),
            site,
        }
    }

    /// Loaded-layer counts for the health surface.
    #[must_use]
    pub fn layer_summary(&self) -> LayerSummary {
        LayerSummary {
            power_assets: self.power.assets.len(),
            clean_assets: self.clean.len(),
            fossil_ops: self.fossil_ops.len(),
            data_centers: self.data_centers.len(),
            zones: self.zones.len(),
            zone_polygons: self.zone_index.len(),
            country_profiles: self.countries.len(),
            country_trends: self.country_trends.len(),
            model_available: self.model.is_some(),
            latest_year: self.power.latest_year,
        }
    }

    /// Countries ranked by green score, best first.
    #[must_use]
    pub fn country_rankings(&self) -> Vec<CountryRanking> {
        let mut rankings: Vec<CountryRanking> = self
            .countries
            .iter()
            .map(|(iso3, profile)| {
                let score = profile.carbon_intensity.map_or(0.0, green_score);
                CountryRanking {
                    iso3: iso3.clone(),
                    country: if profile.name.is_empty() {
                        iso3.clone()
                    } else {
                        profile.name.clone()
                    },
                    carbon_intensity: profile.carbon_intensity,
                    green_score: score,
                    grade: Grade::from_score(score),
                }
            })
            .collect();
        rankings.sort_by(|a, b| b.green_score.total_cmp(&a.green_score));
        rankings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::IntensitySource;

    const POWER_HEADER: &str = "source_name,source_type,iso3_country,start_time,lat,lon,emissions_quantity,capacity,emissions_factor,activity,capacity_factor\n";

    /// Standard fixture: Germany (coal + gas in a dirty zone), Quebec
    /// (hydro-dominated clean zone), Great Britain (no zone polygon,
    /// country baseline only).
    fn fixture(tag: &str, model_json: Option<&str>) -> Engine {
        let dir = std::env::temp_dir().join(format!("gridscore_engine_{tag}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir");

        std::fs::write(
            dir.join("power_assets.csv"),
            format!(
                "{POWER_HEADER}\
                 coal-de,coal,DEU,2021-01-01,50.0,8.0,1100,500,,,\n\
                 coal-de,coal,DEU,2022-01-01,50.0,8.0,1000,500,,,\n\
                 coal-de,coal,DEU,2023-01-01,50.0,8.0,900,500,,,\n\
                 coal-de,coal,DEU,2024-01-01,50.0,8.0,850,500,0.95,900,0.5\n\
                 gas-de,gas,DEU,2024-01-01,50.5,8.5,400,300,0.45,800,0.4\n\
                 gas-gb,CCGT,GBR,2024-01-01,51.5,-0.1,300,400,0.4,700,0.45\n\
                 gas-qc,gas,CAN,2024-01-01,46.8,-71.2,120,200,0.4,250,0.3\n"
            ),
        )
        .expect("power csv");

        std::fs::write(
            dir.join("clean_assets.csv"),
            "name,country,primary_fuel,capacity_mw,latitude,longitude\n\
             hydro-qc,CAN,Hydro,5000,47.0,-71.0\n\
             hydro-de,DEU,Hydro,400,50.1,8.1\n",
        )
        .expect("clean csv");

        std::fs::write(
            dir.join("coal_mining.csv"),
            format!("{POWER_HEADER}mine-de,coal mine,DEU,2024-01-01,50.2,7.9,500,,,,\n"),
        )
        .expect("fossil csv");

        std::fs::write(
            dir.join("country_profiles.json"),
            r#"{"DEU": {"country_name": "Germany", "carbon_intensity": 381.0,
                 "total_TWh": 500.0, "fossil_TWh": 250.0, "coal_TWh": 120.0,
                 "gas_TWh": 80.0, "nuclear_TWh": 30.0, "renewables_TWh": 220.0},
                "CAN": {"country_name": "Canada", "carbon_intensity": 130.0,
                 "total_TWh": 640.0, "fossil_TWh": 120.0, "coal_TWh": 35.0,
                 "gas_TWh": 70.0, "nuclear_TWh": 95.0, "renewables_TWh": 425.0},
                "GBR": {"country_name": "United Kingdom", "carbon_intensity": 230.0,
                 "total_TWh": 310.0, "fossil_TWh": 130.0, "coal_TWh": 5.0,
                 "gas_TWh": 110.0, "nuclear_TWh": 45.0, "renewables_TWh": 135.0}}"#,
        )
        .expect("countries");

        std::fs::write(
            dir.join("fuel_weights.json"),
            r#"{"coal": 995.0, "natural_gas": 743.0, "petroleum": 816.0,
                "solar": 48.0, "wind": 26.0, "hydroelectricity": 26.0,
                "nuclear": 29.0, "geothermal": 38.0, "biomass": 230.0,
                "world_average": 475.0}"#,
        )
        .expect("weights");

        std::fs::write(
            dir.join("data_centers.json"),
            r#"{"dc-qc": {"provider": "gcp", "zoneKey": "CA-QC", "lonlat": [-71.3, 46.8]}}"#,
        )
        .expect("dcs");

        std::fs::write(
            dir.join("zones.json"),
            r#"{"CA-QC": {
                  "center": [-71.2, 52.9],
                  "powerOriginRatios": {"hydro": 1.0},
                  "emissionFactors": {"hydro": 38.0},
                  "capacity": {"hydro": 37000, "wind": 4000, "coal": 0}
                },
                "DE": {
                  "center": [10.0, 51.0],
                  "powerOriginRatios": {"coal": 0.3, "gas": 0.4, "hydro": 0.3},
                  "capacity": {"coal": 38000, "gas": 30000, "hydro": 5000, "wind": 60000}
                }}"#,
        )
        .expect("zones");

        std::fs::write(
            dir.join("world.geojson"),
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"zoneName": "CA-QC"},
                 "geometry": {"type": "Polygon",
                   "coordinates": [[[-75,44],[-65,44],[-65,54],[-75,54],[-75,44]]]}},
                {"type": "Feature", "properties": {"zoneName": "DE"},
                 "geometry": {"type": "Polygon",
                   "coordinates": [[[5,47],[15,47],[15,55],[5,55],[5,47]]]}}
            ]}"#,
        )
        .expect("geojson");

        if let Some(model) = model_json {
            std::fs::write(dir.join("trained_model.json"), model).expect("model");
        }

        let options = EngineOptions {
            disable_live: true,
            ..EngineOptions::default()
        };
        Engine::init(DataPaths::from_root(&dir), options).expect("engine init")
    }

    /// Fixture with no assets, zones, or countries at all.
    fn empty_fixture(tag: &str) -> Engine {
        let dir = std::env::temp_dir().join(format!("gridscore_engine_{tag}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir");

        std::fs::write(dir.join("power_assets.csv"), POWER_HEADER).expect("power csv");
        std::fs::write(
            dir.join("clean_assets.csv"),
            "name,country,primary_fuel,capacity_mw,latitude,longitude\n",
        )
        .expect("clean csv");
        std::fs::write(dir.join("coal_mining.csv"), POWER_HEADER).expect("fossil csv");
        std::fs::write(dir.join("country_profiles.json"), "{}").expect("countries");
        std::fs::write(dir.join("fuel_weights.json"), r#"{"world_average": 475.0}"#)
            .expect("weights");
        std::fs::write(dir.join("data_centers.json"), "{}").expect("dcs");
        std::fs::write(dir.join("zones.json"), "{}").expect("zones");
        std::fs::write(
            dir.join("world.geojson"),
            r#"{"type": "FeatureCollection", "features": []}"#,
        )
        .expect("geojson");

        let options = EngineOptions {
            disable_live: true,
            ..EngineOptions::default()
        };
        Engine::init(DataPaths::from_root(&dir), options).expect("engine init")
    }

    fn model_json() -> &'static str {
        r#"{"features": ["country_ci", "idw_weighted_ci", "local_pct_coal",
                         "zone_ci", "abs_lat"],
            "scaler_mean": [200.0, 200.0, 0.2, 200.0, 40.0],
            "scaler_scale": [100.0, 150.0, 0.2, 150.0, 20.0],
            "coefficients": [50.0, 30.0, 40.0, 60.0, 5.0],
            "intercept": 250.0,
            "training_metrics": {"r2": 0.87}}"#
    }

    #[test]
    fn hydro_zone_bypasses_model_with_exact_baseline() {
        let engine = fixture("clean_zone", Some(model_json()));
        let site = engine
            .predict_with_live(46.8, -71.2, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        assert!((site.intensity - 38.0).abs() < f64::EPSILON);
        assert_eq!(site.breakdown.source, IntensitySource::CleanZone);
        assert_eq!(site.grade, footprint::Grade::A);
        assert_eq!(site.zone.as_deref(), Some("CA-QC"));
        assert_eq!(site.country_iso3.as_deref(), Some("CAN"));
        assert!(!site.resolution_gap);
    }

    #[test]
    fn dirty_zone_without_model_degrades_to_flagged_baseline() {
        let engine = fixture("no_model", None);
        let site = engine
            .predict_with_live(50.2, 8.2, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        assert_eq!(site.breakdown.source, IntensitySource::Baseline);
        assert!(!site.breakdown.model_available);
        // DE zone mix: 0.3×995 + 0.4×490 + 0.3×26.
        assert!((site.intensity - 502.3).abs() < 1e-9);
        assert_eq!(site.zone.as_deref(), Some("DE"));
    }

    #[test]
    fn intensity_is_never_negative() {
        let engine = fixture("nonneg", Some(model_json()));
        for &(lat, lon) in &[(46.8, -71.2), (50.2, 8.2), (51.5, -0.1), (0.0, 0.0)] {
            let site = engine
                .predict_with_live(lat, lon, DEFAULT_RADIUS_KM, None, None)
                .expect("predict");
            assert!(site.intensity >= 0.0);
        }
    }

    #[test]
    fn live_reading_overrides_only_the_designated_country() {
        let engine = fixture("live", None);
        let reading = live::LiveReading {
            forecast: Some(123.0),
            actual: Some(119.0),
            index: Some("moderate".to_string()),
        };

        let gb = engine
            .predict_with_live(51.5, -0.1, DEFAULT_RADIUS_KM, None, Some(reading.clone()))
            .expect("predict");
        assert_eq!(gb.breakdown.source, IntensitySource::LiveFeed);
        assert!((gb.intensity - 123.0).abs() < f64::EPSILON);
        assert_eq!(gb.live_override, Some(reading.clone()));

        let de = engine
            .predict_with_live(50.2, 8.2, DEFAULT_RADIUS_KM, None, Some(reading))
            .expect("predict");
        assert_ne!(de.breakdown.source, IntensitySource::LiveFeed);
        assert_eq!(de.live_override, None);
    }

    #[test]
    fn empty_universe_returns_world_default_with_gap_flag() {
        let engine = empty_fixture("empty");
        let site = engine
            .predict_with_live(48.0, 2.0, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        assert!((site.intensity - 475.0).abs() < f64::EPSILON);
        assert!(site.resolution_gap);
        assert_eq!(site.country, None);
        assert_eq!(site.zone, None);
        assert_eq!(site.local_context.power_assets_in_radius, 0);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let engine = fixture("coords", None);
        for (lat, lon) in [(91.0, 0.0), (0.0, 181.0), (f64::NAN, 0.0), (0.0, f64::NEG_INFINITY)] {
            assert!(matches!(
                engine.predict_with_live(lat, lon, DEFAULT_RADIUS_KM, None, None),
                Err(EngineError::InvalidCoordinates { .. })
            ));
        }
    }

    #[test]
    fn batch_matches_scalar_for_present_and_future_years() {
        let engine = fixture("batch_eq", Some(model_json()));
        let lats = [46.8, 50.2, 51.5];
        let lons = [-71.2, 8.2, -0.1];

        for year in [None, Some(engine.power.trend_horizon + 5)] {
            let batch = engine.evaluate(&lats, &lons, year, 50.0).expect("batch");
            for i in 0..lats.len() {
                let scalar = engine
                    .predict_with_live(lats[i], lons[i], DEFAULT_RADIUS_KM, year, None)
                    .expect("predict");
                assert!(
                    (batch.intensity[i] - scalar.intensity).abs() < 1e-9,
                    "point {i} year {year:?}: batch {} vs scalar {}",
                    batch.intensity[i],
                    scalar.intensity
                );
                assert!(
                    (batch.trend[i] - scalar.projection.local_trend_b).abs() < 1e-12
                );
            }
        }
    }

    #[test]
    fn declining_coal_asset_sheds_idw_influence_when_projected() {
        // Model reduced to the IDW feature alone so the final intensity
        // tracks it directly.
        let idw_model = r#"{"features": ["idw_weighted_ci"],
            "scaler_mean": [0.0], "scaler_scale": [1.0],
            "coefficients": [1.0], "intercept": 0.0}"#;
        let engine = fixture("idw_proj", Some(idw_model));

        // Near the German coal plant (declining history) and the small
        // hydro plant; outside no clean zone fires (DE mix is dirty).
        let now = engine
            .predict_with_live(50.05, 8.05, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        let later = engine
            .predict_with_live(
                50.05,
                8.05,
                DEFAULT_RADIUS_KM,
                Some(engine.power.trend_horizon + 5),
                None,
            )
            .expect("predict");
        assert!(
            later.intensity < now.intensity,
            "projected {} should undercut current {}",
            later.intensity,
            now.intensity
        );
    }

    #[test]
    fn widening_the_radius_never_drops_assets() {
        let engine = fixture("radius", None);
        let mut previous = 0;
        for radius_km in [50.0, 150.0, 300.0, 1000.0] {
            let site = engine
                .predict_with_live(50.2, 8.2, radius_km, None, None)
                .expect("predict");
            assert!(site.local_context.power_assets_in_radius >= previous);
            previous = site.local_context.power_assets_in_radius;
        }
    }

    #[test]
    fn identical_queries_return_bit_identical_output() {
        let engine = fixture("idempotent", Some(model_json()));
        let first = engine
            .predict_with_live(50.2, 8.2, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        let second = engine
            .predict_with_live(50.2, 8.2, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        let a = serde_json::to_string(&first).expect("serialize");
        let b = serde_json::to_string(&second).expect("serialize");
        assert_eq!(a, b);
    }

    #[test]
    fn batch_trend_coefficients_respect_the_physical_clamp() {
        let engine = fixture("clamp", None);
        let lats = [46.8, 50.2, 51.5, 50.05];
        let lons = [-71.2, 8.2, -0.1, 8.05];
        let batch = engine.evaluate(&lats, &lons, None, 50.0).expect("batch");
        for trend in &batch.trend {
            assert!(trend.abs() <= gridscore_trends::MAX_TREND + 1e-12);
        }
    }

    #[test]
    fn footprint_composes_pue_intensity_and_load() {
        let engine = fixture("footprint", None);
        let site = engine
            .predict_with_live(46.8, -71.2, DEFAULT_RADIUS_KM, None, None)
            .expect("predict");
        let footprint = engine.footprint_from_site(46.8, -71.2, 50.0, Some("gcp"), site);
        assert!((footprint.pue - 1.10).abs() < f64::EPSILON);
        // 50 MW × 1.10 × 38 g/kWh × 8.76.
        assert!((footprint.annual_tonnes - 50.0 * 1.10 * 38.0 * 8.76).abs() < 1e-6);
        assert!(footprint.equivalences.cars_equivalent > 0.0);
        assert_eq!(footprint.site.zone.as_deref(), Some("CA-QC"));
    }

    #[test]
    fn country_rankings_sort_cleanest_first() {
        let engine = fixture("rankings", None);
        let rankings = engine.country_rankings();
        assert_eq!(rankings.len(), 3);
        assert_eq!(rankings[0].iso3, "CAN");
        assert!(rankings[0].green_score >= rankings[1].green_score);
    }
}
