#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Grid zone layer loading.
//!
//! A zone is an electrically-interconnected region with its own generation
//! mix, distinct from country boundaries. This crate loads two zone
//! sources: the zone config (generation-mix ratios, per-fuel emission
//! factors, installed capacity by fuel, centroid) and the zone boundary
//! `GeoJSON` used for point-in-polygon resolution.
//!
//! Each zone's estimated carbon intensity is derived from its mix ratios:
//! `Σ ratio × emission_factor(fuel)`, preferring zone-declared direct
//! emission factors over the per-fuel defaults. Derived zone stats are
//! snapshot-cached keyed by the config's modification time; boundary
//! geometry re-parses at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use geojson::GeoJson;
use gridscore_assets::cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot layer name for derived zone stats.
const STATS_LAYER: &str = "zone_stats";

/// Default emission factors by zone-config fuel name, gCO₂/kWh.
///
/// Used when a zone declares a mix ratio for a fuel without a direct
/// emission factor of its own.
const FUEL_EF_DEFAULTS: &[(&str, f64)] = &[
    ("coal", 995.0),
    ("gas", 490.0),
    ("oil", 816.0),
    ("biomass", 230.0),
    ("nuclear", 29.0),
    ("hydro", 26.0),
    ("wind", 26.0),
    ("solar", 48.0),
    ("geothermal", 38.0),
    ("unknown", 475.0),
    ("hydro discharge", 26.0),
    ("battery discharge", 200.0),
];

/// Emission factor assumed for mix fuels absent from the default table.
const UNKNOWN_FUEL_EF: f64 = 475.0;

/// Zone-config fuel names counted as zero-emission capacity.
const CLEAN_CAPACITY_FUELS: &[&str] = &[
    "solar",
    "wind",
    "hydro",
    "nuclear",
    "geothermal",
    "hydro storage",
];

/// Zone-config fuel names counted as fossil capacity.
const FOSSIL_CAPACITY_FUELS: &[&str] = &["coal", "gas", "oil"];

/// Errors from zone layer loading.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// A required source file is missing or unreadable.
    #[error("Missing required source: {path}")]
    MissingSource {
        /// Path that could not be read.
        path: PathBuf,
    },

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Boundary geometry could not be interpreted.
    #[error("Geometry error: {message}")]
    Geometry {
        /// Description of what went wrong.
        message: String,
    },
}

/// Derived per-zone statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneStats {
    /// Zone key (e.g. `"CA-QC"`).
    pub key: String,
    /// Mix-derived carbon intensity estimate, gCO₂/kWh.
    pub ci: Option<f64>,
    /// Zero-emission share of installed capacity.
    pub clean_cap_frac: Option<f64>,
    /// Fossil share of installed capacity.
    pub fossil_cap_frac: Option<f64>,
    /// Installed coal capacity, MW.
    pub coal_cap_mw: f64,
    /// Centroid latitude, degrees.
    pub center_lat: Option<f64>,
    /// Centroid longitude, degrees.
    pub center_lon: Option<f64>,
}

/// One zone boundary polygon.
#[derive(Debug, Clone)]
pub struct ZoneBoundary {
    /// Zone key the polygon is tagged with.
    pub key: String,
    /// Boundary geometry. Polygons are neither disjoint nor exhaustive;
    /// coastline points may fall in none.
    pub polygon: MultiPolygon<f64>,
}

/// Result of loading the zone-config layer.
#[derive(Debug)]
pub struct ZoneStatsLoad {
    /// Derived stats, one per configured zone, in key order.
    pub stats: Vec<ZoneStats>,
    /// Whether this load was served from an up-to-date snapshot.
    pub from_cache: bool,
}

#[derive(Debug, Deserialize)]
struct RawZoneConfig {
    /// `[lon, lat]` centroid.
    #[serde(default)]
    center: Option<[f64; 2]>,
    /// `[[lon, lat], [lon, lat]]` fallback when no centroid is declared.
    #[serde(default)]
    bounding_box: Option<[[f64; 2]; 2]>,
    #[serde(rename = "powerOriginRatios", default)]
    power_origin_ratios: BTreeMap<String, f64>,
    #[serde(rename = "emissionFactors", default)]
    emission_factors: BTreeMap<String, f64>,
    #[serde(default)]
    capacity: BTreeMap<String, f64>,
}

fn default_ef(fuel: &str) -> f64 {
    FUEL_EF_DEFAULTS
        .iter()
        .find(|(name, _)| *name == fuel)
        .map_or(UNKNOWN_FUEL_EF, |(_, ef)| *ef)
}

fn derive_stats(key: &str, config: &RawZoneConfig) -> ZoneStats {
    let mut ci = 0.0;
    for (fuel, ratio) in &config.power_origin_ratios {
        if *ratio <= 0.0 {
            continue;
        }
        let ef = config
            .emission_factors
            .get(fuel)
            .copied()
            .unwrap_or_else(|| default_ef(fuel));
        ci += ratio * ef;
    }

    let total_mw: f64 = config.capacity.values().sum();
    let (clean_cap_frac, fossil_cap_frac) = if total_mw > 0.0 {
        let clean: f64 = CLEAN_CAPACITY_FUELS
            .iter()
            .filter_map(|fuel| config.capacity.get(*fuel))
            .sum();
        let fossil: f64 = FOSSIL_CAPACITY_FUELS
            .iter()
            .filter_map(|fuel| config.capacity.get(*fuel))
            .sum();
        (Some(clean / total_mw), Some(fossil / total_mw))
    } else {
        (None, None)
    };

    let center = config.center.or_else(|| {
        config.bounding_box.map(|[[lon_a, lat_a], [lon_b, lat_b]]| {
            [(lon_a + lon_b) / 2.0, (lat_a + lat_b) / 2.0]
        })
    });

    ZoneStats {
        key: key.to_string(),
        ci: (ci > 0.0).then_some(ci),
        clean_cap_frac,
        fossil_cap_frac,
        coal_cap_mw: config.capacity.get("coal").copied().unwrap_or(0.0),
        center_lat: center.map(|[_, lat]| lat),
        center_lon: center.map(|[lon, _]| lon),
    }
}

/// Loads the zone-config layer and derives per-zone stats, honoring an
/// up-to-date snapshot.
///
/// # Errors
///
/// Returns [`ZoneError::MissingSource`] if the config file does not exist,
/// or a JSON error if it cannot be parsed.
pub fn load_zone_stats(path: &Path, cache_dir: &Path) -> Result<ZoneStatsLoad, ZoneError> {
    if !path.exists() {
        return Err(ZoneError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let source_key = cache::source_mtime(path);
    let snapshot_path = cache::snapshot_path(cache_dir, STATS_LAYER);
    if let Some(stats) = cache::load_snapshot::<Vec<ZoneStats>>(&snapshot_path, source_key) {
        log::info!("Loaded {} zone stats from snapshot", stats.len());
        return Ok(ZoneStatsLoad {
            stats,
            from_cache: true,
        });
    }

    let raw = std::fs::read_to_string(path)?;
    let configs: BTreeMap<String, RawZoneConfig> = serde_json::from_str(&raw)?;

    let stats: Vec<ZoneStats> = configs
        .iter()
        .map(|(key, config)| derive_stats(key, config))
        .collect();

    let with_ci = stats.iter().filter(|s| s.ci.is_some()).count();
    let with_capacity = stats.iter().filter(|s| s.clean_cap_frac.is_some()).count();
    log::info!(
        "Loaded {} zones ({with_ci} with mix-derived intensity, {with_capacity} with capacity data)",
        stats.len()
    );

    cache::store_snapshot(&snapshot_path, source_key, &stats);
    Ok(ZoneStatsLoad {
        stats,
        from_cache: false,
    })
}

/// Loads zone boundary polygons from a `GeoJSON` feature collection.
///
/// Features must carry a `zoneName` property; features with missing keys or
/// non-polygonal geometry are skipped with a warning.
///
/// # Errors
///
/// Returns [`ZoneError::MissingSource`] if the file does not exist, or
/// [`ZoneError::Geometry`] if the `GeoJSON` cannot be parsed at all.
pub fn load_zone_boundaries(path: &Path) -> Result<Vec<ZoneBoundary>, ZoneError> {
    if !path.exists() {
        return Err(ZoneError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path)?;
    let geojson: GeoJson = raw.parse().map_err(|e| ZoneError::Geometry {
        message: format!("Failed to parse boundary GeoJSON: {e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(ZoneError::Geometry {
            message: "Boundary GeoJSON is not a FeatureCollection".to_string(),
        });
    };

    let mut boundaries = Vec::new();
    let mut skipped = 0u64;
    for feature in collection.features {
        let Some(key) = feature
            .properties
            .as_ref()
            .and_then(|props| props.get("zoneName"))
            .and_then(serde_json::Value::as_str)
        else {
            skipped += 1;
            continue;
        };
        let Some(polygon) = feature
            .geometry
            .and_then(|geometry| to_multipolygon(&geometry))
        else {
            log::warn!("Zone {key}: boundary geometry is not polygonal, skipping");
            skipped += 1;
            continue;
        };
        boundaries.push(ZoneBoundary {
            key: key.to_string(),
            polygon,
        });
    }

    log::info!(
        "Loaded {} zone boundary polygons ({skipped} features skipped)",
        boundaries.len()
    );
    Ok(boundaries)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: &geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gridscore_zones_{tag}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn derives_mix_weighted_intensity() {
        let dir = temp_dir("stats");
        let path = dir.join("zones.json");
        std::fs::write(
            &path,
            r#"{"CA-QC": {
                "center": [-71.2, 52.9],
                "powerOriginRatios": {"hydro": 0.95, "wind": 0.05},
                "capacity": {"hydro": 37000, "wind": 4000, "coal": 0}
            }}"#,
        )
        .expect("write");

        let load = load_zone_stats(&path, &dir.join("cache")).expect("load");
        assert_eq!(load.stats.len(), 1);
        let zone = &load.stats[0];
        assert_eq!(zone.key, "CA-QC");
        // 0.95 × 26 + 0.05 × 26 = 26.
        assert!((zone.ci.expect("ci") - 26.0).abs() < 1e-9);
        assert!((zone.clean_cap_frac.expect("clean") - 1.0).abs() < 1e-9);
        assert!((zone.coal_cap_mw - 0.0).abs() < f64::EPSILON);
        assert!((zone.center_lat.expect("lat") - 52.9).abs() < f64::EPSILON);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn direct_emission_factors_override_defaults() {
        let dir = temp_dir("ef");
        let path = dir.join("zones.json");
        std::fs::write(
            &path,
            r#"{"ZZ": {
                "powerOriginRatios": {"gas": 1.0},
                "emissionFactors": {"gas": 400.0}
            }}"#,
        )
        .expect("write");

        let load = load_zone_stats(&path, &dir.join("cache")).expect("load");
        assert!((load.stats[0].ci.expect("ci") - 400.0).abs() < 1e-9);
        // No capacity data declared.
        assert!(load.stats[0].clean_cap_frac.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_boundary_feature_collection() {
        let dir = temp_dir("boundaries");
        let path = dir.join("world.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "properties": {"zoneName": "ZZ"},
                 "geometry": {"type": "Polygon",
                   "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [1, 1]}}
            ]}"#,
        )
        .expect("write");

        let boundaries = load_zone_boundaries(&path).expect("load");
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].key, "ZZ");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_zone_source_is_fatal() {
        let missing = Path::new("/nonexistent-gridscore/zones.json");
        assert!(matches!(
            load_zone_stats(missing, Path::new("/tmp")),
            Err(ZoneError::MissingSource { .. })
        ));
    }
}
