//! Tabular asset loading and multi-year deduplication.
//!
//! Raw asset CSVs carry one row per asset per reporting period. Loading
//! reduces them to one row per asset id for the latest reporting year with
//! declared per-field reducers — sum for flow quantities (emissions,
//! generation), mean for rates (emission factor, capacity factor), first
//! for categorical and location fields — and fits emission trends on the
//! complete years in the same pass.
//!
//! The most recent reporting year is kept as the spatial baseline but is
//! excluded from trend fits: preliminary data shows up as a uniform
//! emissions drop that is missing data, not decarbonization.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Datelike;
use gridscore_assets_models::{
    AnnualEmissions, Asset, AssetTable, CleanAsset, FossilOp, FossilSector,
};
use gridscore_trends::{TrendRecord, fit_asset_trend, fit_country_trend};
use serde::{Deserialize, Serialize};

use crate::AssetError;
use crate::cache;
use crate::classify::classify_fuel;

/// Snapshot layer name for the emitting-asset table.
const POWER_LAYER: &str = "power_assets";

/// Snapshot layer name for the clean-plant registry.
const CLEAN_LAYER: &str = "clean_assets";

/// Snapshot layer name for fossil operations.
const FOSSIL_LAYER: &str = "fossil_ops";

/// Result of loading the emitting-asset layer.
#[derive(Debug)]
pub struct PowerLoad {
    /// Deduplicated asset table with fitted per-asset trends.
    pub table: AssetTable,
    /// Country-level emission trends fitted from the same source rows.
    pub country_trends: BTreeMap<String, TrendRecord>,
    /// Whether this load was served from an up-to-date snapshot.
    pub from_cache: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct PowerSnapshot {
    table: AssetTable,
    country_trends: BTreeMap<String, TrendRecord>,
}

/// Result of loading the clean-plant registry.
#[derive(Debug)]
pub struct CleanLoad {
    /// Zero-emission plants with coordinates and positive capacity.
    pub assets: Vec<CleanAsset>,
    /// Malformed or incomplete rows dropped.
    pub skipped: u64,
    /// Whether this load was served from an up-to-date snapshot.
    pub from_cache: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CleanSnapshot {
    assets: Vec<CleanAsset>,
    skipped: u64,
}

/// Result of loading the fossil-operations layer.
#[derive(Debug)]
pub struct FossilLoad {
    /// Deduplicated operations across all sector files that loaded.
    pub ops: Vec<FossilOp>,
    /// Malformed or incomplete rows dropped.
    pub skipped: u64,
    /// Whether this load was served from an up-to-date snapshot.
    pub from_cache: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FossilSnapshot {
    ops: Vec<FossilOp>,
    skipped: u64,
}

#[derive(Debug, Deserialize)]
struct RawPowerRow {
    source_name: String,
    source_type: Option<String>,
    iso3_country: Option<String>,
    start_time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    emissions_quantity: Option<f64>,
    capacity: Option<f64>,
    emissions_factor: Option<f64>,
    activity: Option<f64>,
    capacity_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCleanRow {
    name: String,
    country: Option<String>,
    primary_fuel: Option<String>,
    capacity_mw: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Extracts the reporting year from a timestamp field.
///
/// Accepts RFC 3339, `YYYY-MM-DD` prefixes, and bare years.
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.year());
    }
    if raw.len() >= 10
        && let Ok(date) = chrono::NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d")
    {
        return Some(date.year());
    }
    raw.get(..4)
        .and_then(|y| y.parse().ok())
        .filter(|y| (1900..=2100).contains(y))
}

struct ValidPowerRow {
    id: String,
    fuel_label: String,
    country: String,
    year: i32,
    lat: f64,
    lon: f64,
    emissions: f64,
    capacity: Option<f64>,
    emission_factor: Option<f64>,
    activity: Option<f64>,
    capacity_factor: Option<f64>,
}

/// Mean of the present values, or `None` when all are absent.
fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in values.flatten() {
        sum += value;
        count += 1;
    }
    (count > 0).then(|| sum / f64::from(count))
}

/// Sum of the present values, or `None` when all are absent.
fn sum_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut any = false;
    for value in values.flatten() {
        sum += value;
        any = true;
    }
    any.then_some(sum)
}

/// Loads the emitting-asset layer, honoring an up-to-date snapshot.
///
/// Rows missing coordinates, emissions, or a parseable reporting period are
/// skipped and counted. Only assets present in the latest reporting year
/// appear in the table; earlier-year rows still feed trend fitting and the
/// country-level series.
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] if the source file does not exist,
/// or a parse error if the CSV is structurally unreadable.
pub fn load_power_assets(path: &Path, cache_dir: &Path) -> Result<PowerLoad, AssetError> {
    if !path.exists() {
        return Err(AssetError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let source_key = cache::source_mtime(path);
    let snapshot_path = cache::snapshot_path(cache_dir, POWER_LAYER);
    if let Some(snap) = cache::load_snapshot::<PowerSnapshot>(&snapshot_path, source_key) {
        log::info!(
            "Loaded {} power assets from snapshot ({} country trends)",
            snap.table.assets.len(),
            snap.country_trends.len()
        );
        return Ok(PowerLoad {
            table: snap.table,
            country_trends: snap.country_trends,
            from_cache: true,
        });
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows: Vec<ValidPowerRow> = Vec::new();
    let mut skipped = 0u64;

    for result in reader.deserialize::<RawPowerRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let (Some(lat), Some(lon), Some(emissions)) = (raw.lat, raw.lon, raw.emissions_quantity)
        else {
            skipped += 1;
            continue;
        };
        let Some(year) = raw.start_time.as_deref().and_then(parse_year) else {
            skipped += 1;
            continue;
        };
        rows.push(ValidPowerRow {
            id: raw.source_name,
            fuel_label: raw.source_type.unwrap_or_default(),
            country: raw.iso3_country.unwrap_or_default(),
            year,
            lat,
            lon,
            emissions,
            capacity: raw.capacity,
            emission_factor: raw.emissions_factor,
            activity: raw.activity,
            capacity_factor: raw.capacity_factor,
        });
    }

    let latest_year = rows.iter().map(|r| r.year).max().unwrap_or(0);
    let trend_horizon = latest_year - 1;

    // Group by asset id; BTreeMap keeps output order deterministic.
    let mut by_id: BTreeMap<&str, Vec<&ValidPowerRow>> = BTreeMap::new();
    for row in &rows {
        by_id.entry(&row.id).or_default().push(row);
    }

    // Country-year emission sums over all valid rows, for country trends.
    let mut country_year: BTreeMap<(&str, i32), f64> = BTreeMap::new();
    for row in &rows {
        if !row.country.is_empty() {
            *country_year.entry((&row.country, row.year)).or_default() += row.emissions;
        }
    }

    let mut assets = Vec::new();
    for (id, asset_rows) in &by_id {
        let latest: Vec<&&ValidPowerRow> = asset_rows
            .iter()
            .filter(|r| r.year == latest_year)
            .collect();
        if latest.is_empty() {
            continue;
        }

        // Complete-year series for trend fitting.
        let mut series: BTreeMap<i32, f64> = BTreeMap::new();
        for row in asset_rows {
            if row.year <= trend_horizon {
                *series.entry(row.year).or_default() += row.emissions;
            }
        }
        let series: Vec<(i32, f64)> = series.into_iter().collect();
        let trend_b = fit_asset_trend(&series, trend_horizon);

        let first = latest[0];
        assets.push(Asset {
            id: (*id).to_string(),
            fuel: classify_fuel(&first.fuel_label),
            country: first.country.clone(),
            lat: first.lat,
            lon: first.lon,
            capacity_mw: first.capacity,
            emissions_t: latest.iter().map(|r| r.emissions).sum(),
            emission_factor: mean_of(latest.iter().map(|r| r.emission_factor)),
            generation_mwh: sum_of(latest.iter().map(|r| r.activity)),
            capacity_factor: mean_of(latest.iter().map(|r| r.capacity_factor)),
            history: series
                .into_iter()
                .map(|(year, emissions_t)| AnnualEmissions { year, emissions_t })
                .collect(),
            trend_b,
        });
    }

    let mut country_series: BTreeMap<&str, Vec<(i32, f64)>> = BTreeMap::new();
    for (&(country, year), &emissions) in &country_year {
        country_series
            .entry(country)
            .or_default()
            .push((year, emissions));
    }
    let mut country_trends = BTreeMap::new();
    for (country, series) in country_series {
        if let Some(record) = fit_country_trend(&series, trend_horizon, latest_year) {
            country_trends.insert(country.to_string(), record);
        }
    }

    log::info!(
        "Loaded {} power assets for year {latest_year} ({} rows skipped, {} country trends)",
        assets.len(),
        skipped,
        country_trends.len()
    );

    let table = AssetTable {
        assets,
        latest_year,
        trend_horizon,
        skipped,
    };
    let snap = PowerSnapshot {
        table,
        country_trends,
    };
    cache::store_snapshot(&snapshot_path, source_key, &snap);

    Ok(PowerLoad {
        table: snap.table,
        country_trends: snap.country_trends,
        from_cache: false,
    })
}

/// Loads the clean-plant registry, honoring an up-to-date snapshot.
///
/// Keeps only rows with coordinates, positive capacity, and a fuel label
/// that classifies as zero-emission; fossil rows in the registry are
/// filtered (not counted as malformed).
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] if the source file does not exist.
pub fn load_clean_assets(path: &Path, cache_dir: &Path) -> Result<CleanLoad, AssetError> {
    if !path.exists() {
        return Err(AssetError::MissingSource {
            path: path.to_path_buf(),
        });
    }

    let source_key = cache::source_mtime(path);
    let snapshot_path = cache::snapshot_path(cache_dir, CLEAN_LAYER);
    if let Some(snap) = cache::load_snapshot::<CleanSnapshot>(&snapshot_path, source_key) {
        log::info!("Loaded {} clean plants from snapshot", snap.assets.len());
        return Ok(CleanLoad {
            assets: snap.assets,
            skipped: snap.skipped,
            from_cache: true,
        });
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut assets = Vec::new();
    let mut skipped = 0u64;

    for result in reader.deserialize::<RawCleanRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let (Some(lat), Some(lon), Some(capacity_mw)) = (raw.latitude, raw.longitude, raw.capacity_mw)
        else {
            skipped += 1;
            continue;
        };
        if capacity_mw <= 0.0 {
            skipped += 1;
            continue;
        }
        let fuel = classify_fuel(raw.primary_fuel.as_deref().unwrap_or_default());
        if fuel.is_fossil() {
            continue;
        }
        assets.push(CleanAsset {
            name: raw.name,
            country: raw.country.unwrap_or_default(),
            fuel,
            capacity_mw,
            lat,
            lon,
        });
    }

    log::info!(
        "Loaded {} clean plants ({skipped} rows skipped)",
        assets.len()
    );

    let snap = CleanSnapshot { assets, skipped };
    cache::store_snapshot(&snapshot_path, source_key, &snap);

    Ok(CleanLoad {
        assets: snap.assets,
        skipped: snap.skipped,
        from_cache: false,
    })
}

/// Loads and concatenates the fossil-operation sector files, honoring an
/// up-to-date snapshot keyed over all sources.
///
/// A missing sector file degrades with a warning; only all sources missing
/// is fatal. Each file is reduced to the latest reporting year with one row
/// per operation (sum emissions, first everything else).
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] when none of the sector files
/// exist.
pub fn load_fossil_ops(
    sources: &[(&Path, FossilSector)],
    cache_dir: &Path,
) -> Result<FossilLoad, AssetError> {
    let paths: Vec<&Path> = sources.iter().map(|(path, _)| *path).collect();
    let source_key = cache::combined_key(&paths);
    let snapshot_path = cache::snapshot_path(cache_dir, FOSSIL_LAYER);
    if let Some(snap) = cache::load_snapshot::<FossilSnapshot>(&snapshot_path, source_key) {
        log::info!("Loaded {} fossil operations from snapshot", snap.ops.len());
        return Ok(FossilLoad {
            ops: snap.ops,
            skipped: snap.skipped,
            from_cache: true,
        });
    }

    let mut ops = Vec::new();
    let mut skipped = 0u64;
    let mut loaded_any = false;

    for &(path, sector) in sources {
        if !path.exists() {
            log::warn!("Fossil sector source missing: {}", path.display());
            continue;
        }
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let mut rows: Vec<(String, String, i32, f64, f64, f64)> = Vec::new();
        for result in reader.deserialize::<RawPowerRow>() {
            let raw = match result {
                Ok(raw) => raw,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let (Some(lat), Some(lon), Some(emissions)) =
                (raw.lat, raw.lon, raw.emissions_quantity)
            else {
                skipped += 1;
                continue;
            };
            let Some(year) = raw.start_time.as_deref().and_then(parse_year) else {
                skipped += 1;
                continue;
            };
            rows.push((
                raw.source_name,
                raw.iso3_country.unwrap_or_default(),
                year,
                lat,
                lon,
                emissions,
            ));
        }

        let latest = rows.iter().map(|r| r.2).max().unwrap_or(0);
        let mut by_id: BTreeMap<&str, (String, f64, f64, f64)> = BTreeMap::new();
        for (id, country, year, lat, lon, emissions) in &rows {
            if *year != latest {
                continue;
            }
            by_id
                .entry(id)
                .and_modify(|entry| entry.3 += emissions)
                .or_insert_with(|| (country.clone(), *lat, *lon, *emissions));
        }
        let count = by_id.len();
        for (id, (country, lat, lon, emissions_t)) in by_id {
            ops.push(FossilOp {
                id: id.to_string(),
                sector,
                country,
                lat,
                lon,
                emissions_t,
            });
        }
        loaded_any = true;
        log::info!("{sector}: {count} operations (year {latest})");
    }

    if !loaded_any {
        return Err(AssetError::MissingSource {
            path: paths.first().map(|p| p.to_path_buf()).unwrap_or_default(),
        });
    }

    log::info!(
        "Loaded {} fossil operations total ({skipped} rows skipped)",
        ops.len()
    );

    let snap = FossilSnapshot { ops, skipped };
    cache::store_snapshot(&snapshot_path, source_key, &snap);

    Ok(FossilLoad {
        ops: snap.ops,
        skipped: snap.skipped,
        from_cache: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridscore_assets_models::FuelCategory;

    const POWER_HEADER: &str = "source_name,source_type,iso3_country,start_time,lat,lon,emissions_quantity,capacity,emissions_factor,activity,capacity_factor\n";

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gridscore_loader_{tag}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    fn write_power_csv(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("power.csv");
        std::fs::write(&path, format!("{POWER_HEADER}{body}")).expect("write csv");
        path
    }

    #[test]
    fn dedupes_multi_year_rows_with_declared_reducers() {
        let dir = temp_dir("dedup");
        // Two 2024 reporting periods for plant-a: emissions sum, emission
        // factor means, capacity takes the first value.
        let path = write_power_csv(
            &dir,
            "plant-a,coal,DEU,2023-01-01,50.0,8.0,1000,400,0.9,1100,0.5\n\
             plant-a,coal,DEU,2024-01-01,50.0,8.0,600,400,0.8,700,0.4\n\
             plant-a,coal,DEU,2024-07-01,50.0,8.0,400,400,1.0,300,0.6\n",
        );
        let load = load_power_assets(&path, &dir.join("cache")).expect("load");
        assert_eq!(load.table.assets.len(), 1);
        assert_eq!(load.table.latest_year, 2024);
        assert_eq!(load.table.trend_horizon, 2023);

        let asset = &load.table.assets[0];
        assert_eq!(asset.id, "plant-a");
        assert_eq!(asset.fuel, FuelCategory::Coal);
        assert!((asset.emissions_t - 1000.0).abs() < 1e-9);
        assert_eq!(asset.generation_mwh, Some(1000.0));
        assert!((asset.emission_factor.expect("ef") - 0.9).abs() < 1e-9);
        assert!((asset.capacity_factor.expect("cf") - 0.5).abs() < 1e-9);
        assert_eq!(asset.capacity_mw, Some(400.0));
        // History carries complete years only.
        assert_eq!(asset.history.len(), 1);
        assert_eq!(asset.history[0].year, 2023);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drops_and_counts_rows_missing_required_fields() {
        let dir = temp_dir("skip");
        let path = write_power_csv(
            &dir,
            "plant-a,coal,DEU,2024-01-01,50.0,8.0,1000,400,,,\n\
             no-coords,coal,DEU,2024-01-01,,,1000,400,,,\n\
             no-emissions,coal,DEU,2024-01-01,50.0,8.0,,400,,,\n\
             bad-year,coal,DEU,not-a-date,50.0,8.0,1000,400,,,\n",
        );
        let load = load_power_assets(&path, &dir.join("cache")).expect("load");
        assert_eq!(load.table.assets.len(), 1);
        assert_eq!(load.table.skipped, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_source_is_fatal() {
        let dir = temp_dir("missing");
        let result = load_power_assets(&dir.join("absent.csv"), &dir.join("cache"));
        assert!(matches!(result, Err(AssetError::MissingSource { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unchanged_source_reuses_snapshot_and_touch_forces_rebuild() {
        let dir = temp_dir("cache");
        let cache_dir = dir.join("cache");
        let path = write_power_csv(
            &dir,
            "plant-a,coal,DEU,2024-01-01,50.0,8.0,1000,400,,,\n",
        );

        let first = load_power_assets(&path, &cache_dir).expect("load");
        assert!(!first.from_cache);

        let second = load_power_assets(&path, &cache_dir).expect("load");
        assert!(second.from_cache);
        assert_eq!(second.table.assets.len(), first.table.assets.len());

        // Bump the source mtime without changing content.
        let file = std::fs::File::options()
            .write(true)
            .open(&path)
            .expect("open");
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(10))
            .expect("set mtime");

        let third = load_power_assets(&path, &cache_dir).expect("load");
        assert!(!third.from_cache);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fossil_ops_degrade_on_missing_sector_but_not_all() {
        let dir = temp_dir("fossil");
        let present = dir.join("coal_mines.csv");
        std::fs::write(
            &present,
            format!(
                "{POWER_HEADER}mine-a,coal mine,POL,2024-01-01,51.0,19.0,500,,,,\n\
                 mine-a,coal mine,POL,2024-06-01,51.0,19.0,250,,,,\n"
            ),
        )
        .expect("write csv");
        let absent = dir.join("refineries.csv");

        let load = load_fossil_ops(
            &[
                (present.as_path(), FossilSector::CoalMining),
                (absent.as_path(), FossilSector::OilRefining),
            ],
            &dir.join("cache"),
        )
        .expect("load");
        assert_eq!(load.ops.len(), 1);
        assert!((load.ops[0].emissions_t - 750.0).abs() < 1e-9);

        let all_missing = load_fossil_ops(
            &[(absent.as_path(), FossilSector::OilRefining)],
            &dir.join("cache2"),
        );
        assert!(matches!(all_missing, Err(AssetError::MissingSource { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn clean_registry_filters_fossil_rows_without_counting_them() {
        let dir = temp_dir("clean");
        let path = dir.join("plants.csv");
        std::fs::write(
            &path,
            "name,country,primary_fuel,capacity_mw,latitude,longitude\n\
             dam-a,CAN,Hydro,1200,46.0,-72.0\n\
             tidal-a,GBR,Wave and Tidal,20,58.0,-3.0\n\
             gas-a,DEU,Gas,300,50.0,8.0\n\
             broken,,Solar,,,\n",
        )
        .expect("write csv");

        let load = load_clean_assets(&path, &dir.join("cache")).expect("load");
        assert_eq!(load.assets.len(), 2);
        assert_eq!(load.assets[0].fuel, FuelCategory::Hydro);
        assert_eq!(load.assets[1].fuel, FuelCategory::Hydro);
        assert_eq!(load.skipped, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
