//! JSON reference-layer loading: country profiles, fuel weights, and the
//! data-center registry.
//!
//! These layers are small enough that no snapshot caching applies; they are
//! parsed directly at startup. Country profiles and fuel weights are
//! required sources; malformed data-center entries are skipped and counted.

use std::collections::BTreeMap;
use std::path::Path;

use gridscore_assets_models::{CountryProfile, DataCenter, FuelWeights};
use serde::Deserialize;

use crate::AssetError;

/// Loads the per-country baseline profile table.
///
/// The source maps ISO-3 codes to profile objects.
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] if the file does not exist, or a
/// JSON error if it cannot be parsed.
pub fn load_country_profiles(path: &Path) -> Result<BTreeMap<String, CountryProfile>, AssetError> {
    let raw = read_required(path)?;
    let profiles: BTreeMap<String, CountryProfile> = serde_json::from_str(&raw)?;
    log::info!("Loaded {} country profiles", profiles.len());
    Ok(profiles)
}

/// Loads the per-fuel carbon-intensity reference table.
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] if the file does not exist, or a
/// JSON error if it cannot be parsed.
pub fn load_fuel_weights(path: &Path) -> Result<FuelWeights, AssetError> {
    let raw = read_required(path)?;
    let weights: FuelWeights = serde_json::from_str(&raw)?;
    log::info!("Loaded {} fuel weights", weights.weights.len());
    Ok(weights)
}

#[derive(Debug, Deserialize)]
struct RawDataCenter {
    #[serde(default)]
    provider: Option<String>,
    #[serde(rename = "zoneKey", default)]
    zone_key: Option<String>,
    /// `[lon, lat]` pair; entries without one are skipped.
    #[serde(default)]
    lonlat: Option<[f64; 2]>,
}

/// Loads the data-center registry.
///
/// Entries without coordinates are skipped and counted.
///
/// # Errors
///
/// Returns [`AssetError::MissingSource`] if the file does not exist, or a
/// JSON error if it cannot be parsed.
pub fn load_data_centers(path: &Path) -> Result<Vec<DataCenter>, AssetError> {
    let raw = read_required(path)?;
    let entries: BTreeMap<String, RawDataCenter> = serde_json::from_str(&raw)?;

    let mut centers = Vec::new();
    let mut skipped = 0u64;
    for (id, entry) in entries {
        let Some([lon, lat]) = entry.lonlat else {
            skipped += 1;
            continue;
        };
        centers.push(DataCenter {
            id,
            provider: entry.provider.unwrap_or_else(|| "unknown".to_string()),
            zone_key: entry.zone_key.unwrap_or_else(|| "unknown".to_string()),
            lat,
            lon,
        });
    }
    log::info!(
        "Loaded {} data centers ({skipped} without coordinates)",
        centers.len()
    );
    Ok(centers)
}

fn read_required(path: &Path) -> Result<String, AssetError> {
    if !path.exists() {
        return Err(AssetError::MissingSource {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("gridscore_reference_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(tag);
        std::fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn parses_country_profiles() {
        let path = temp_file(
            "countries.json",
            r#"{"DEU": {"country_name": "Germany", "carbon_intensity": 381.0,
                 "total_TWh": 500.0, "fossil_TWh": 250.0, "coal_TWh": 120.0,
                 "gas_TWh": 80.0, "nuclear_TWh": 30.0, "renewables_TWh": 220.0}}"#,
        );
        let profiles = load_country_profiles(&path).expect("load");
        let germany = profiles.get("DEU").expect("DEU");
        assert_eq!(germany.name, "Germany");
        let mix = germany.mix_fractions();
        assert!((mix.fossil - 0.5).abs() < 1e-9);
        assert!((mix.clean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn data_center_entries_without_coordinates_are_skipped() {
        let path = temp_file(
            "dcs.json",
            r#"{"dc-1": {"provider": "gcp", "zoneKey": "IE", "lonlat": [-6.3, 53.3]},
                "dc-2": {"provider": "aws"}}"#,
        );
        let centers = load_data_centers(&path).expect("load");
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].provider, "gcp");
        assert!((centers[0].lat - 53.3).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_reference_source_is_fatal() {
        let missing = Path::new("/nonexistent-gridscore/countries.json");
        assert!(matches!(
            load_country_profiles(missing),
            Err(AssetError::MissingSource { .. })
        ));
    }
}
