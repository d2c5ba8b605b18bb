//! Fuel type classification.
//!
//! Maps raw source-specific fuel labels to the canonical [`FuelCategory`]
//! taxonomy. Each dataset has different naming conventions (e.g.
//! `"coal - subcritical"`, `"CCGT"`, `"Wave and Tidal"`), so we use
//! case-insensitive keyword detection to classify.

use gridscore_assets_models::FuelCategory;

/// Maps a raw fuel label from any source to the canonical category.
///
/// Keyword-based and case-insensitive. Biomass and anything unrecognized
/// map to [`FuelCategory::Fossil`] — the conservative default for thermal
/// generation of unknown provenance.
#[must_use]
pub fn classify_fuel(raw: &str) -> FuelCategory {
    let lower = raw.to_lowercase();

    if lower.contains("coal") {
        return FuelCategory::Coal;
    }
    if contains_any(&lower, &["gas", "ccgt", "ocgt"]) {
        return FuelCategory::NaturalGas;
    }
    if contains_any(&lower, &["oil", "petrol", "diesel", "petroleum"]) {
        return FuelCategory::Petroleum;
    }
    if contains_any(&lower, &["solar", "pv"]) {
        return FuelCategory::Solar;
    }
    if lower.contains("wind") {
        return FuelCategory::Wind;
    }
    if contains_any(&lower, &["hydro", "water", "wave", "tidal"]) {
        return FuelCategory::Hydro;
    }
    if lower.contains("nuclear") {
        return FuelCategory::Nuclear;
    }
    if lower.contains("geotherm") {
        return FuelCategory::Geothermal;
    }
    if contains_any(&lower, &["biomass", "bio"]) {
        return FuelCategory::Fossil;
    }

    FuelCategory::Fossil
}

/// Checks if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_emitting_plant_types() {
        assert_eq!(classify_fuel("coal - subcritical"), FuelCategory::Coal);
        assert_eq!(classify_fuel("coal - supercritical"), FuelCategory::Coal);
        assert_eq!(classify_fuel("CCGT"), FuelCategory::NaturalGas);
        assert_eq!(classify_fuel("OCGT"), FuelCategory::NaturalGas);
        assert_eq!(classify_fuel("natural gas"), FuelCategory::NaturalGas);
        assert_eq!(classify_fuel("Oil"), FuelCategory::Petroleum);
        assert_eq!(classify_fuel("diesel engine"), FuelCategory::Petroleum);
        assert_eq!(classify_fuel("petroleum products"), FuelCategory::Petroleum);
    }

    #[test]
    fn maps_clean_plant_types() {
        assert_eq!(classify_fuel("Solar"), FuelCategory::Solar);
        assert_eq!(classify_fuel("solar PV"), FuelCategory::Solar);
        assert_eq!(classify_fuel("Wind"), FuelCategory::Wind);
        assert_eq!(classify_fuel("Hydro"), FuelCategory::Hydro);
        assert_eq!(classify_fuel("run-of-water"), FuelCategory::Hydro);
        assert_eq!(classify_fuel("Wave and Tidal"), FuelCategory::Hydro);
        assert_eq!(classify_fuel("Nuclear"), FuelCategory::Nuclear);
        assert_eq!(classify_fuel("geothermal"), FuelCategory::Geothermal);
    }

    #[test]
    fn biomass_and_unknown_are_conservative() {
        assert_eq!(classify_fuel("biomass"), FuelCategory::Fossil);
        assert_eq!(classify_fuel("bioenergy"), FuelCategory::Fossil);
        assert_eq!(classify_fuel("other"), FuelCategory::Fossil);
        assert_eq!(classify_fuel(""), FuelCategory::Fossil);
    }

    #[test]
    fn coal_takes_precedence_over_gas_keywords() {
        // "coal gasification" mentions gas but is a coal asset.
        assert_eq!(classify_fuel("coal gasification"), FuelCategory::Coal);
    }
}
