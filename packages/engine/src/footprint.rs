//! Site grading and data-center footprint arithmetic.
//!
//! Annual CO₂ (tonnes) = IT load (MW) × PUE × CI (gCO₂/kWh) × 8760 h ×
//! 10⁻⁶ (g→t), i.e. `MW × PUE × CI × 8.76`. PUE comes from published
//! provider figures when known, otherwise from a latitude estimate (colder
//! regions get more free-air cooling).

use serde::{Deserialize, Serialize};

/// Hours per year × unit conversion folded into one factor.
pub const TONNES_FACTOR: f64 = 8.76;

/// Published PUE by provider (sustainability reports).
const PROVIDER_PUE: &[(&str, f64)] = &[
    ("gcp", 1.10),
    ("azure", 1.18),
    ("aws", 1.20),
    ("meta", 1.10),
    ("ovh", 1.30),
    ("hlrs", 1.40),
    ("itenos", 1.40),
];

/// Global average PUE (Uptime Institute 2023).
const BASE_PUE: f64 = 1.58;

/// Average car emissions, tonnes CO₂ per year.
const EQUIV_CAR_TONNES_PER_YEAR: f64 = 4.6;

/// One-way transatlantic flight, kg CO₂ per passenger.
const EQUIV_FLIGHT_KG: f64 = 900.0;

/// CO₂ absorbed by one tree, kg per year.
const EQUIV_TREE_KG_PER_YEAR: f64 = 22.0;

/// Average EU home, tonnes CO₂ per year.
const EQUIV_HOME_TONNES_PER_YEAR: f64 = 7.5;

/// Best plausible footprint per MW (low-CI grid, efficient cooling).
const BEST_TONNES_PER_MW: f64 = 270.0;

/// Worst realistic footprint per MW (coal-heavy grid, poor cooling).
const WORST_TONNES_PER_MW: f64 = 12600.0;

/// Letter grade derived from a 0-100 green score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// Score ≥ 85.
    A,
    /// Score ≥ 70.
    B,
    /// Score ≥ 55.
    C,
    /// Score ≥ 40.
    D,
    /// Score ≥ 25.
    E,
    /// Everything below.
    F,
}

impl Grade {
    /// Grades a 0-100 green score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::A
        } else if score >= 70.0 {
            Self::B
        } else if score >= 55.0 {
            Self::C
        } else if score >= 40.0 {
            Self::D
        } else if score >= 25.0 {
            Self::E
        } else {
            Self::F
        }
    }
}

/// Green score for a grid intensity: 100 at 0 gCO₂/kWh, 0 at 900.
#[must_use]
pub fn green_score(intensity: f64) -> f64 {
    (100.0 - intensity / 9.0).clamp(0.0, 100.0)
}

/// Green score for a per-MW annual footprint, normalized between the best
/// and worst plausible sites.
#[must_use]
pub fn footprint_green_score(tonnes_per_mw: f64) -> f64 {
    (100.0 * (1.0 - (tonnes_per_mw - BEST_TONNES_PER_MW) / (WORST_TONNES_PER_MW - BEST_TONNES_PER_MW)))
        .clamp(0.0, 100.0)
}

/// Estimates PUE for a site.
///
/// Known providers use their published figure; otherwise every 10° of
/// latitude from the equator saves ≈0.03 PUE off the global average,
/// bounded to [1.05, 1.80].
#[must_use]
pub fn estimate_pue(lat: f64, provider: Option<&str>) -> f64 {
    if let Some(provider) = provider {
        let lower = provider.to_lowercase();
        if let Some((_, pue)) = PROVIDER_PUE.iter().find(|(name, _)| *name == lower) {
            return *pue;
        }
    }
    let latitude_bonus = (lat.abs() * 0.003).min(0.20);
    let estimated = (BASE_PUE - latitude_bonus).clamp(1.05, 1.80);
    (estimated * 100.0).round() / 100.0
}

/// Annual footprint in tonnes CO₂ for an IT load at a grid intensity.
#[must_use]
pub fn annual_tonnes(it_load_mw: f64, pue: f64, intensity: f64) -> f64 {
    it_load_mw * pue * intensity * TONNES_FACTOR
}

/// Relatable equivalences for an annual footprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equivalences {
    /// Average cars driven for a year.
    pub cars_equivalent: f64,
    /// One-way transatlantic passenger flights.
    pub flights_transatlantic: f64,
    /// Trees needed to absorb it in a year.
    pub trees_to_offset: f64,
    /// Average EU homes for a year.
    pub eu_homes_equivalent: f64,
}

impl Equivalences {
    /// Derives equivalences from an annual footprint in tonnes.
    #[must_use]
    pub fn from_tonnes(tonnes: f64) -> Self {
        Self {
            cars_equivalent: (tonnes / EQUIV_CAR_TONNES_PER_YEAR).round(),
            flights_transatlantic: (tonnes * 1000.0 / EQUIV_FLIGHT_KG).round(),
            trees_to_offset: (tonnes * 1000.0 / EQUIV_TREE_KG_PER_YEAR).round(),
            eu_homes_equivalent: (tonnes / EQUIV_HOME_TONNES_PER_YEAR).round(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_pue_beats_latitude_estimate() {
        assert!((estimate_pue(0.0, Some("GCP")) - 1.10).abs() < f64::EPSILON);
        assert!((estimate_pue(60.0, Some("aws")) - 1.20).abs() < f64::EPSILON);
    }

    #[test]
    fn latitude_estimate_stays_in_bounds() {
        // Equator: no bonus, the global average applies.
        assert!((estimate_pue(0.0, None) - 1.58).abs() < 1e-9);
        // High latitude: bonus caps at 0.20.
        assert!((estimate_pue(80.0, None) - 1.38).abs() < 1e-9);
        for lat in [-90.0, -45.0, 0.0, 45.0, 90.0] {
            let pue = estimate_pue(lat, None);
            assert!((1.05..=1.80).contains(&pue));
        }
    }

    #[test]
    fn grades_follow_score_bands() {
        assert_eq!(Grade::from_score(95.0), Grade::A);
        assert_eq!(Grade::from_score(85.0), Grade::A);
        assert_eq!(Grade::from_score(70.0), Grade::B);
        assert_eq!(Grade::from_score(55.0), Grade::C);
        assert_eq!(Grade::from_score(40.0), Grade::D);
        assert_eq!(Grade::from_score(25.0), Grade::E);
        assert_eq!(Grade::from_score(10.0), Grade::F);
    }

    #[test]
    fn hydro_grid_scores_an_a() {
        // 38 gCO₂/kWh → score ≈ 95.8.
        let score = green_score(38.0);
        assert!(score > 85.0);
        assert_eq!(Grade::from_score(score), Grade::A);
    }

    #[test]
    fn footprint_formula_matches_hand_calculation() {
        // 10 MW × 1.2 PUE × 100 g/kWh × 8.76 = 10,512 t/yr.
        let tonnes = annual_tonnes(10.0, 1.2, 100.0);
        assert!((tonnes - 10512.0).abs() < 1e-9);

        let equiv = Equivalences::from_tonnes(tonnes);
        assert!((equiv.cars_equivalent - (10512.0f64 / 4.6).round()).abs() < f64::EPSILON);
    }
}
