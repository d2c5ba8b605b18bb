#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fuel taxonomy and asset record types.
//!
//! This crate defines the canonical fuel-category taxonomy used across the
//! entire gridscore system, plus the loaded forms of the point-asset,
//! country-profile, and fuel-weight data layers. All data sources normalize
//! their source-specific fuel labels into this shared taxonomy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Canonical fuel category for a power or industrial asset.
///
/// Raw source labels (e.g. `"coal - subcritical"`, `"CCGT"`, `"Wave and
/// Tidal"`) are normalized into this closed set. Biomass and unrecognized
/// thermal types collapse into [`FuelCategory::Fossil`], the conservative
/// default.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelCategory {
    /// Coal-fired generation.
    Coal,
    /// Natural gas (CCGT, OCGT, gas boilers).
    NaturalGas,
    /// Oil, diesel, and other petroleum-fired generation.
    Petroleum,
    /// Solar photovoltaic and thermal.
    Solar,
    /// Onshore and offshore wind.
    Wind,
    /// Hydroelectric, including wave and tidal.
    Hydro,
    /// Nuclear fission.
    Nuclear,
    /// Geothermal.
    Geothermal,
    /// Biomass and unclassified thermal generation.
    Fossil,
}

impl FuelCategory {
    /// All categories, in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Coal,
            Self::NaturalGas,
            Self::Petroleum,
            Self::Solar,
            Self::Wind,
            Self::Hydro,
            Self::Nuclear,
            Self::Geothermal,
            Self::Fossil,
        ]
    }

    /// Whether this category is an emitting (fossil) fuel.
    #[must_use]
    pub const fn is_fossil(self) -> bool {
        matches!(
            self,
            Self::Coal | Self::NaturalGas | Self::Petroleum | Self::Fossil
        )
    }

    /// Whether this category is a zero-emission fuel.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        !self.is_fossil()
    }

    /// The key used for this category in the fuel-weight reference table.
    #[must_use]
    pub const fn weight_key(self) -> &'static str {
        match self {
            Self::Coal => "coal",
            Self::NaturalGas => "natural_gas",
            Self::Petroleum => "petroleum",
            Self::Solar => "solar",
            Self::Wind => "wind",
            Self::Hydro => "hydroelectricity",
            Self::Nuclear => "nuclear",
            Self::Geothermal => "geothermal",
            Self::Fossil => "fossil",
        }
    }
}

/// One complete reporting year of an asset's emissions series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualEmissions {
    /// Calendar year of the reporting period.
    pub year: i32,
    /// Total emissions for that year, tonnes CO₂e.
    pub emissions_t: f64,
}

/// One physical emitting asset, reduced to a single row for the latest
/// complete reporting year.
///
/// Immutable after load except for [`Asset::trend_b`], which the trend
/// estimator attaches before the table is frozen behind the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Source-assigned asset identifier (unique within a collection).
    pub id: String,
    /// Normalized fuel category.
    pub fuel: FuelCategory,
    /// ISO-3 country code.
    pub country: String,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
    /// Installed capacity, MW.
    pub capacity_mw: Option<f64>,
    /// Annual emissions for the latest year, tonnes CO₂e.
    pub emissions_t: f64,
    /// Emission factor, tonnes CO₂e per MWh generated.
    pub emission_factor: Option<f64>,
    /// Annual generation, MWh.
    pub generation_mwh: Option<f64>,
    /// Capacity factor, 0-1.
    pub capacity_factor: Option<f64>,
    /// Emissions by complete reporting year, for trend fitting.
    pub history: Vec<AnnualEmissions>,
    /// Fitted linear trend, fractional change per year, clamped to ±0.15.
    pub trend_b: f64,
}

/// A loaded, deduplicated collection of emitting assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetTable {
    /// One row per asset id, latest complete reporting year.
    pub assets: Vec<Asset>,
    /// Most recent reporting year seen in the source (often incomplete).
    pub latest_year: i32,
    /// Last year considered complete; trends are fitted on years ≤ this.
    pub trend_horizon: i32,
    /// Rows dropped during load (missing coordinates/emissions, malformed).
    pub skipped: u64,
}

/// A zero-emission plant from the clean-plant registry.
///
/// These assets have coordinates and capacity but no emissions series; they
/// dilute local intensity estimates near hydro/nuclear/wind-dominated grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanAsset {
    /// Plant name.
    pub name: String,
    /// ISO-3 country code.
    pub country: String,
    /// Normalized fuel category (always a clean variant).
    pub fuel: FuelCategory,
    /// Installed capacity, MW.
    pub capacity_mw: f64,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
}

/// Industrial sector for a non-generating fossil operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FossilSector {
    /// Coal mines.
    CoalMining,
    /// Oil and gas refineries.
    OilRefining,
    /// Oil and gas production sites.
    OilGasProduction,
}

/// A non-generating industrial emitter (mine, refinery, production site).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FossilOp {
    /// Source-assigned identifier.
    pub id: String,
    /// Industrial sector.
    pub sector: FossilSector,
    /// ISO-3 country code.
    pub country: String,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
    /// Annual emissions for the latest year, tonnes CO₂e.
    pub emissions_t: f64,
}

/// A known data-center site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCenter {
    /// Registry key.
    pub id: String,
    /// Operating provider (lowercase, e.g. `"gcp"`).
    pub provider: String,
    /// Grid zone key the site reports into.
    pub zone_key: String,
    /// Latitude, degrees.
    pub lat: f64,
    /// Longitude, degrees.
    pub lon: f64,
}

/// Baseline intensity and generation mix for one country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryProfile {
    /// Display name.
    #[serde(rename = "country_name", default)]
    pub name: String,
    /// Grid-average carbon intensity, gCO₂/kWh.
    #[serde(rename = "carbon_intensity")]
    pub carbon_intensity: Option<f64>,
    /// Total annual generation, TWh.
    #[serde(rename = "total_TWh", default)]
    pub total_twh: f64,
    /// Fossil generation, TWh.
    #[serde(rename = "fossil_TWh", default)]
    pub fossil_twh: f64,
    /// Coal generation, TWh.
    #[serde(rename = "coal_TWh", default)]
    pub coal_twh: f64,
    /// Gas generation, TWh.
    #[serde(rename = "gas_TWh", default)]
    pub gas_twh: f64,
    /// Nuclear generation, TWh.
    #[serde(rename = "nuclear_TWh", default)]
    pub nuclear_twh: f64,
    /// Renewable generation, TWh.
    #[serde(rename = "renewables_TWh", default)]
    pub renewables_twh: f64,
}

/// Energy-mix fractions derived from a [`CountryProfile`].
///
/// When the profile reports no generation at all the fossil/clean split
/// defaults to 0.5/0.5 rather than dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixFractions {
    /// Fossil share of total generation.
    pub fossil: f64,
    /// Renewables + nuclear share.
    pub clean: f64,
    /// Coal share.
    pub coal: f64,
    /// Gas share.
    pub gas: f64,
    /// Nuclear share.
    pub nuclear: f64,
    /// Renewables share.
    pub renewables: f64,
}

impl Default for MixFractions {
    fn default() -> Self {
        Self {
            fossil: 0.5,
            clean: 0.5,
            coal: 0.0,
            gas: 0.0,
            nuclear: 0.0,
            renewables: 0.0,
        }
    }
}

impl CountryProfile {
    /// Derives energy-mix fractions from the TWh totals.
    #[must_use]
    pub fn mix_fractions(&self) -> MixFractions {
        if self.total_twh <= 0.0 {
            return MixFractions::default();
        }
        let total = self.total_twh;
        MixFractions {
            fossil: self.fossil_twh / total,
            clean: (self.renewables_twh + self.nuclear_twh) / total,
            coal: self.coal_twh / total,
            gas: self.gas_twh / total,
            nuclear: self.nuclear_twh / total,
            renewables: self.renewables_twh / total,
        }
    }
}

/// Grid-average carbon intensity assumed when no layer resolves, gCO₂/kWh.
pub const WORLD_AVERAGE_CI: f64 = 475.0;

/// Per-fuel carbon intensity reference table, gCO₂/kWh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuelWeights {
    /// Raw fuel name → intensity entries as loaded.
    #[serde(flatten)]
    pub weights: BTreeMap<String, f64>,
}

impl FuelWeights {
    /// Intensity for a fuel category, falling back to the world average for
    /// categories absent from the reference table.
    #[must_use]
    pub fn intensity(&self, fuel: FuelCategory) -> f64 {
        self.weights
            .get(fuel.weight_key())
            .copied()
            .unwrap_or_else(|| self.world_average())
    }

    /// The world-average grid intensity, gCO₂/kWh.
    #[must_use]
    pub fn world_average(&self) -> f64 {
        self.weights
            .get("world_average")
            .copied()
            .unwrap_or(WORLD_AVERAGE_CI)
    }
}
