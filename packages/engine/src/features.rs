//! Feature fusion: one query point → one model feature vector.
//!
//! The scalar and batch prediction paths share this module end to end. The
//! batch evaluator issues its spatial queries up front and feeds the
//! pre-queried neighborhoods through the same [`Engine::fuse`] the scalar
//! path uses, so the two paths cannot drift apart.

use std::collections::BTreeMap;

use gridscore_assets_models::MixFractions;
use gridscore_spatial::EARTH_RADIUS_KM;

use crate::Engine;

/// Default local-aggregation radius, km.
pub const DEFAULT_RADIUS_KM: f64 = 300.0;

/// Distance floor for inverse-square weighting, km.
const MIN_IDW_KM: f64 = 1.0;

/// Zone centroid neighbors blended into the zone IDW estimate.
pub(crate) const ZONE_NEIGHBOR_K: usize = 3;

/// Zone centroid neighbors beyond this distance are discarded, km.
const ZONE_NEIGHBOR_MAX_KM: f64 = 1000.0;

/// Nearest-centroid zone attributes are accepted only within this, km.
const ZONE_CENTROID_MAX_KM: f64 = 500.0;

/// Pre-queried spatial context for one query point.
///
/// All index lookups a query needs, gathered before any feature
/// arithmetic. Entries are `(index, distance_radians)` pairs.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    /// Emitting assets within the aggregation radius.
    pub power: Vec<(usize, f64)>,
    /// Clean plants within the aggregation radius.
    pub clean: Vec<(usize, f64)>,
    /// Nearest emitting asset (country resolution).
    pub nearest_power: Option<(usize, f64)>,
    /// Zone slot from polygon containment (with bounded fallback).
    pub zone_slot: Option<usize>,
    /// Nearest zone centroids, nearest first (centroid-tree indices).
    pub zone_neighbors: Vec<(usize, f64)>,
}

/// Every feature the fusion step computes, by model feature name.
///
/// The assembled vector follows the model's declared feature order; names
/// the model declares but fusion does not compute score 0.0 — never
/// dropped, never reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub country_ci: f64,
    pub emissions_per_capacity: f64,
    pub local_pct_coal: f64,
    pub local_pct_clean: f64,
    pub mean_emissions_per_plant: f64,
    pub abs_lat: f64,
    pub idw_weighted_ci: f64,
    pub country_ci_sq: f64,
    pub zone_ci: f64,
    pub zone_idw_ci: f64,
    pub sqrt_zone_ci: f64,
    pub zone_x_country: f64,
    pub country_fossil_frac: f64,
    pub country_clean_frac: f64,
    pub country_coal_frac: f64,
    pub country_gas_frac: f64,
    pub country_nuclear_frac: f64,
    pub country_renew_frac: f64,
    pub ct_grid_ci_est: f64,
    pub local_ef_weighted: f64,
    pub local_generation_gwh: f64,
    pub local_mean_cf: f64,
    pub zone_clean_cap_frac: f64,
    pub zone_fossil_cap_frac: f64,
    pub zone_coal_cap_mw: f64,
    pub state_ci: f64,
    pub is_managed_site: f64,
    pub country_trend_pct: f64,
    pub local_trend_x_ci: f64,
}

impl FeatureSet {
    /// Looks up a feature by its model-declared name; unknown names
    /// default to 0.0.
    #[must_use]
    pub fn value(&self, name: &str) -> f64 {
        match name {
            "country_ci" => self.country_ci,
            "emissions_per_capacity" => self.emissions_per_capacity,
            "local_pct_coal" => self.local_pct_coal,
            "local_pct_clean" => self.local_pct_clean,
            "mean_emissions_per_plant" => self.mean_emissions_per_plant,
            "abs_lat" => self.abs_lat,
            "idw_weighted_ci" => self.idw_weighted_ci,
            "country_ci_sq" => self.country_ci_sq,
            "zone_ci" => self.zone_ci,
            "zone_idw_ci" => self.zone_idw_ci,
            "sqrt_zone_ci" => self.sqrt_zone_ci,
            "zone_x_country" => self.zone_x_country,
            "country_fossil_frac" => self.country_fossil_frac,
            "country_clean_frac" => self.country_clean_frac,
            "country_coal_frac" => self.country_coal_frac,
            "country_gas_frac" => self.country_gas_frac,
            "country_nuclear_frac" => self.country_nuclear_frac,
            "country_renew_frac" => self.country_renew_frac,
            "ct_grid_ci_est" => self.ct_grid_ci_est,
            "local_ef_weighted" => self.local_ef_weighted,
            "local_generation_gwh" => self.local_generation_gwh,
            "local_mean_cf" => self.local_mean_cf,
            "zone_clean_cap_frac" => self.zone_clean_cap_frac,
            "zone_fossil_cap_frac" => self.zone_fossil_cap_frac,
            "zone_coal_cap_mw" => self.zone_coal_cap_mw,
            "state_ci" => self.state_ci,
            "is_managed_site" => self.is_managed_site,
            "country_trend_pct" => self.country_trend_pct,
            "local_trend_x_ci" => self.local_trend_x_ci,
            _ => 0.0,
        }
    }
}

/// The fused result for one query point: features plus the resolved
/// context the response surfaces.
#[derive(Debug, Clone)]
pub struct Fused {
    /// Computed feature values.
    pub features: FeatureSet,
    /// Layered baseline: zone → country → world average.
    pub base_ci: f64,
    /// Zone baseline from the polygon layer, when resolved.
    pub zone_baseline: Option<f64>,
    /// Resolved zone key.
    pub zone_key: Option<String>,
    /// Resolved ISO-3 country code (requires a profile entry).
    pub country_iso3: Option<String>,
    /// Resolved country display name.
    pub country_name: Option<String>,
    /// Neither zone nor country resolved a baseline.
    pub resolution_gap: bool,
    /// Capacity-weighted local trend coefficient (country fallback).
    pub local_trend_b: f64,
    /// Emitting assets within the radius.
    pub power_in_radius: usize,
    /// Fossil capacity within the radius, MW.
    pub fossil_capacity_mw: f64,
    /// Zero-emission capacity within the radius, MW.
    pub clean_capacity_mw: f64,
    /// Capacity by fuel category within the radius, MW.
    pub local_fuel_mix_mw: BTreeMap<String, f64>,
}

impl Engine {
    /// Gathers all spatial context for one query point.
    #[must_use]
    pub(crate) fn gather(&self, lat: f64, lon: f64, radius_km: f64) -> Neighborhood {
        let radius_rad = radius_km / EARTH_RADIUS_KM;
        Neighborhood {
            power: self.power_tree.within_radius(lat, lon, radius_rad),
            clean: self.clean_tree.within_radius(lat, lon, radius_rad),
            nearest_power: self.power_tree.nearest(lat, lon, 1).into_iter().next(),
            zone_slot: self.zone_index.resolve(lat, lon),
            zone_neighbors: self.zone_centroid_tree.nearest(lat, lon, ZONE_NEIGHBOR_K),
        }
    }

    /// Fuses a pre-queried neighborhood into the model feature vector and
    /// resolved context.
    ///
    /// With a target year, per-asset emissions and generation are scaled by
    /// `max(0, 1 + trend·Δt)` before aggregation — declining assets shed
    /// spatial influence and assets whose projected output reaches zero are
    /// excluded from fuel-mix denominators as retired. Zero assets in
    /// radius leaves the local features at 0, never NaN.
    #[must_use]
    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    pub(crate) fn fuse(&self, lat: f64, lon: f64, year: Option<i32>, hood: &Neighborhood) -> Fused {
        let delta_t = year.map(|y| f64::from(y - self.power.trend_horizon));

        // Country resolution via the nearest emitting asset.
        let mut country_iso3 = None;
        let mut country_name = None;
        if let Some((idx, _)) = hood.nearest_power {
            let code = &self.power.assets[idx].country;
            if let Some(profile) = self.countries.get(code) {
                country_iso3 = Some(code.clone());
                country_name = Some(if profile.name.is_empty() {
                    code.clone()
                } else {
                    profile.name.clone()
                });
            }
        }
        let profile = country_iso3
            .as_deref()
            .and_then(|code| self.countries.get(code));

        // Zone resolution and the layered baseline.
        let zone = hood.zone_slot.map(|slot| &self.zones[slot]);
        let zone_key = zone.map(|z| z.key.clone());
        let zone_baseline = zone.and_then(|z| z.ci);
        let country_baseline = profile.and_then(|p| p.carbon_intensity);
        let resolution_gap = zone_baseline.is_none() && country_baseline.is_none();
        let base_ci = zone_baseline
            .or(country_baseline)
            .unwrap_or_else(|| self.fuel_weights.world_average());

        let mix = profile.map_or_else(MixFractions::default, |p| p.mix_fractions());

        // Local-radius aggregation over emitting + clean assets.
        let mut emissions_sum = 0.0;
        let mut power_cap_sum = 0.0;
        let mut fossil_cap_sum = 0.0;
        let mut clean_cap_sum = 0.0;
        let mut active_count = 0usize;
        let mut active_coal = 0usize;
        let mut active_fossil = 0usize;
        let mut idw_weight_sum = 0.0;
        let mut idw_ci_sum = 0.0;
        let mut ef_weighted_sum = 0.0;
        let mut generation_sum = 0.0;
        let mut cf_sum = 0.0;
        let mut cf_count = 0u32;
        let mut trend_weight_sum = 0.0;
        let mut trend_sum = 0.0;
        let mut fuel_mix: BTreeMap<String, f64> = BTreeMap::new();

        for &(idx, dist) in &hood.power {
            let scale = delta_t.map_or(1.0, |t| (1.0 + self.power_view.trend[idx] * t).max(0.0));
            let retired = delta_t.is_some() && scale <= 0.0;
            let cap = self.power_view.caps[idx];
            let emissions = self.power_view.emissions[idx] * scale;

            emissions_sum += emissions;
            power_cap_sum += cap;
            if self.power_view.is_fossil[idx] {
                fossil_cap_sum += cap;
            } else {
                clean_cap_sum += cap;
            }
            if !retired {
                active_count += 1;
                if self.power_view.is_coal[idx] {
                    active_coal += 1;
                }
                if self.power_view.is_fossil[idx] {
                    active_fossil += 1;
                }
            }

            let dk = (dist * EARTH_RADIUS_KM).max(MIN_IDW_KM);
            let weight = cap * scale / (dk * dk);
            idw_weight_sum += weight;
            idw_ci_sum += weight * self.power_view.fuel_ci[idx];

            if let (Some(ef), Some(activity)) =
                (self.power_view.ef[idx], self.power_view.activity[idx])
            {
                let activity = activity * scale;
                if activity > 0.0 {
                    ef_weighted_sum += ef * activity;
                    generation_sum += activity;
                }
            }
            if let Some(cf) = self.power_view.cf[idx]
                && cf > 0.0
            {
                cf_sum += cf;
                cf_count += 1;
            }

            let trend_cap = if cap > 0.0 { cap } else { 1.0 };
            trend_weight_sum += trend_cap;
            trend_sum += self.power_view.trend[idx] * trend_cap;

            let fuel = self.power.assets[idx].fuel.to_string();
            *fuel_mix.entry(fuel).or_default() += cap;
        }

        let mut clean_registry_cap_sum = 0.0;
        for &(idx, dist) in &hood.clean {
            let cap = self.clean_view.caps[idx];
            clean_registry_cap_sum += cap;

            let dk = (dist * EARTH_RADIUS_KM).max(MIN_IDW_KM);
            let weight = cap / (dk * dk);
            idw_weight_sum += weight;
            idw_ci_sum += weight * self.clean_view.fuel_ci[idx];

            let fuel = self.clean[idx].fuel.to_string();
            *fuel_mix.entry(fuel).or_default() += cap;
        }

        let power_in_radius = hood.power.len();
        let clean_in_radius = hood.clean.len();

        // Fuel-category fractions over the fossil + clean union, with
        // retired assets excluded from the denominator.
        let mix_denominator = active_count + clean_in_radius;
        let (local_pct_coal, local_pct_fossil) = if mix_denominator > 0 {
            (
                active_coal as f64 / mix_denominator as f64,
                active_fossil as f64 / mix_denominator as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let local_pct_clean = (1.0 - local_pct_fossil).max(0.0);

        // Emissions per capacity counts clean capacity in the denominator
        // so clean-heavy neighborhoods read as low-intensity.
        let total_cap = power_cap_sum + clean_registry_cap_sum;
        let emissions_per_capacity = if total_cap > 0.0 {
            emissions_sum / total_cap
        } else {
            0.0
        };
        let mean_emissions_per_plant = if power_in_radius > 0 {
            emissions_sum / power_in_radius as f64
        } else {
            0.0
        };
        let idw_weighted_ci = if idw_weight_sum > 0.0 {
            idw_ci_sum / idw_weight_sum
        } else {
            0.0
        };
        let local_ef_weighted = if generation_sum > 0.0 {
            // t/MWh over MWh generation, scaled to g/kWh.
            ef_weighted_sum / generation_sum * 1000.0
        } else {
            0.0
        };
        let local_generation_gwh = generation_sum / 1000.0;
        let local_mean_cf = if cf_count > 0 {
            cf_sum / f64::from(cf_count)
        } else {
            0.0
        };

        let mut local_trend_b = if trend_weight_sum > 0.0 {
            trend_sum / trend_weight_sum.max(1.0)
        } else {
            0.0
        };
        let country_trend_pct = country_iso3
            .as_deref()
            .and_then(|code| self.country_trends.get(code))
            .map_or(0.0, |record| record.pct_change_per_year);
        if local_trend_b == 0.0 {
            local_trend_b = country_trend_pct / 100.0;
        }

        // Zone centroid neighbors: nearest-centroid attributes within
        // 500 km, inverse-square blend of the k nearest within 1000 km.
        let mut zone_ci_val = zone_baseline.unwrap_or(0.0);
        let mut zone_clean_cap_frac = 0.0;
        let mut zone_fossil_cap_frac = 0.0;
        let mut zone_coal_cap_mw = 0.0;
        let mut zone_idw_weight = 0.0;
        let mut zone_idw_sum = 0.0;
        if let Some(&(tree_idx, dist)) = hood.zone_neighbors.first() {
            let nearest = &self.zones[self.zone_centroid_slots[tree_idx]];
            let dist_km = dist * EARTH_RADIUS_KM;
            if dist_km < ZONE_CENTROID_MAX_KM {
                if zone_baseline.is_none()
                    && let Some(ci) = nearest.ci
                {
                    zone_ci_val = ci;
                }
                if let (Some(clean), Some(fossil)) =
                    (nearest.clean_cap_frac, nearest.fossil_cap_frac)
                {
                    zone_clean_cap_frac = clean;
                    zone_fossil_cap_frac = fossil;
                    zone_coal_cap_mw = nearest.coal_cap_mw;
                }
            }
        }
        for &(tree_idx, dist) in &hood.zone_neighbors {
            let dk = (dist * EARTH_RADIUS_KM).max(MIN_IDW_KM);
            if dk > ZONE_NEIGHBOR_MAX_KM {
                continue;
            }
            if let Some(ci) = self.zones[self.zone_centroid_slots[tree_idx]].ci {
                let weight = 1.0 / (dk * dk);
                zone_idw_weight += weight;
                zone_idw_sum += weight * ci;
            }
        }
        let zone_idw_ci = if zone_idw_weight > 0.0 {
            zone_idw_sum / zone_idw_weight
        } else {
            0.0
        };

        let features = FeatureSet {
            country_ci: base_ci,
            emissions_per_capacity,
            local_pct_coal,
            local_pct_clean,
            mean_emissions_per_plant,
            abs_lat: lat.abs(),
            idw_weighted_ci,
            country_ci_sq: base_ci * base_ci / 1000.0,
            zone_ci: zone_ci_val,
            zone_idw_ci,
            sqrt_zone_ci: zone_ci_val.max(0.0).sqrt(),
            zone_x_country: zone_ci_val * base_ci / 1000.0,
            country_fossil_frac: mix.fossil,
            country_clean_frac: mix.clean,
            country_coal_frac: mix.coal,
            country_gas_frac: mix.gas,
            country_nuclear_frac: mix.nuclear,
            country_renew_frac: mix.renewables,
            ct_grid_ci_est: emissions_per_capacity * mix.fossil,
            local_ef_weighted,
            local_generation_gwh,
            local_mean_cf,
            zone_clean_cap_frac,
            zone_fossil_cap_frac,
            zone_coal_cap_mw,
            // The batch path carries no sub-national resolution; the
            // scalar path mirrors it so the two stay equivalent.
            state_ci: base_ci,
            is_managed_site: 0.0,
            country_trend_pct,
            local_trend_x_ci: local_trend_b * base_ci,
        };

        Fused {
            features,
            base_ci,
            zone_baseline,
            zone_key,
            country_iso3,
            country_name,
            resolution_gap,
            local_trend_b,
            power_in_radius,
            fossil_capacity_mw: fossil_cap_sum,
            clean_capacity_mw: clean_cap_sum + clean_registry_cap_sum,
            local_fuel_mix_mw: fuel_mix,
        }
    }

    /// Assembles the feature vector in the model's declared order.
    #[must_use]
    pub(crate) fn feature_row(features: &FeatureSet, names: &[String]) -> Vec<f64> {
        names.iter().map(|name| features.value(name)).collect()
    }
}
