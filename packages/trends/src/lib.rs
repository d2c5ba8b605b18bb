#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Linear emission-trend fitting.
//!
//! Fits ordinary-least-squares lines of annual emissions vs. year, per asset
//! and per country, over complete reporting years only. The most recent
//! reporting year is routinely preliminary (partial-year totals look like a
//! uniform emissions drop), so callers exclude it before fitting.
//!
//! Per-asset slopes are normalized to a fractional change per year by
//! dividing by the fitted value at the trend horizon, then clamped to
//! [`MAX_TREND`]. Linear is preferred over higher orders: with four or five
//! points a quadratic has almost no residual degrees of freedom and diverges
//! on extrapolation.

use serde::{Deserialize, Serialize};

/// Physical bound on the normalized trend coefficient, fraction per year.
pub const MAX_TREND: f64 = 0.15;

/// Relative change per year below which a trend is labeled stable.
const STABLE_THRESHOLD: f64 = 0.01;

/// Qualitative direction of an emission trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Emissions falling by more than 1 %/yr.
    Improving,
    /// Emissions rising by more than 1 %/yr.
    Worsening,
    /// Within ±1 %/yr.
    Stable,
}

/// Fitted emission trend for one country (or one asset series).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendRecord {
    /// Complete years the fit used.
    pub years: Vec<i32>,
    /// Raw slope, tonnes CO₂e per year.
    pub slope_tonnes_per_year: f64,
    /// Slope normalized to percent change per year.
    pub pct_change_per_year: f64,
    /// Goodness of fit.
    pub r_squared: f64,
    /// Fitted emissions projected three years past the horizon, floored at 0.
    pub projected_near: f64,
    /// Fitted emissions projected six years past the horizon, floored at 0.
    pub projected_far: f64,
    /// Qualitative direction label.
    pub direction: TrendDirection,
}

/// Ordinary-least-squares fit of `values` against `years`.
///
/// Returns `(slope, intercept, r_squared)`, or `None` with fewer than two
/// points or a degenerate (single-year) x-range.
fn ols(years: &[f64], values: &[f64]) -> Option<(f64, f64, f64)> {
    if years.len() < 2 || years.len() != values.len() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = years.len() as f64;
    let x_mean = years.iter().sum::<f64>() / n;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (&x, &y) in years.iter().zip(values) {
        ss_xy += (x - x_mean) * (y - y_mean);
        ss_xx += (x - x_mean) * (x - x_mean);
    }
    if ss_xx <= 0.0 {
        return None;
    }
    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&x, &y) in years.iter().zip(values) {
        let pred = slope * x + intercept;
        ss_res += (y - pred) * (y - pred);
        ss_tot += (y - y_mean) * (y - y_mean);
    }
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };
    Some((slope, intercept, r_squared))
}

/// Fits a normalized per-asset trend coefficient from an annual series.
///
/// `horizon` is the last complete year; the series is shifted so t = 0 at
/// the horizon, making the OLS intercept the fitted current-year emissions.
/// The slope is divided by that intercept (floored at 1 t, or the mean
/// magnitude when the intercept is near zero) and clamped to ±[`MAX_TREND`].
/// Fewer than two valid years yields 0 — there is no cross-asset fallback
/// at this level.
#[must_use]
pub fn fit_asset_trend(series: &[(i32, f64)], horizon: i32) -> f64 {
    let mut t = Vec::with_capacity(series.len());
    let mut e = Vec::with_capacity(series.len());
    for &(year, emissions) in series {
        if year <= horizon {
            t.push(f64::from(year - horizon));
            e.push(emissions);
        }
    }
    let Some((slope, intercept, _)) = ols(&t, &e) else {
        return 0.0;
    };

    let mut current = intercept;
    if current.abs() < 1.0 {
        #[allow(clippy::cast_precision_loss)]
        let mean_mag = e.iter().map(|v| v.abs()).sum::<f64>() / e.len() as f64;
        current = mean_mag.max(1.0);
    }
    (slope / current).clamp(-MAX_TREND, MAX_TREND)
}

/// Fits a country-level trend record from country-summed annual emissions.
///
/// `latest_year` is the most recent (possibly incomplete) reporting year;
/// years after `horizon` are excluded from the fit but `latest_year` anchors
/// the "current" value the percent change is normalized against. Returns
/// `None` with fewer than two complete years.
#[must_use]
pub fn fit_country_trend(
    series: &[(i32, f64)],
    horizon: i32,
    latest_year: i32,
) -> Option<TrendRecord> {
    let mut years = Vec::new();
    let mut x = Vec::new();
    let mut e = Vec::new();
    for &(year, emissions) in series {
        if year <= horizon {
            years.push(year);
            x.push(f64::from(year));
            e.push(emissions);
        }
    }
    let (slope, intercept, r_squared) = ols(&x, &e)?;

    let current = slope * f64::from(latest_year) + intercept;
    let pct_change_per_year = slope / current.abs().max(1.0) * 100.0;
    let projected_near = (slope * f64::from(horizon + 3) + intercept).max(0.0);
    let projected_far = (slope * f64::from(horizon + 6) + intercept).max(0.0);

    let direction = if slope < -current.abs() * STABLE_THRESHOLD {
        TrendDirection::Improving
    } else if slope > current.abs() * STABLE_THRESHOLD {
        TrendDirection::Worsening
    } else {
        TrendDirection::Stable
    };

    Some(TrendRecord {
        years,
        slope_tonnes_per_year: slope,
        pct_change_per_year,
        r_squared,
        projected_near,
        projected_far,
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_year_yields_zero() {
        assert!(fit_asset_trend(&[(2024, 1000.0)], 2024).abs() < f64::EPSILON);
        assert!(fit_asset_trend(&[], 2024).abs() < f64::EPSILON);
    }

    #[test]
    fn declining_series_yields_negative_coefficient() {
        let series = [
            (2021, 1000.0),
            (2022, 950.0),
            (2023, 900.0),
            (2024, 850.0),
        ];
        let b = fit_asset_trend(&series, 2024);
        assert!(b < 0.0);
        // 50 t/yr decline against ~850 t at the horizon.
        assert!((b - (-50.0 / 850.0)).abs() < 1e-9);
    }

    #[test]
    fn coefficient_is_clamped_to_physical_bound() {
        // 80 %/yr collapse clamps at the -15 %/yr bound.
        let series = [(2022, 1000.0), (2023, 200.0), (2024, 40.0)];
        let b = fit_asset_trend(&series, 2024);
        assert!((b - (-MAX_TREND)).abs() < f64::EPSILON);

        let series = [(2022, 40.0), (2023, 200.0), (2024, 1000.0)];
        let b = fit_asset_trend(&series, 2024);
        assert!((b - MAX_TREND).abs() < f64::EPSILON);
    }

    #[test]
    fn incomplete_year_is_excluded_from_fit() {
        // A flat series plus a preliminary 2025 row that would otherwise
        // drag the slope down hard.
        let series = [
            (2022, 1000.0),
            (2023, 1000.0),
            (2024, 1000.0),
            (2025, 100.0),
        ];
        let b = fit_asset_trend(&series, 2024);
        assert!(b.abs() < 1e-12);
    }

    #[test]
    fn near_zero_intercept_uses_mean_magnitude_floor() {
        // Series crossing zero at the horizon; slope stays finite.
        let series = [(2022, -20.0), (2023, -10.0), (2024, 0.0)];
        let b = fit_asset_trend(&series, 2024);
        assert!(b.is_finite());
        assert!(b.abs() <= MAX_TREND);
    }

    #[test]
    fn country_trend_perfect_line() {
        let series = [
            (2021, 4000.0),
            (2022, 3900.0),
            (2023, 3800.0),
            (2024, 3700.0),
            (2025, 3000.0),
        ];
        let record = fit_country_trend(&series, 2024, 2025).expect("fit");
        assert!((record.slope_tonnes_per_year - (-100.0)).abs() < 1e-6);
        assert!((record.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(record.direction, TrendDirection::Improving);
        assert_eq!(record.years, vec![2021, 2022, 2023, 2024]);
        // Projections extend the fitted line, not the preliminary 2025 value.
        assert!((record.projected_near - 3400.0).abs() < 1e-6);
    }

    #[test]
    fn country_trend_requires_two_complete_years() {
        assert!(fit_country_trend(&[(2024, 100.0)], 2024, 2025).is_none());
    }

    #[test]
    fn flat_series_is_stable() {
        let series = [(2022, 500.0), (2023, 500.0), (2024, 500.0)];
        let record = fit_country_trend(&series, 2024, 2024).expect("fit");
        assert_eq!(record.direction, TrendDirection::Stable);
        assert!(record.pct_change_per_year.abs() < 1e-9);
    }
}
