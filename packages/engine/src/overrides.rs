//! Ordered override chain for final intensity resolution.
//!
//! The trained model is fitted on a small, noisy ground-truth set; the
//! chain patches its known failure modes without retraining. Rules are an
//! ordered list of (predicate, resolver) pairs evaluated top-down — the
//! first matching rule wins:
//!
//! 1. **Clean-grid bypass** — when the resolved zone baseline is below
//!    [`CLEAN_ZONE_CI`], the zone power mix *is* the grid truth. The plants
//!    that actually supply such zones may sit hundreds of km away on the
//!    same transmission grid, so nearby-plant features only add noise.
//! 2. **Live feed** — the one live-capable country takes the real-time
//!    national reading when a fetch succeeded.
//! 3. **Model** — the trained model's prediction.
//! 4. **Baseline** — no model loaded; the layered baseline, flagged.

use serde::{Deserialize, Serialize};

use crate::live::{LIVE_COUNTRY, LiveReading};

/// Zone baseline below which the clean-grid bypass fires, gCO₂/kWh.
pub const CLEAN_ZONE_CI: f64 = 100.0;

/// Which rule produced the final intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensitySource {
    /// Clean-grid bypass returned the zone baseline directly.
    CleanZone,
    /// Live national feed override.
    LiveFeed,
    /// Trained model prediction.
    Model,
    /// Layered baseline; no model was available.
    Baseline,
}

/// Everything the chain may consult, resolved before evaluation.
#[derive(Debug, Clone)]
pub struct OverrideContext<'a> {
    /// Zone baseline intensity from the polygon layer, when resolved.
    pub zone_baseline: Option<f64>,
    /// The model's raw prediction, when a model is loaded.
    pub model_ci: Option<f64>,
    /// Layered baseline (zone → country → world average).
    pub base_ci: f64,
    /// Resolved ISO-3 country code.
    pub country_iso3: Option<&'a str>,
    /// Pre-fetched live reading, when the feed was consulted.
    pub live: Option<&'a LiveReading>,
}

/// The chain's decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Final intensity, clamped ≥ 0 by the resolver.
    pub intensity: f64,
    /// Rule that produced it.
    pub source: IntensitySource,
}

type Predicate = fn(&OverrideContext<'_>) -> bool;
type Resolver = fn(&OverrideContext<'_>) -> Resolution;

/// The ordered rule chain. The final rule always applies.
const CHAIN: &[(Predicate, Resolver)] = &[
    (
        |ctx| ctx.zone_baseline.is_some_and(|zone| zone < CLEAN_ZONE_CI),
        |ctx| Resolution {
            intensity: ctx.zone_baseline.unwrap_or(ctx.base_ci).max(0.0),
            source: IntensitySource::CleanZone,
        },
    ),
    (
        |ctx| {
            ctx.country_iso3 == Some(LIVE_COUNTRY)
                && ctx.live.is_some_and(|live| live.forecast.is_some())
        },
        |ctx| Resolution {
            intensity: ctx
                .live
                .and_then(|live| live.forecast)
                .unwrap_or(ctx.base_ci)
                .max(0.0),
            source: IntensitySource::LiveFeed,
        },
    ),
    (
        |ctx| ctx.model_ci.is_some(),
        |ctx| Resolution {
            intensity: ctx.model_ci.unwrap_or(ctx.base_ci).max(0.0),
            source: IntensitySource::Model,
        },
    ),
    (
        |_| true,
        |ctx| Resolution {
            intensity: ctx.base_ci.max(0.0),
            source: IntensitySource::Baseline,
        },
    ),
];

/// Evaluates the chain top-down and returns the first match.
#[must_use]
pub fn resolve(ctx: &OverrideContext<'_>) -> Resolution {
    for (applies, resolver) in CHAIN {
        if applies(ctx) {
            return resolver(ctx);
        }
    }
    // The final rule's predicate is constant-true.
    unreachable!("override chain has a catch-all rule")
}
