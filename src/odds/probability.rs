//! Probability model.
//!
//! Turns a price into an implied probability and applies a fixed,
//! conservative correction per market and per odds band. This is a
//! deterministic heuristic, not a fitted model.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Round to `dp` decimal places.
pub fn round_to(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// Probability model configuration (defaults overridden by config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbabilityConfig {
    /// Additive adjustment per exact market name.
    pub market_adjustments: BTreeMap<String, f64>,
    /// Adjustment for markets not listed above.
    pub default_adjustment: f64,
    /// Below this price a selection is a heavy favourite.
    pub favourite_below: f64,
    pub favourite_adjustment: f64,
    /// Above this price a selection is a long shot.
    pub longshot_above: f64,
    pub longshot_adjustment: f64,
    pub min_probability: f64,
    pub max_probability: f64,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        let market_adjustments = [
            ("Match Winner", 0.00),
            ("Over/Under", 0.02),
            ("Goals Over/Under", 0.02),
            ("Goals Over/Under First Half", 0.01),
            ("Goals Over/Under - Second Half", 0.01),
            ("Both Teams Score", 0.01),
            ("Home/Away", 0.00),
            ("Second Half Winner", -0.05),
            ("First Half Winner", -0.05),
            ("Exact Score", -0.15),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            market_adjustments,
            default_adjustment: -0.03,
            favourite_below: 1.50,
            favourite_adjustment: -0.05,
            longshot_above: 3.50,
            longshot_adjustment: -0.07,
            min_probability: 0.01,
            max_probability: 0.99,
        }
    }
}

pub struct ProbabilityModel {
    config: ProbabilityConfig,
}

impl ProbabilityModel {
    pub fn new(config: ProbabilityConfig) -> Self {
        Self { config }
    }

    /// Access the model configuration.
    pub fn config(&self) -> &ProbabilityConfig {
        &self.config
    }

    /// 1/odds, or 0.0 for a non-positive price.
    pub fn implied(odds: f64) -> f64 {
        if odds > 0.0 {
            1.0 / odds
        } else {
            0.0
        }
    }

    pub fn market_adjustment(&self, market: &str) -> f64 {
        self.config
            .market_adjustments
            .get(market)
            .copied()
            .unwrap_or(self.config.default_adjustment)
    }

    pub fn odds_adjustment(&self, odds: f64) -> f64 {
        if odds < self.config.favourite_below {
            self.config.favourite_adjustment
        } else if odds > self.config.longshot_above {
            self.config.longshot_adjustment
        } else {
            0.0
        }
    }

    /// Estimated probability, clamped and rounded to 4 decimals.
    pub fn estimate(&self, market: &str, odds: f64) -> f64 {
        let p = Self::implied(odds) + self.market_adjustment(market) + self.odds_adjustment(odds);
        round_to(
            p.clamp(self.config.min_probability, self.config.max_probability),
            4,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
