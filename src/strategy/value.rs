//! Expected value and risk-level classification.
//!
//! Prices every quote at a fixed stake and assigns a risk level from an
//! ordered rule ladder. EXTREME is checked first and is absolute.

use serde::Deserialize;
use tracing::debug;

use crate::odds::probability::{round_to, ProbabilityModel};
use crate::types::{EvaluatedQuote, Quote, RiskAssessment, RiskLevel};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rule-ladder thresholds (defaults overridden by config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    /// Below this estimated probability a selection is EXTREME.
    pub extreme_below_probability: f64,
    /// Below this EV margin a selection is EXTREME.
    pub min_ev_margin: f64,
    /// Above these odds a selection is EXTREME.
    pub extreme_above_odds: f64,
    pub low_min_probability: f64,
    pub low_max_odds: f64,
    /// LOW requires the model to agree closely with the market.
    pub low_max_delta_p: f64,
    pub medium_min_probability: f64,
    pub medium_max_odds: f64,
    pub medium_min_ev_margin: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            extreme_below_probability: 0.50,
            min_ev_margin: 0.02,
            extreme_above_odds: 5.00,
            low_min_probability: 0.78,
            low_max_odds: 1.65,
            low_max_delta_p: 0.04,
            medium_min_probability: 0.65,
            medium_max_odds: 2.20,
            medium_min_ev_margin: 0.025,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct ValueClassifier {
    config: ValueConfig,
    stake: f64,
}

impl ValueClassifier {
    pub fn new(config: ValueConfig, stake: f64) -> Self {
        Self { config, stake }
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    /// EV of a stake at the given probability and price, rounded to cents.
    pub fn expected_value(&self, p_estimated: f64, odds: f64) -> f64 {
        round_to((p_estimated * odds - 1.0) * self.stake, 2)
    }

    /// Apply the rule ladder. First match wins.
    pub fn classify(&self, p_estimated: f64, p_implied: f64, odds: f64, ev: f64) -> RiskAssessment {
        let c = &self.config;
        let ev_margin = if self.stake > 0.0 { ev / self.stake } else { 0.0 };
        let delta_p = p_estimated - p_implied;

        let level = if p_estimated < c.extreme_below_probability
            || ev_margin < c.min_ev_margin
            || odds > c.extreme_above_odds
        {
            RiskLevel::Extreme
        } else if p_estimated >= c.low_min_probability
            && odds <= c.low_max_odds
            && ev_margin >= c.min_ev_margin
            && delta_p.abs() <= c.low_max_delta_p
        {
            RiskLevel::Low
        } else if p_estimated >= c.medium_min_probability
            && odds <= c.medium_max_odds
            && ev_margin >= c.medium_min_ev_margin
        {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };

        RiskAssessment {
            level,
            delta_p: round_to(delta_p, 4),
            ev_margin: round_to(ev_margin, 4),
        }
    }

    /// Run the probability, EV and risk passes over one quote.
    pub fn evaluate(&self, quote: &Quote, model: &ProbabilityModel) -> EvaluatedQuote {
        let p_implied = round_to(ProbabilityModel::implied(quote.odds), 4);
        let p_estimated = model.estimate(&quote.market, quote.odds);
        let ev = self.expected_value(p_estimated, quote.odds);
        let risk = self.classify(p_estimated, p_implied, quote.odds, ev);

        debug!(
            selection = %quote.key(),
            odds = quote.odds,
            p_estimated,
            ev,
            level = %risk.level,
            "Quote evaluated"
        );

        EvaluatedQuote {
            quote: quote.clone(),
            p_implied,
            p_estimated,
            stake: self.stake,
            ev,
            risk,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
