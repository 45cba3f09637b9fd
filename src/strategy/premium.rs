//! Premium flagging.
//!
//! Scores every selected bet and promotes a small quota as premium. Only
//! flags, scores and reasons are added; membership never changes.

use serde::Deserialize;
use std::fmt;
use tracing::info;

use super::cmp_f64s;
use crate::odds::probability::round_to;
use crate::types::{DayCard, ParlayRecord, PickRecord, TierOutcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Premium scoring parameters (defaults overridden by config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PremiumConfig {
    pub min_quota: usize,
    pub max_quota: usize,
    /// Quota is bets / this, clamped to [min_quota, max_quota].
    pub quota_divisor: usize,
    /// (minimum odds, bonus) pairs, checked in order.
    pub odds_bonuses: Vec<(f64, f64)>,
    pub green_min_probability: f64,
    pub yellow_min_probability: f64,
    pub green_bonus: f64,
    pub yellow_bonus: f64,
    pub parlay_penalty: f64,
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            min_quota: 3,
            max_quota: 4,
            quota_divisor: 3,
            odds_bonuses: vec![(2.0, 15.0), (1.7, 10.0), (1.5, 5.0)],
            green_min_probability: 0.65,
            yellow_min_probability: 0.55,
            green_bonus: 10.0,
            yellow_bonus: 5.0,
            parlay_penalty: 5.0,
        }
    }
}

/// Traffic-light risk shown next to a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskColour {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for RiskColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskColour::Green => write!(f, "green"),
            RiskColour::Yellow => write!(f, "yellow"),
            RiskColour::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetKind {
    Single,
    Parlay,
}

/// Headline numbers of a bet as the flagger sees them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetSummary {
    pub kind: BetKind,
    /// Rounded to 2 decimals.
    pub probability: f64,
    /// Rounded to 2 decimals.
    pub odds: f64,
}

impl BetSummary {
    pub fn single(pick: &PickRecord) -> Self {
        Self {
            kind: BetKind::Single,
            probability: round_to(pick.p_estimated.clamp(0.0, 1.0), 2),
            odds: round_to(pick.odds.max(0.0), 2),
        }
    }

    pub fn parlay(parlay: &ParlayRecord) -> Self {
        Self {
            kind: BetKind::Parlay,
            probability: round_to(parlay.combined_probability.clamp(0.0, 1.0), 2),
            odds: round_to(parlay.combined_odds.max(0.0), 2),
        }
    }
}

// ---------------------------------------------------------------------------
// Flagger
// ---------------------------------------------------------------------------

pub struct PremiumFlagger {
    config: PremiumConfig,
}

impl PremiumFlagger {
    pub fn new(config: PremiumConfig) -> Self {
        Self { config }
    }

    pub fn colour(&self, probability: f64) -> RiskColour {
        if probability >= self.config.green_min_probability {
            RiskColour::Green
        } else if probability >= self.config.yellow_min_probability {
            RiskColour::Yellow
        } else {
            RiskColour::Red
        }
    }

    pub fn score(&self, bet: &BetSummary) -> f64 {
        let c = &self.config;
        let mut score = bet.probability * 100.0;

        if let Some((_, bonus)) = c.odds_bonuses.iter().find(|(min, _)| bet.odds >= *min) {
            score += bonus;
        }

        score += match self.colour(bet.probability) {
            RiskColour::Green => c.green_bonus,
            RiskColour::Yellow => c.yellow_bonus,
            RiskColour::Red => 0.0,
        };

        if bet.kind == BetKind::Parlay {
            score -= c.parlay_penalty;
        }

        round_to(score, 2)
    }

    /// Number of bets to promote out of `total`.
    pub fn quota(&self, total: usize) -> usize {
        let c = &self.config;
        let raw = total / c.quota_divisor.max(1);
        raw.max(c.min_quota).min(c.max_quota).min(total)
    }

    pub fn reason(&self, bet: &BetSummary) -> String {
        let base = format!(
            "High estimated probability ({}%) at attractive odds ({:.2}).",
            (bet.probability * 100.0).trunc() as u32,
            bet.odds
        );
        match bet.kind {
            BetKind::Parlay => format!("{base} Coherent combination with controlled risk."),
            BetKind::Single => format!("{base} Solid selection backed by market consensus."),
        }
    }

    pub fn message(&self, premium_count: usize) -> String {
        if premium_count == 0 {
            return "No bets available today.".to_string();
        }
        format!(
            "{premium_count} premium selections today. High confidence based on realistic \
             probability and positive expected value. Not guaranteed bets."
        )
    }

    /// Assemble the day's card and flag its premium bets.
    pub fn apply(&self, day: &str, mut singles: Vec<PickRecord>, outcomes: &[TierOutcome]) -> DayCard {
        let mut parlays: Vec<ParlayRecord> = outcomes.iter().filter_map(|o| o.parlay().cloned()).collect();
        let absent_tiers: Vec<String> = outcomes
            .iter()
            .filter(|o| o.parlay().is_none())
            .map(|o| o.tier().to_string())
            .collect();

        // Singles first, then parlays; the stable sort keeps this order on ties.
        let mut summaries: Vec<(BetSummary, f64)> = singles
            .iter()
            .map(BetSummary::single)
            .chain(parlays.iter().map(BetSummary::parlay))
            .map(|s| (s, self.score(&s)))
            .collect();

        let mut order: Vec<usize> = (0..summaries.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, score_a) = &summaries[a];
            let (sb, score_b) = &summaries[b];
            cmp_f64s(&[*score_b, sb.probability, sb.odds], &[*score_a, sa.probability, sa.odds])
        });

        let quota = self.quota(summaries.len());
        let mut premium = vec![false; summaries.len()];
        for &i in order.iter().take(quota) {
            premium[i] = true;
        }

        let n_singles = singles.len();
        for (i, (summary, score)) in summaries.drain(..).enumerate() {
            let reason = premium[i].then(|| self.reason(&summary));
            if i < n_singles {
                let pick = &mut singles[i];
                pick.premium = premium[i];
                pick.premium_reason = reason;
                pick.premium_score = Some(score);
            } else {
                let parlay = &mut parlays[i - n_singles];
                parlay.premium = premium[i];
                parlay.premium_reason = reason;
                parlay.premium_score = Some(score);
            }
        }

        info!(bets = premium.len(), premium = quota, "Premium flags applied");

        DayCard {
            day: day.to_string(),
            singles,
            parlays,
            absent_tiers,
            premium_count: quota,
            premium_message: self.message(quota),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
