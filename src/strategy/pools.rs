//! Value pool building.
//!
//! Flags "inflated" selections, whose best price stands out from the
//! rest of the market, and builds the looser `parlay_eligible` fallback
//! pool. Every sport and market is considered; the market's risk tier
//! decides how much bookmaker agreement is required.

use serde::Deserialize;
use tracing::{debug, info};

use crate::odds::market::MarketClassifier;
use crate::odds::probability::{round_to, ProbabilityModel};
use crate::odds::{aggregate, AggregatedSelection};
use crate::types::{Consensus, EvaluatedQuote, MarketRisk, PoolEntry};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Stability thresholds for one market risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TierThresholds {
    pub min_bookmakers: usize,
    pub max_best_vs_second: f64,
    pub min_best_vs_median: f64,
}

/// Pool thresholds (defaults overridden by config.toml).
/// Riskier market tiers demand more bookmakers and a cleaner outlier.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Global price floor for inflated selections.
    pub min_odds: f64,
    pub low: TierThresholds,
    pub medium: TierThresholds,
    pub high: TierThresholds,
    pub extreme: TierThresholds,
    /// Eligible pool needs max(this, tier min_bookmakers − slack) books.
    pub eligible_min_bookmakers: usize,
    pub eligible_bookmaker_slack: usize,
    pub eligible_high_consensus: usize,
    pub eligible_medium_consensus: usize,
    /// Inflated consensus is high at tier min_bookmakers + this.
    pub inflated_high_consensus_extra: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let liquid = TierThresholds {
            min_bookmakers: 6,
            max_best_vs_second: 1.05,
            min_best_vs_median: 1.03,
        };
        Self {
            min_odds: 1.80,
            low: liquid,
            medium: liquid,
            high: TierThresholds {
                min_bookmakers: 8,
                max_best_vs_second: 1.03,
                min_best_vs_median: 1.05,
            },
            extreme: TierThresholds {
                min_bookmakers: 10,
                max_best_vs_second: 1.02,
                min_best_vs_median: 1.06,
            },
            eligible_min_bookmakers: 4,
            eligible_bookmaker_slack: 2,
            eligible_high_consensus: 10,
            eligible_medium_consensus: 7,
            inflated_high_consensus_extra: 2,
        }
    }
}

impl PoolConfig {
    /// Get the thresholds for a given market risk tier.
    pub fn thresholds_for(&self, risk: MarketRisk) -> &TierThresholds {
        match risk {
            MarketRisk::Low => &self.low,
            MarketRisk::Medium => &self.medium,
            MarketRisk::High => &self.high,
            MarketRisk::Extreme => &self.extreme,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// The two pools produced for a day.
#[derive(Debug, Clone, Default)]
pub struct Pools {
    pub inflated: Vec<PoolEntry>,
    pub eligible: Vec<PoolEntry>,
    /// Selections with at least two quotes.
    pub groups_total: usize,
}

pub struct ValuePoolBuilder {
    config: PoolConfig,
    classifier: MarketClassifier,
}

impl ValuePoolBuilder {
    pub fn new(config: PoolConfig, classifier: MarketClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Build both pools from the day's evaluated quotes.
    pub fn build(&self, evaluated: &[EvaluatedQuote]) -> Pools {
        let groups = aggregate(evaluated);
        let mut pools = Pools { groups_total: groups.len(), ..Default::default() };

        for group in &groups {
            if let Some(entry) = self.eligible_entry(group) {
                pools.eligible.push(entry);
            }
            if let Some(entry) = self.inflated_entry(group) {
                debug!(entry = %entry, "Inflated selection");
                pools.inflated.push(entry);
            }
        }

        info!(
            groups = pools.groups_total,
            inflated = pools.inflated.len(),
            eligible = pools.eligible.len(),
            "Value pools built"
        );

        pools
    }

    /// Loose gate: enough books and usable consensus prices. No edge gate.
    fn eligible_entry(&self, g: &AggregatedSelection<EvaluatedQuote>) -> Option<PoolEntry> {
        let class = self.classifier.classify(&g.key.market);
        let thr = self.config.thresholds_for(class.risk);
        let needed = self
            .config
            .eligible_min_bookmakers
            .max(thr.min_bookmakers.saturating_sub(self.config.eligible_bookmaker_slack));

        if g.bookmaker_count < needed || g.second_odds <= 0.0 || g.median_odds <= 0.0 {
            return None;
        }

        let consensus = if g.bookmaker_count >= self.config.eligible_high_consensus {
            Consensus::High
        } else if g.bookmaker_count >= self.config.eligible_medium_consensus {
            Consensus::Medium
        } else {
            Consensus::Low
        };

        Some(self.entry(g, consensus, false))
    }

    /// Strict gate: price floor, tier book count, outlier shape, positive edge.
    fn inflated_entry(&self, g: &AggregatedSelection<EvaluatedQuote>) -> Option<PoolEntry> {
        let class = self.classifier.classify(&g.key.market);
        let thr = self.config.thresholds_for(class.risk);

        if g.best_odds < self.config.min_odds
            || g.bookmaker_count < thr.min_bookmakers
            || g.second_odds <= 0.0
            || g.median_odds <= 0.0
        {
            return None;
        }
        if g.best_vs_second() > thr.max_best_vs_second {
            return None;
        }
        if g.best_vs_median() < thr.min_best_vs_median {
            return None;
        }
        if edge_of(g) <= 0.0 {
            return None;
        }

        let consensus =
            if g.bookmaker_count >= thr.min_bookmakers + self.config.inflated_high_consensus_extra {
                Consensus::High
            } else {
                Consensus::Medium
            };

        Some(self.entry(g, consensus, true))
    }

    fn entry(
        &self,
        g: &AggregatedSelection<EvaluatedQuote>,
        consensus: Consensus,
        inflated: bool,
    ) -> PoolEntry {
        let class = self.classifier.classify(&g.key.market);
        PoolEntry {
            sport: g.key.sport.clone(),
            event_id: g.key.event_id.clone(),
            market: g.key.market.clone(),
            selection: g.key.selection.clone(),
            odds: round_to(g.best_odds, 2),
            probability: round_to(g.best.p_estimated, 4),
            edge: round_to(edge_of(g), 4),
            ev: g.best.ev,
            risk_level: g.best.risk.level,
            bookmaker_count: g.bookmaker_count,
            best_vs_second: round_to(g.best_vs_second(), 4),
            best_vs_median: round_to(g.best_vs_median(), 4),
            consensus,
            market_type: class.market_type,
            market_risk: class.risk,
            inflated,
        }
    }
}

/// Edge of the best-odds quote: pEstimated − 1/bestOdds.
fn edge_of(g: &AggregatedSelection<EvaluatedQuote>) -> f64 {
    g.best.p_estimated - ProbabilityModel::implied(g.best_odds)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::probability::ProbabilityConfig;
    use crate::strategy::value::{ValueClassifier, ValueConfig};
    use crate::types::{MarketType, Quote};

    fn evaluate(event: &str, market: &str, selection: &str, prices: &[f64]) -> Vec<EvaluatedQuote> {
        let model = ProbabilityModel::new(ProbabilityConfig::default());
        let value = ValueClassifier::new(ValueConfig::default(), 50.0);
        prices
            .iter()
            .enumerate()
            .map(|(i, &odds)| {
                let q = Quote {
                    sport: "football".into(),
                    event_id: event.into(),
                    bookmaker: format!("book{i}"),
                    market: market.into(),
                    selection: selection.into(),
                    odds,
                };
                value.evaluate(&q, &model)
            })
            .collect()
    }

    fn builder() -> ValuePoolBuilder {
        ValuePoolBuilder::new(PoolConfig::default(), MarketClassifier::default())
    }

    #[test]
    fn test_inflated_totals_selection() {
        let quotes = evaluate("e1", "Over/Under", "Over 2.5", &[2.10, 2.05, 1.95, 1.95, 1.95, 1.90]);
        let pools = builder().build(&quotes);

        assert_eq!(pools.groups_total, 1);
        assert_eq!(pools.inflated.len(), 1);
        let e = &pools.inflated[0];
        assert!(e.inflated);
        assert_eq!(e.odds, 2.10);
        assert_eq!(e.bookmaker_count, 6);
        assert_eq!(e.consensus, Consensus::Medium);
        assert_eq!(e.market_type, MarketType::Totals);
        assert_eq!(e.market_risk, MarketRisk::Low);
        assert!(e.edge > 0.0);
        assert!((e.best_vs_median - round_to(2.10 / 1.95, 4)).abs() < 1e-9);
        // Also present in the loose pool, flagged as not inflated.
        assert_eq!(pools.eligible.len(), 1);
        assert!(!pools.eligible[0].inflated);
        assert_eq!(pools.eligible[0].consensus, Consensus::Low);
    }

    #[test]
    fn test_price_floor_excludes_from_inflated_only() {
        let quotes = evaluate("e1", "Over/Under", "Under 2.5", &[1.75, 1.70, 1.65, 1.65, 1.65, 1.60]);
        let pools = builder().build(&quotes);
        assert!(pools.inflated.is_empty());
        assert_eq!(pools.eligible.len(), 1);
    }

    #[test]
    fn test_non_positive_edge_kept_in_eligible() {
        // Unlisted market: -0.03 haircut makes the edge negative.
        let quotes = evaluate("e1", "Handicap", "Home -1", &[2.10, 2.05, 1.95, 1.95, 1.95, 1.90]);
        let pools = builder().build(&quotes);
        assert!(pools.inflated.is_empty());
        assert_eq!(pools.eligible.len(), 1);
        assert!(pools.eligible[0].edge < 0.0);
    }

    #[test]
    fn test_outlier_too_far_from_second_is_rejected() {
        // best/second = 2.30/2.00 = 1.15 > 1.05
        let quotes = evaluate("e1", "Over/Under", "Over 2.5", &[2.30, 2.00, 1.95, 1.95, 1.95, 1.90]);
        assert!(builder().build(&quotes).inflated.is_empty());
    }

    #[test]
    fn test_best_not_above_median_is_rejected() {
        let quotes = evaluate("e1", "Over/Under", "Over 2.5", &[2.00, 2.00, 1.99, 1.99, 1.98, 1.98]);
        assert!(builder().build(&quotes).inflated.is_empty());
    }

    #[test]
    fn test_eligible_book_count_floor() {
        // low tier: max(4, 6-2) = 4 books needed
        let three = evaluate("e1", "Over/Under", "Over 2.5", &[2.0, 1.9, 1.8]);
        assert!(builder().build(&three).eligible.is_empty());
        let four = evaluate("e1", "Over/Under", "Over 2.5", &[2.0, 1.9, 1.8, 1.8]);
        assert_eq!(builder().build(&four).eligible.len(), 1);
        // extreme tier: max(4, 10-2) = 8 books needed
        let exotic = evaluate("e2", "Correct Score", "1-0", &[7.0, 6.5, 6.5, 6.0, 6.0]);
        assert!(builder().build(&exotic).eligible.is_empty());
    }

    #[test]
    fn test_high_consensus_labels() {
        let prices = [2.10, 2.05, 1.98, 1.95, 1.95, 1.95, 1.95, 1.95, 1.92, 1.90];
        let quotes = evaluate("e1", "Over/Under", "Over 2.5", &prices);
        let pools = builder().build(&quotes);
        assert_eq!(pools.eligible[0].consensus, Consensus::High);
        assert_eq!(pools.inflated[0].consensus, Consensus::High);
    }

    #[test]
    fn test_thresholds_for_riskier_tiers_are_stricter() {
        let cfg = PoolConfig::default();
        assert!(cfg.thresholds_for(MarketRisk::Extreme).min_bookmakers
            > cfg.thresholds_for(MarketRisk::Low).min_bookmakers);
        assert!(cfg.thresholds_for(MarketRisk::High).max_best_vs_second
            < cfg.thresholds_for(MarketRisk::Medium).max_best_vs_second);
    }
}
