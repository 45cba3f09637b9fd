//! Multi-tier parlay orchestration.
//!
//! Tiers are built from most legs to fewest. Each tier searches the
//! inflated pool first, then the eligible pool, and never reuses a
//! selection already placed in an earlier tier. The day's single picks are
//! searched only when both pools are too small for the tier after
//! exclusions; a search that runs on a pool and finds nothing leaves the
//! tier absent.

use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::parlay::{Guardrails, Leg, ParlayBuilder, ParlayRule, Ranking, TierConfig};
use crate::types::{MarketRisk, PickRecord, PoolSource, RiskLevel, SelectionKey, TierOutcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParlaysConfig {
    pub tiers: Vec<TierConfig>,
}

impl Default for ParlaysConfig {
    fn default() -> Self {
        let marketing = |name: &str, legs: usize, min_profit: f64, min_p: f64, max_odds: f64, max_combined: f64| {
            TierConfig {
                name: name.to_string(),
                rule: ParlayRule { legs, min_odds: 1.60, min_profit },
                guardrails: Guardrails {
                    min_leg_probability: min_p,
                    max_leg_odds: max_odds,
                    allowed_market_risk: vec![MarketRisk::Low, MarketRisk::Medium, MarketRisk::High],
                    min_combined_odds: 0.0,
                    max_combined_odds: max_combined,
                    ..Guardrails::default()
                },
                ranking: Ranking::Edge,
            }
        };

        Self {
            tiers: vec![
                marketing("marketing_4_legs", 4, 800.0, 0.30, 4.00, 120.0),
                marketing("marketing_3_legs", 3, 400.0, 0.33, 3.50, 60.0),
                TierConfig {
                    name: "principal_2_legs".to_string(),
                    rule: ParlayRule { legs: 2, min_odds: 1.25, min_profit: 0.0 },
                    guardrails: Guardrails {
                        min_leg_probability: 0.62,
                        max_leg_odds: 2.10,
                        allowed_market_risk: vec![MarketRisk::Low, MarketRisk::Medium],
                        min_leg_edge: Some(0.0),
                        min_combined_odds: 1.80,
                        max_combined_odds: 3.20,
                        probability_floor: 0.40,
                        value_margin: 0.03,
                        fallback_value_margin: Some(0.027),
                        min_edge_sum: Some(0.0),
                        ..Guardrails::default()
                    },
                    ranking: Ranking::Payout,
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Leg pools available to the tiers, already deduplicated.
#[derive(Debug, Clone, Default)]
pub struct LegSources {
    pub inflated: Vec<Leg>,
    pub eligible: Vec<Leg>,
    pub singles: Vec<PickRecord>,
}

pub struct TierOrchestrator {
    builders: Vec<ParlayBuilder>,
}

impl TierOrchestrator {
    pub fn new(config: &ParlaysConfig, stake: f64) -> Self {
        let mut tiers = config.tiers.clone();
        tiers.sort_by(|a, b| b.rule.legs.cmp(&a.rule.legs));
        Self {
            builders: tiers.into_iter().map(|t| ParlayBuilder::new(t, stake)).collect(),
        }
    }

    /// Tier names in build order.
    pub fn tier_names(&self) -> Vec<&str> {
        self.builders.iter().map(|b| b.tier().name.as_str()).collect()
    }

    /// Build every tier, one outcome per tier in build order.
    pub fn build_all(&self, sources: &LegSources) -> Vec<TierOutcome> {
        let mut used: HashSet<SelectionKey> = HashSet::new();
        let mut outcomes = Vec::with_capacity(self.builders.len());

        for builder in &self.builders {
            let outcome = self.build_tier(builder, sources, &used);
            if let TierOutcome::Built(record) = &outcome {
                info!(parlay = %record, "Parlay tier built");
                used.extend(record.legs.iter().map(PickRecord::key));
            } else {
                warn!(tier = %builder.tier().name, "No parlay available for tier");
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    fn build_tier(
        &self,
        builder: &ParlayBuilder,
        sources: &LegSources,
        used: &HashSet<SelectionKey>,
    ) -> TierOutcome {
        let tier = builder.tier();
        let needed = tier.rule.legs;
        let mut tried = Vec::new();

        for source in [PoolSource::Inflated, PoolSource::ParlayEligible, PoolSource::Singles] {
            // Singles only stand in for pools that were both too small.
            if source == PoolSource::Singles && !tried.is_empty() {
                break;
            }

            let legs = self.source_legs(builder, sources, source, used);
            if legs.len() < needed {
                debug!(
                    tier = %tier.name,
                    source = %source,
                    legs = legs.len(),
                    needed,
                    "Source too small after exclusions"
                );
                continue;
            }

            tried.push(source);
            if let Some(best) = builder.build(&legs) {
                return TierOutcome::Built(builder.to_record(&best, &legs, source));
            }
        }

        TierOutcome::Absent { tier: tier.name.clone(), sources_tried: tried }
    }

    fn source_legs(
        &self,
        builder: &ParlayBuilder,
        sources: &LegSources,
        source: PoolSource,
        used: &HashSet<SelectionKey>,
    ) -> Vec<Leg> {
        let unused = |leg: &Leg| !used.contains(&leg.key);

        match source {
            PoolSource::Inflated => {
                builder.filter_legs(sources.inflated.iter().filter(|l| unused(*l)).cloned().collect())
            }
            PoolSource::ParlayEligible => {
                builder.filter_legs(sources.eligible.iter().filter(|l| unused(*l)).cloned().collect())
            }
            // Last resort: medium-risk singles at or above the tier's
            // minimum leg odds. Pool guardrails do not apply.
            PoolSource::Singles => sources
                .singles
                .iter()
                .filter(|p| p.risk.level == RiskLevel::Medium && p.odds >= builder.tier().rule.min_odds)
                .map(Leg::from_single)
                .filter(|l| unused(l) && !l.event_id().trim().is_empty())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
