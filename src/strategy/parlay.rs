//! Parlay construction.
//!
//! Exact brute-force search for the best N-leg combination of a tier.
//! Legs are filtered by per-leg guardrails, every N-combination spanning
//! distinct events is scored, and the economic value rule
//!
//! ```text
//! combinedProbability >= max(floor, 1/combinedOdds + margin)
//! ```
//!
//! gates acceptance. A search that accepts nothing under the primary
//! margin is retried once under the fallback margin; if that also
//! accepts nothing the tier is absent.

use serde::Deserialize;
use std::cmp::Ordering;
use tracing::{debug, warn};

use super::{cmp_f64s, stake_and_win};
use crate::odds::probability::{round_to, ProbabilityModel};
use crate::types::{
    Consensus, MarginAttempt, MarketRisk, ParlayRecord, PickRecord, PoolEntry, PoolSource,
    RiskTag, SelectionKey,
};

// ---------------------------------------------------------------------------
// Tier configuration
// ---------------------------------------------------------------------------

/// Shape of a tier: leg count, minimum per-leg odds and minimum profit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParlayRule {
    pub legs: usize,
    pub min_odds: f64,
    pub min_profit: f64,
}

/// Per-leg and per-combination thresholds for a tier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Guardrails {
    pub min_leg_probability: f64,
    pub max_leg_odds: f64,
    /// Empty means any market risk tier is accepted.
    pub allowed_market_risk: Vec<MarketRisk>,
    pub min_leg_edge: Option<f64>,
    pub min_combined_odds: f64,
    pub max_combined_odds: f64,
    /// Fixed minimum combined probability kept alongside the value rule.
    pub legacy_min_combined_probability: f64,
    pub probability_floor: f64,
    pub value_margin: f64,
    pub fallback_value_margin: Option<f64>,
    pub min_edge_sum: Option<f64>,
    /// Upper bound on the filtered leg pool handed to the search.
    pub max_pool_legs: usize,
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            min_leg_probability: 0.0,
            max_leg_odds: 999.0,
            allowed_market_risk: Vec::new(),
            min_leg_edge: None,
            min_combined_odds: 0.0,
            max_combined_odds: 999_999.0,
            legacy_min_combined_probability: 0.0,
            probability_floor: 0.40,
            value_margin: 0.03,
            fallback_value_margin: None,
            min_edge_sum: None,
            max_pool_legs: 80,
        }
    }
}

/// How accepted candidates are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ranking {
    /// combinedOdds, combinedProbability, edgeSum, consensus.
    Payout,
    /// edgeSum, combinedProbability, consensus, profit.
    Edge,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub rule: ParlayRule,
    #[serde(default)]
    pub guardrails: Guardrails,
    pub ranking: Ranking,
}

// ---------------------------------------------------------------------------
// Legs and candidates
// ---------------------------------------------------------------------------

/// One selection available to the search, with its output record.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub key: SelectionKey,
    pub odds: f64,
    pub probability: f64,
    pub edge: f64,
    /// Unknown for legs sourced from single picks.
    pub market_risk: Option<MarketRisk>,
    pub consensus: Consensus,
    pub record: PickRecord,
}

impl Leg {
    pub fn from_pool(entry: &PoolEntry, stake: f64) -> Self {
        let (stake_dec, potential_win) = stake_and_win(stake, entry.odds);
        let record = PickRecord {
            sport: entry.sport.clone(),
            event_id: entry.event_id.clone(),
            bookmaker: None,
            market: entry.market.clone(),
            selection: entry.selection.clone(),
            odds: entry.odds,
            p_implied: round_to(ProbabilityModel::implied(entry.odds), 4),
            p_estimated: entry.probability,
            p_safe: entry.probability,
            stake: stake_dec,
            potential_win,
            ev: entry.ev,
            risk: RiskTag { level: entry.risk_level },
            premium: false,
            premium_reason: None,
            premium_score: None,
            defaulted: Vec::new(),
        };

        Self {
            key: entry.key(),
            odds: entry.odds,
            probability: entry.probability,
            edge: entry.edge,
            market_risk: Some(entry.market_risk),
            consensus: entry.consensus,
            record,
        }
    }

    /// A single pick reused as a leg. Its probability is the model estimate.
    pub fn from_single(pick: &PickRecord) -> Self {
        let mut record = pick.clone();
        record.premium = false;
        record.premium_reason = None;
        record.premium_score = None;

        Self {
            key: pick.key(),
            odds: pick.odds,
            probability: pick.p_estimated,
            edge: round_to(pick.p_estimated - pick.p_implied, 4),
            market_risk: None,
            consensus: Consensus::Low,
            record,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.key.event_id
    }
}

/// A scored combination. Values are rounded the way they are persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParlayCandidate {
    /// Indices into the leg slice the search ran over.
    pub legs: Vec<usize>,
    pub combined_odds: f64,
    pub combined_probability: f64,
    pub expected_profit: f64,
    pub edge_sum: f64,
    pub consensus_score: u32,
    pub margin: MarginAttempt,
}

/// Index combinations of `k` out of `n` in lexicographic order.
pub struct Combinations {
    n: usize,
    idx: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self { n, idx: (0..k).collect(), done: k == 0 || k > n }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.idx.clone();

        let k = self.idx.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.idx[i] < self.n - k + i {
                self.idx[i] += 1;
                for j in i + 1..k {
                    self.idx[j] = self.idx[j - 1] + 1;
                }
                break;
            }
        }

        Some(current)
    }
}

/// Retry states of a tier search.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SearchState {
    Primary,
    Fallback(f64),
    Absent,
}

#[derive(Debug, Default)]
struct Rejections {
    same_event: usize,
    odds_band: usize,
    profit: usize,
    edge_sum: usize,
    value_rule: usize,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ParlayBuilder {
    tier: TierConfig,
    stake: f64,
}

impl ParlayBuilder {
    pub fn new(tier: TierConfig, stake: f64) -> Self {
        Self { tier, stake }
    }

    pub fn tier(&self) -> &TierConfig {
        &self.tier
    }

    /// Apply per-leg guardrails to a pool-sourced leg list.
    pub fn filter_legs(&self, legs: Vec<Leg>) -> Vec<Leg> {
        let g = &self.tier.guardrails;
        let filtered: Vec<Leg> = legs
            .into_iter()
            .filter(|leg| {
                if leg.odds < self.tier.rule.min_odds || leg.odds > g.max_leg_odds {
                    return false;
                }
                if leg.probability < g.min_leg_probability {
                    return false;
                }
                if !g.allowed_market_risk.is_empty() {
                    match leg.market_risk {
                        Some(risk) if g.allowed_market_risk.contains(&risk) => {}
                        _ => return false,
                    }
                }
                if let Some(min_edge) = g.min_leg_edge {
                    if leg.edge < min_edge {
                        return false;
                    }
                }
                !leg.event_id().trim().is_empty()
            })
            .collect();

        self.bound_pool(filtered)
    }

    /// Keep the strongest legs by (edge, probability) when the pool is
    /// larger than the search bound. Input order is preserved.
    fn bound_pool(&self, legs: Vec<Leg>) -> Vec<Leg> {
        let max = self.tier.guardrails.max_pool_legs;
        if max == 0 || legs.len() <= max {
            return legs;
        }

        let mut order: Vec<usize> = (0..legs.len()).collect();
        order.sort_by(|&a, &b| {
            cmp_f64s(
                &[legs[b].edge, legs[b].probability],
                &[legs[a].edge, legs[a].probability],
            )
        });
        let mut keep = vec![false; legs.len()];
        for &i in order.iter().take(max) {
            keep[i] = true;
        }

        warn!(
            tier = %self.tier.name,
            pool = legs.len(),
            kept = max,
            dropped = legs.len() - max,
            "Leg pool bounded, weakest legs left out of the search"
        );

        legs.into_iter()
            .zip(keep)
            .filter_map(|(leg, k)| k.then_some(leg))
            .collect()
    }

    /// Minimum combined probability for a combination at `combined_odds`.
    pub fn required_probability(&self, combined_odds: f64, margin: f64) -> f64 {
        let g = &self.tier.guardrails;
        let value = g.probability_floor.max(1.0 / combined_odds + margin);
        value.max(g.legacy_min_combined_probability)
    }

    /// Find the best combination, retrying once with the fallback margin.
    pub fn build(&self, legs: &[Leg]) -> Option<ParlayCandidate> {
        let g = &self.tier.guardrails;
        let mut state = SearchState::Primary;

        loop {
            state = match state {
                SearchState::Primary => {
                    if let Some(best) = self.search(legs, g.value_margin, MarginAttempt::Primary) {
                        return Some(best);
                    }
                    match g.fallback_value_margin {
                        Some(m) if m != g.value_margin => SearchState::Fallback(m),
                        _ => SearchState::Absent,
                    }
                }
                SearchState::Fallback(margin) => {
                    debug!(tier = %self.tier.name, margin, "Retrying with fallback margin");
                    match self.search(legs, margin, MarginAttempt::Fallback) {
                        Some(best) => return Some(best),
                        None => SearchState::Absent,
                    }
                }
                SearchState::Absent => return None,
            };
        }
    }

    /// One full enumeration under a single margin. Returns the top-ranked
    /// accepted candidate; the first enumerated wins ties.
    fn search(&self, legs: &[Leg], margin: f64, attempt: MarginAttempt) -> Option<ParlayCandidate> {
        let rule = &self.tier.rule;
        let g = &self.tier.guardrails;
        let mut rejected = Rejections::default();
        let mut accepted = 0usize;
        let mut best: Option<ParlayCandidate> = None;

        for combo in Combinations::new(legs.len(), rule.legs) {
            if !distinct_events(legs, &combo) {
                rejected.same_event += 1;
                continue;
            }

            let odds: f64 = combo.iter().map(|&i| legs[i].odds).product();
            if odds > g.max_combined_odds || odds < g.min_combined_odds {
                rejected.odds_band += 1;
                continue;
            }

            let probability: f64 = combo.iter().map(|&i| legs[i].probability).product();
            if probability < self.required_probability(odds, margin) {
                rejected.value_rule += 1;
                continue;
            }

            let profit = odds * self.stake - self.stake;
            if profit < rule.min_profit {
                rejected.profit += 1;
                continue;
            }

            let edge_sum: f64 = combo.iter().map(|&i| legs[i].edge).sum();
            if let Some(min) = g.min_edge_sum {
                if edge_sum < min {
                    rejected.edge_sum += 1;
                    continue;
                }
            }

            let consensus_score = combo.iter().map(|&i| legs[i].consensus.rank()).sum();
            let candidate = ParlayCandidate {
                legs: combo,
                combined_odds: round_to(odds, 4),
                combined_probability: round_to(probability, 6),
                expected_profit: round_to(profit, 2),
                edge_sum: round_to(edge_sum, 4),
                consensus_score,
                margin: attempt,
            };
            accepted += 1;

            let replace = match &best {
                None => true,
                Some(current) => self.rank(&candidate, current) == Ordering::Greater,
            };
            if replace {
                best = Some(candidate);
            }
        }

        debug!(
            tier = %self.tier.name,
            margin = %attempt,
            pool = legs.len(),
            accepted,
            same_event = rejected.same_event,
            odds_band = rejected.odds_band,
            value_rule = rejected.value_rule,
            profit = rejected.profit,
            edge_sum = rejected.edge_sum,
            "Parlay search finished"
        );

        best
    }

    fn rank(&self, a: &ParlayCandidate, b: &ParlayCandidate) -> Ordering {
        match self.tier.ranking {
            Ranking::Payout => cmp_f64s(
                &[a.combined_odds, a.combined_probability, a.edge_sum, a.consensus_score as f64],
                &[b.combined_odds, b.combined_probability, b.edge_sum, b.consensus_score as f64],
            ),
            Ranking::Edge => cmp_f64s(
                &[a.edge_sum, a.combined_probability, a.consensus_score as f64, a.expected_profit],
                &[b.edge_sum, b.combined_probability, b.consensus_score as f64, b.expected_profit],
            ),
        }
    }

    /// Materialise the output record for a winning candidate.
    pub fn to_record(&self, candidate: &ParlayCandidate, legs: &[Leg], source: PoolSource) -> ParlayRecord {
        let (stake, potential_win) = stake_and_win(self.stake, candidate.combined_odds);
        ParlayRecord {
            tier: self.tier.name.clone(),
            legs: candidate.legs.iter().map(|&i| legs[i].record.clone()).collect(),
            combined_odds: candidate.combined_odds,
            combined_probability: candidate.combined_probability,
            stake,
            potential_win,
            expected_profit: candidate.expected_profit,
            expected_edge_sum: candidate.edge_sum,
            consensus_score_sum: candidate.consensus_score,
            margin: candidate.margin,
            source,
            premium: false,
            premium_reason: None,
            premium_score: None,
        }
    }
}

fn distinct_events(legs: &[Leg], combo: &[usize]) -> bool {
    for (n, &i) in combo.iter().enumerate() {
        if combo[n + 1..].iter().any(|&j| legs[j].event_id() == legs[i].event_id()) {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
