//! Single-pick selection.
//!
//! Picks up to a target number of safe single bets from standard markets.
//! Safety is a shrunk probability blending the model toward the market;
//! output varies across markets and never repeats an event.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use super::{cmp_f64s, keep_best_by, stake_and_win};
use crate::odds::probability::round_to;
use crate::types::{EvaluatedQuote, PickRecord, RiskLevel, RiskTag};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Single-pick selection parameters (defaults overridden by config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinglesConfig {
    pub target_count: usize,
    /// Weight of the model estimate in pSafe; the rest goes to the market.
    pub shrink_weight: f64,
    pub min_odds: f64,
    pub max_odds: f64,
    pub primary_min_p_safe: f64,
    /// Used when the primary threshold yields fewer than `target_count`.
    pub fallback_min_p_safe: f64,
    /// Lowercase market names accepted for singles.
    pub standard_markets: Vec<String>,
    /// Per-market caps keyed by lowercase market name.
    pub market_caps: BTreeMap<String, usize>,
    pub default_market_cap: usize,
    pub probability_floor: f64,
    pub value_margin: f64,
    /// Display risk bands over pSafe.
    pub low_min_p_safe: f64,
    pub medium_min_p_safe: f64,
}

impl Default for SinglesConfig {
    fn default() -> Self {
        let standard_markets = [
            "over/under",
            "goals over/under",
            "over/under 1st half",
            "over/under (reg time)",
            "asian handicap",
            "asian handicap first half",
            "asian handicap (reg time)",
            "total - home",
            "total - away",
            "home/away",
            "3way result",
            "moneyline",
            "handicap",
        ]
        .iter()
        .map(|m| m.to_string())
        .collect();

        let market_caps = [
            ("over/under", 4),
            ("asian handicap", 3),
            ("total - home", 2),
            ("total - away", 2),
        ]
        .into_iter()
        .map(|(m, cap)| (m.to_string(), cap))
        .collect();

        Self {
            target_count: 10,
            shrink_weight: 0.35,
            min_odds: 1.20,
            max_odds: 1.80,
            primary_min_p_safe: 0.70,
            fallback_min_p_safe: 0.68,
            standard_markets,
            market_caps,
            default_market_cap: 2,
            probability_floor: 0.40,
            value_margin: 0.03,
            low_min_p_safe: 0.75,
            medium_min_p_safe: 0.60,
        }
    }
}

impl SinglesConfig {
    pub fn cap_for(&self, normalised_market: &str) -> usize {
        self.market_caps
            .get(normalised_market)
            .copied()
            .unwrap_or(self.default_market_cap)
    }

    pub fn is_standard(&self, normalised_market: &str) -> bool {
        self.standard_markets.iter().any(|m| m == normalised_market)
    }
}

fn normalise(market: &str) -> String {
    market.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

pub struct SinglePickSelector {
    config: SinglesConfig,
}

impl SinglePickSelector {
    pub fn new(config: SinglesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SinglesConfig {
        &self.config
    }

    /// Blend of model and market probability.
    pub fn p_safe(&self, p_estimated: f64, p_implied: f64) -> f64 {
        let w = self.config.shrink_weight;
        w * p_estimated + (1.0 - w) * p_implied
    }

    /// Display risk for a single, replacing the upstream ladder level.
    pub fn display_risk(&self, p_safe: f64) -> RiskLevel {
        if p_safe >= self.config.low_min_p_safe {
            RiskLevel::Low
        } else if p_safe >= self.config.medium_min_p_safe {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// Ordering key: pSafe, then pEstimated, then lower odds.
    fn score(&self, q: &EvaluatedQuote) -> [f64; 3] {
        [self.p_safe(q.p_estimated, q.p_implied), q.p_estimated, -q.quote.odds]
    }

    fn beats(&self, new: &EvaluatedQuote, current: &EvaluatedQuote) -> bool {
        cmp_f64s(&self.score(new), &self.score(current)) == std::cmp::Ordering::Greater
    }

    fn is_candidate(&self, q: &EvaluatedQuote, min_p_safe: f64) -> bool {
        let c = &self.config;
        if !c.is_standard(&normalise(&q.quote.market)) {
            return false;
        }
        let odds = q.quote.odds;
        if !odds.is_finite() || odds < c.min_odds || odds > c.max_odds {
            return false;
        }
        let p_safe = self.p_safe(q.p_estimated, q.p_implied);
        if !p_safe.is_finite() || p_safe < min_p_safe {
            return false;
        }
        let required = c.probability_floor.max(1.0 / odds + c.value_margin);
        if q.p_estimated < required {
            debug!(selection = %q.key(), p_estimated = q.p_estimated, required, "Single fails value rule");
            return false;
        }
        !q.quote.sport.is_empty() && !q.quote.event_id.is_empty()
    }

    fn candidates(&self, evaluated: &[EvaluatedQuote], min_p_safe: f64) -> Vec<EvaluatedQuote> {
        let passing: Vec<EvaluatedQuote> = evaluated
            .iter()
            .filter(|q| self.is_candidate(q, min_p_safe))
            .cloned()
            .collect();
        keep_best_by(passing, EvaluatedQuote::key, |new, cur| self.beats(new, cur))
    }

    /// Select the day's single picks from evaluated quotes.
    pub fn select(&self, evaluated: &[EvaluatedQuote]) -> Vec<PickRecord> {
        let c = &self.config;

        let mut candidates = self.candidates(evaluated, c.primary_min_p_safe);
        if candidates.len() < c.target_count {
            debug!(
                primary = candidates.len(),
                target = c.target_count,
                "Relaxing single-pick threshold"
            );
            candidates = self.candidates(evaluated, c.fallback_min_p_safe);
        }

        let mut per_event = keep_best_by(
            candidates,
            |q| (q.quote.sport.clone(), q.quote.event_id.clone()),
            |new, cur| self.beats(new, cur),
        );
        per_event.sort_by(|a, b| cmp_f64s(&self.score(b), &self.score(a)));

        let mut picked: Vec<&EvaluatedQuote> = Vec::new();
        let mut used_events: HashSet<(&str, &str)> = HashSet::new();
        let mut market_counts: HashMap<String, usize> = HashMap::new();

        // Capped pass for variety.
        for q in &per_event {
            if picked.len() >= c.target_count {
                break;
            }
            let event = (q.quote.sport.as_str(), q.quote.event_id.as_str());
            if used_events.contains(&event) {
                continue;
            }
            let market = normalise(&q.quote.market);
            let count = market_counts.entry(market.clone()).or_insert(0);
            if *count >= c.cap_for(&market) {
                continue;
            }
            *count += 1;
            used_events.insert(event);
            picked.push(q);
        }

        // Fill ignoring caps, still one per event.
        for q in &per_event {
            if picked.len() >= c.target_count {
                break;
            }
            let event = (q.quote.sport.as_str(), q.quote.event_id.as_str());
            if used_events.insert(event) {
                picked.push(q);
            }
        }

        let picks: Vec<PickRecord> = picked.into_iter().map(|q| self.to_record(q)).collect();

        info!(
            candidates = per_event.len(),
            picks = picks.len(),
            "Single picks selected"
        );

        picks
    }

    fn to_record(&self, q: &EvaluatedQuote) -> PickRecord {
        let p_safe = self.p_safe(q.p_estimated, q.p_implied);
        let (stake, potential_win) = stake_and_win(q.stake, q.quote.odds);
        PickRecord {
            sport: q.quote.sport.clone(),
            event_id: q.quote.event_id.clone(),
            bookmaker: Some(q.quote.bookmaker.clone()),
            market: q.quote.market.clone(),
            selection: q.quote.selection.clone(),
            odds: q.quote.odds,
            p_implied: q.p_implied,
            p_estimated: q.p_estimated,
            p_safe: round_to(p_safe, 4),
            stake,
            potential_win,
            ev: q.ev,
            risk: RiskTag { level: self.display_risk(p_safe) },
            premium: false,
            premium_reason: None,
            premium_score: None,
            defaulted: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
