//! Named pipeline stages.
//!
//! Each stage is a pure batch transform over one cycle day: read its input
//! artifacts, compute, write its outputs wholesale. A stage whose outputs
//! already exist is skipped unless forced. Running a stage twice on the
//! same inputs writes byte-identical files.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::{decode_evaluated, decode_outcomes, decode_picks, decode_pool, decode_quotes};
use crate::engine::report::{StageStatus, StageSummary};
use crate::odds::market::MarketClassifier;
use crate::odds::probability::ProbabilityModel;
use crate::storage::{read_rows, read_rows_or_empty, write_json, Artifact, DayStore};
use crate::strategy::keep_best_by;
use crate::strategy::parlay::Leg;
use crate::strategy::pools::ValuePoolBuilder;
use crate::strategy::premium::PremiumFlagger;
use crate::strategy::singles::SinglePickSelector;
use crate::strategy::tiers::{LegSources, TierOrchestrator};
use crate::strategy::value::ValueClassifier;
use crate::types::{EngineError, EvaluatedQuote, TierOutcome};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Probability, EV and risk passes over raw quotes.
    Evaluate,
    Pools,
    Singles,
    Parlays,
    /// Premium flagging over the day's singles and parlays.
    Card,
}

impl Stage {
    /// All stages in dependency order.
    pub const ALL: [Stage; 5] = [Stage::Evaluate, Stage::Pools, Stage::Singles, Stage::Parlays, Stage::Card];

    pub fn outputs(&self) -> &'static [Artifact] {
        match self {
            Stage::Evaluate => &[Artifact::Evaluated],
            Stage::Pools => &[Artifact::InflatedPool, Artifact::EligiblePool],
            Stage::Singles => &[Artifact::Singles],
            Stage::Parlays => &[Artifact::Parlays],
            Stage::Card => &[Artifact::Card],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Evaluate => write!(f, "evaluate"),
            Stage::Pools => write!(f, "pools"),
            Stage::Singles => write!(f, "singles"),
            Stage::Parlays => write!(f, "parlays"),
            Stage::Card => write!(f, "card"),
        }
    }
}

impl FromStr for Stage {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "evaluate" => Ok(Stage::Evaluate),
            "pools" => Ok(Stage::Pools),
            "singles" => Ok(Stage::Singles),
            "parlays" => Ok(Stage::Parlays),
            "card" => Ok(Stage::Card),
            other => Err(EngineError::UnknownStage(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<S: DayStore> {
    store: S,
    stake: f64,
    model: ProbabilityModel,
    value: ValueClassifier,
    classifier: MarketClassifier,
    pools: ValuePoolBuilder,
    singles: SinglePickSelector,
    tiers: TierOrchestrator,
    premium: PremiumFlagger,
}

impl<S: DayStore> Pipeline<S> {
    pub fn new(store: S, config: &AppConfig) -> Self {
        let stake = config.engine.stake;
        let classifier = MarketClassifier::default().with_leading_rules(config.markets.extra_rules.clone());
        let tiers = TierOrchestrator::new(&config.parlays, stake);
        debug!(
            stake,
            market_rules = classifier.rules().len(),
            tiers = ?tiers.tier_names(),
            "Pipeline configured"
        );

        Self {
            store,
            stake,
            model: ProbabilityModel::new(config.probability.clone()),
            value: ValueClassifier::new(config.value.clone(), stake),
            pools: ValuePoolBuilder::new(config.pools.clone(), classifier.clone()),
            classifier,
            singles: SinglePickSelector::new(config.singles.clone()),
            tiers,
            premium: PremiumFlagger::new(config.premium.clone()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one stage for a day.
    pub fn run_stage(&self, day: &str, stage: Stage, force: bool) -> Result<StageSummary> {
        let outputs: Vec<String> = stage
            .outputs()
            .iter()
            .map(|a| self.store.location(day, *a))
            .collect();

        if !force && stage.outputs().iter().all(|a| self.store.exists(day, *a)) {
            info!(day, stage = %stage, "Outputs exist, skipping stage");
            let mut summary = StageSummary::new(day, stage, StageStatus::Skipped);
            summary.outputs = outputs;
            return Ok(summary);
        }

        let mut summary = StageSummary::new(day, stage, StageStatus::Ran);
        let result = match stage {
            Stage::Evaluate => self.evaluate(day, &mut summary),
            Stage::Pools => self.build_pools(day, &mut summary),
            Stage::Singles => self.select_singles(day, &mut summary),
            Stage::Parlays => self.build_parlays(day, &mut summary),
            Stage::Card => self.build_card(day, &mut summary),
        };
        result.with_context(|| format!("Stage {stage} failed for {day}"))?;

        summary.outputs = outputs;
        info!(summary = %summary, "Stage complete");
        Ok(summary)
    }

    /// Run every stage in order. Once a stage runs, every later stage is
    /// recomputed even if its outputs exist.
    pub fn run_all(&self, day: &str, force: bool) -> Result<Vec<StageSummary>> {
        let mut force = force;
        let mut summaries = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL {
            let summary = self.run_stage(day, stage, force)?;
            if summary.status == StageStatus::Ran {
                force = true;
            }
            summaries.push(summary);
        }

        Ok(summaries)
    }

    // -- stages -------------------------------------------------------------

    fn evaluate(&self, day: &str, summary: &mut StageSummary) -> Result<()> {
        let rows = read_rows(&self.store, day, Artifact::Quotes)?;
        let (quotes, report) = decode_quotes(&rows);
        summary.absorb(&report);

        let evaluated: Vec<EvaluatedQuote> = quotes
            .iter()
            .map(|q| self.value.evaluate(q, &self.model))
            .collect();

        summary.records_out = evaluated.len();
        write_json(&self.store, day, Artifact::Evaluated, &evaluated)
    }

    fn load_evaluated(&self, day: &str, summary: &mut StageSummary) -> Result<Vec<EvaluatedQuote>> {
        let rows = read_rows(&self.store, day, Artifact::Evaluated)?;
        let (evaluated, report) = decode_evaluated(&rows);
        summary.absorb(&report);
        Ok(evaluated)
    }

    fn build_pools(&self, day: &str, summary: &mut StageSummary) -> Result<()> {
        let evaluated = self.load_evaluated(day, summary)?;
        let pools = self.pools.build(&evaluated);

        summary.records_out = pools.inflated.len() + pools.eligible.len();
        summary.note(format!("groups={}", pools.groups_total));
        summary.note(format!("inflated={}", pools.inflated.len()));
        summary.note(format!("parlay_eligible={}", pools.eligible.len()));

        write_json(&self.store, day, Artifact::InflatedPool, &pools.inflated)?;
        write_json(&self.store, day, Artifact::EligiblePool, &pools.eligible)
    }

    fn select_singles(&self, day: &str, summary: &mut StageSummary) -> Result<()> {
        let evaluated = self.load_evaluated(day, summary)?;
        let picks = self.singles.select(&evaluated);

        summary.records_out = picks.len();
        write_json(&self.store, day, Artifact::Singles, &picks)
    }

    /// Load a pool as search legs, deduplicated by key keeping the highest edge.
    fn load_legs(&self, day: &str, artifact: Artifact, summary: &mut StageSummary) -> Result<Vec<Leg>> {
        let rows = read_rows(&self.store, day, artifact)?;
        let (decoded, report) = decode_pool(&rows, |market| {
            let class = self.classifier.classify(market);
            (class.market_type, class.risk)
        });
        summary.absorb(&report);

        let before = decoded.len();
        let decoded = keep_best_by(
            decoded,
            |d| d.record.key(),
            |new, cur| new.record.edge > cur.record.edge,
        );
        if decoded.len() < before {
            warn!(day, artifact = %artifact, duplicates = before - decoded.len(), "Duplicate pool keys collapsed");
            summary.note(format!("{artifact}: {} duplicates collapsed", before - decoded.len()));
        }

        Ok(decoded
            .into_iter()
            .map(|d| {
                let mut leg = Leg::from_pool(&d.record, self.stake);
                leg.record.defaulted = d.defaulted;
                leg
            })
            .collect())
    }

    fn build_parlays(&self, day: &str, summary: &mut StageSummary) -> Result<()> {
        let inflated = self.load_legs(day, Artifact::InflatedPool, summary)?;
        let eligible = self.load_legs(day, Artifact::EligiblePool, summary)?;

        let rows = read_rows_or_empty(&self.store, day, Artifact::Singles)?;
        let (singles, report) = decode_picks(&rows);
        summary.absorb(&report);

        let outcomes = self.tiers.build_all(&LegSources { inflated, eligible, singles });

        summary.records_out = outcomes.iter().filter(|o| o.parlay().is_some()).count();
        for outcome in &outcomes {
            if let TierOutcome::Absent { tier, .. } = outcome {
                summary.note(format!("{tier}: absent"));
            }
        }

        write_json(&self.store, day, Artifact::Parlays, &outcomes)
    }

    fn build_card(&self, day: &str, summary: &mut StageSummary) -> Result<()> {
        let rows = read_rows(&self.store, day, Artifact::Singles)?;
        let (singles, report) = decode_picks(&rows);
        summary.absorb(&report);

        let rows = read_rows(&self.store, day, Artifact::Parlays)?;
        let (outcomes, report) = decode_outcomes(&rows);
        summary.absorb(&report);

        let card = self.premium.apply(day, singles, &outcomes);
        summary.records_out = card.singles.len() + card.parlays.len();
        summary.note(card.premium_message.clone());

        write_json(&self.store, day, Artifact::Card, &card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!(" Pools ".parse::<Stage>().unwrap(), Stage::Pools);
        assert!(matches!("settle".parse::<Stage>(), Err(EngineError::UnknownStage(s)) if s == "settle"));
    }

    #[test]
    fn test_every_artifact_has_one_producer() {
        let mut produced: Vec<Artifact> = Stage::ALL.iter().flat_map(|s| s.outputs().iter().copied()).collect();
        produced.sort();
        let before = produced.len();
        produced.dedup();
        assert_eq!(produced.len(), before);
        assert!(!produced.contains(&Artifact::Quotes));
    }
}
