//! End-to-end pipeline runs over a fixed quote snapshot.
//!
//! The fixture holds two short-priced totals (E1, E2) quoted by four books
//! and four longer-priced totals (E3..E6) quoted by six books, plus two
//! malformed rows. Under the default configuration only the principal tier
//! can be built, and only on the fallback margin.

use rust_decimal_macros::dec;
use serde_json::{json, Value};

use slipforge::config::AppConfig;
use slipforge::engine::{Pipeline, Stage, StageStatus};
use slipforge::storage::{Artifact, DayStore, FsStore};
use slipforge::types::{DayCard, EngineError, MarginAttempt, PoolSource, RiskLevel, TierOutcome};

use crate::memory_store::MemoryStore;

const DAY: &str = "2026-03-14";

fn quote(event: &str, bookmaker: &str, odds: Value) -> Value {
    json!({
        "sport": "football",
        "eventId": event,
        "bookmaker": bookmaker,
        "market": "Over/Under",
        "selection": "Over 2.5",
        "odds": odds,
    })
}

fn fixture_quotes() -> Value {
    let mut rows = Vec::new();
    for event in ["E1", "E2"] {
        rows.push(quote(event, "b1", json!(1.50)));
        rows.push(quote(event, "b2", json!("1.48")));
        rows.push(quote(event, "b3", json!(1.47)));
        rows.push(quote(event, "b4", json!(1.45)));
    }
    for event in ["E3", "E4", "E5", "E6"] {
        for (book, odds) in [("b1", 2.00), ("b2", 1.95), ("b3", 1.92), ("b4", 1.90), ("b5", 1.90), ("b6", 1.88)] {
            rows.push(quote(event, book, json!(odds)));
        }
    }
    // Malformed: odds not above 1.0, missing event id.
    rows.push(quote("E9", "b1", json!("1.0")));
    rows.push(json!({"sport": "football", "bookmaker": "b1", "market": "Over/Under", "selection": "Over 2.5", "odds": 1.7}));
    Value::Array(rows)
}

fn seeded_pipeline(config: &AppConfig) -> Pipeline<MemoryStore> {
    let store = MemoryStore::new();
    store.put_json(DAY, Artifact::Quotes, &fixture_quotes());
    Pipeline::new(store, config)
}

/// Relaxed single-pick margin and a narrower favourite band.
fn relaxed_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.singles.value_margin = 0.01;
    cfg.probability.favourite_below = 1.30;
    cfg
}

fn outcomes(store: &MemoryStore) -> Vec<TierOutcome> {
    serde_json::from_value(store.get_json(DAY, Artifact::Parlays)).unwrap()
}

fn card(store: &MemoryStore) -> DayCard {
    serde_json::from_value(store.get_json(DAY, Artifact::Card)).unwrap()
}

fn is_engine_error(err: &anyhow::Error, check: impl Fn(&EngineError) -> bool) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<EngineError>())
        .any(check)
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[test]
fn test_run_all_produces_every_artifact() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    let summaries = pipeline.run_all(DAY, false).unwrap();

    let stages: Vec<Stage> = summaries.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    assert!(summaries.iter().all(|s| s.status == StageStatus::Ran));

    for artifact in [
        Artifact::Evaluated,
        Artifact::InflatedPool,
        Artifact::EligiblePool,
        Artifact::Singles,
        Artifact::Parlays,
        Artifact::Card,
    ] {
        assert!(pipeline.store().exists(DAY, artifact), "{artifact} not written");
    }

    let evaluate = &summaries[0];
    assert_eq!(evaluate.records_in, 34);
    assert_eq!(evaluate.malformed_skipped, 2);
    assert_eq!(evaluate.records_out, 32);

    let pools = &summaries[1];
    assert_eq!(pools.records_out, 10);
    assert!(pools.notes.contains(&"groups=6".to_string()));
    assert!(pools.notes.contains(&"inflated=4".to_string()));
    assert!(pools.notes.contains(&"parlay_eligible=6".to_string()));
    assert_eq!(pools.outputs, vec![
        format!("memory://{DAY}/pools/inflated.json"),
        format!("memory://{DAY}/pools/parlay_eligible.json"),
    ]);
}

#[test]
fn test_evaluated_quotes_carry_model_outputs() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_stage(DAY, Stage::Evaluate, false).unwrap();

    let rows = pipeline.store().get_json(DAY, Artifact::Evaluated);
    let first = &rows[0];
    assert_eq!(first["eventId"], "E1");
    assert!((first["pImplied"].as_f64().unwrap() - 0.6667).abs() < 1e-9);
    assert!((first["pEstimated"].as_f64().unwrap() - 0.6867).abs() < 1e-9);
    assert!((first["stake"].as_f64().unwrap() - 50.0).abs() < 1e-9);

    // The string-encoded price was accepted.
    assert!((rows[1]["odds"].as_f64().unwrap() - 1.48).abs() < 1e-9);
}

#[test]
fn test_principal_built_on_fallback_margin() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    let summaries = pipeline.run_all(DAY, false).unwrap();

    let outcomes = outcomes(pipeline.store());
    let tiers: Vec<&str> = outcomes.iter().map(TierOutcome::tier).collect();
    assert_eq!(tiers, vec!["marketing_4_legs", "marketing_3_legs", "principal_2_legs"]);

    // Long-priced legs are too unlikely for the marketing floors.
    for outcome in &outcomes[..2] {
        match outcome {
            TierOutcome::Absent { sources_tried, .. } => {
                assert_eq!(sources_tried, &vec![PoolSource::Inflated, PoolSource::ParlayEligible]);
            }
            other => panic!("expected absent tier, got {other:?}"),
        }
    }

    let principal = outcomes[2].parlay().expect("principal tier built");
    assert_eq!(principal.source, PoolSource::ParlayEligible);
    assert_eq!(principal.margin, MarginAttempt::Fallback);
    assert_eq!(principal.legs.len(), 2);
    assert_eq!(principal.legs[0].event_id, "E1");
    assert_eq!(principal.legs[1].event_id, "E2");
    assert!(principal.legs.iter().all(|l| l.bookmaker.is_none()));
    assert!((principal.combined_odds - 2.25).abs() < 1e-9);
    assert!((principal.combined_probability - 0.471557).abs() < 1e-9);
    assert!((principal.expected_profit - 62.5).abs() < 1e-9);
    assert!((principal.expected_edge_sum - 0.04).abs() < 1e-9);
    assert_eq!(principal.consensus_score_sum, 0);
    assert_eq!(principal.stake, dec!(50));
    assert_eq!(principal.potential_win, dec!(112.50));

    let parlays = &summaries[3];
    assert_eq!(parlays.records_out, 1);
    assert!(parlays.notes.contains(&"marketing_4_legs: absent".to_string()));
}

#[test]
fn test_card_flags_premium_bets() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    let card = card(pipeline.store());
    assert_eq!(card.day, DAY);
    assert!(card.singles.is_empty());
    assert_eq!(card.parlays.len(), 1);
    assert_eq!(card.absent_tiers, vec!["marketing_4_legs", "marketing_3_legs"]);
    assert_eq!(card.premium_count, 1);
    assert!(card.premium_message.starts_with("1 premium selections today."));

    let parlay = &card.parlays[0];
    assert!(parlay.premium);
    assert!(parlay.premium_reason.as_deref().unwrap().contains("Coherent combination"));
    assert!(parlay.premium_score.is_some());
}

#[test]
fn test_relaxed_margin_selects_singles() {
    let pipeline = seeded_pipeline(&relaxed_config());
    let summaries = pipeline.run_all(DAY, false).unwrap();
    assert_eq!(summaries[2].records_out, 2);

    let card = card(pipeline.store());
    assert_eq!(card.singles.len(), 2);
    let events: Vec<&str> = card.singles.iter().map(|p| p.event_id.as_str()).collect();
    assert_eq!(events, vec!["E1", "E2"]);

    for pick in &card.singles {
        // The shortest price has the highest blended probability.
        assert_eq!(pick.bookmaker.as_deref(), Some("b4"));
        assert!((pick.odds - 1.45).abs() < 1e-9);
        assert!((pick.p_safe - 0.6967).abs() < 1e-4);
        assert_eq!(pick.risk.level, RiskLevel::Medium);
        assert_eq!(pick.stake, dec!(50));
    }

    // Three bets on the card: quota is clamped to the bet count.
    assert_eq!(card.parlays.len(), 1);
    assert_eq!(card.premium_count, 3);
    assert!(card.singles.iter().all(|p| p.premium));
    assert!(card.parlays[0].premium);
}

#[test]
fn test_no_selection_reused_across_tiers() {
    let pipeline = seeded_pipeline(&relaxed_config());
    pipeline.run_all(DAY, false).unwrap();

    let mut seen = std::collections::HashSet::new();
    for outcome in outcomes(pipeline.store()) {
        if let Some(parlay) = outcome.parlay() {
            let mut events = std::collections::HashSet::new();
            for leg in &parlay.legs {
                assert!(seen.insert(leg.key()), "selection reused: {}", leg.key());
                assert!(events.insert(leg.event_id.clone()), "event repeated within a parlay");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Idempotence, skipping and cascading
// ---------------------------------------------------------------------------

#[test]
fn test_forced_rerun_is_byte_identical() {
    let pipeline = seeded_pipeline(&relaxed_config());
    pipeline.run_all(DAY, false).unwrap();
    let first = pipeline.store().snapshot(DAY);

    let summaries = pipeline.run_all(DAY, true).unwrap();
    assert!(summaries.iter().all(|s| s.status == StageStatus::Ran));
    assert_eq!(pipeline.store().snapshot(DAY), first);

    let card = pipeline.store().get_bytes(DAY, Artifact::Card).unwrap();
    assert_eq!(card.last(), Some(&b'\n'));
}

#[test]
fn test_existing_outputs_are_skipped() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();
    let first = pipeline.store().snapshot(DAY);

    let summaries = pipeline.run_all(DAY, false).unwrap();
    assert!(summaries.iter().all(|s| s.status == StageStatus::Skipped));
    assert!(summaries.iter().all(|s| s.records_in == 0 && s.records_out == 0));
    assert_eq!(pipeline.store().snapshot(DAY), first);
}

#[test]
fn test_recomputed_stage_cascades_downstream() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    pipeline.store().remove(DAY, Artifact::Singles);
    let summaries = pipeline.run_all(DAY, false).unwrap();

    let statuses: Vec<StageStatus> = summaries.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StageStatus::Skipped,
            StageStatus::Skipped,
            StageStatus::Ran,
            StageStatus::Ran,
            StageStatus::Ran,
        ]
    );
}

#[test]
fn test_partial_outputs_rerun_stage() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    // One of the two pool files missing is enough to recompute.
    pipeline.store().remove(DAY, Artifact::EligiblePool);
    let summary = pipeline.run_stage(DAY, Stage::Pools, false).unwrap();
    assert_eq!(summary.status, StageStatus::Ran);
    assert!(pipeline.store().exists(DAY, Artifact::EligiblePool));
}

// ---------------------------------------------------------------------------
// Failures and degraded inputs
// ---------------------------------------------------------------------------

#[test]
fn test_missing_quotes_is_fatal() {
    let pipeline = Pipeline::new(MemoryStore::new(), &AppConfig::default());
    let err = pipeline.run_all(DAY, false).unwrap_err();
    assert!(is_engine_error(&err, |e| matches!(
        e,
        EngineError::MissingSnapshot { artifact, .. } if artifact == "quotes.json"
    )));
    assert!(pipeline.store().snapshot(DAY).is_empty());
}

#[test]
fn test_parlays_require_pools() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_stage(DAY, Stage::Evaluate, false).unwrap();

    let err = pipeline.run_stage(DAY, Stage::Parlays, false).unwrap_err();
    assert!(is_engine_error(&err, |e| matches!(
        e,
        EngineError::MissingSnapshot { artifact, .. } if artifact == "pools/inflated.json"
    )));
    assert!(!pipeline.store().exists(DAY, Artifact::Parlays));
}

#[test]
fn test_parlays_tolerate_missing_singles() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_stage(DAY, Stage::Evaluate, false).unwrap();
    pipeline.run_stage(DAY, Stage::Pools, false).unwrap();

    let summary = pipeline.run_stage(DAY, Stage::Parlays, false).unwrap();
    assert_eq!(summary.records_out, 1);
}

#[test]
fn test_non_array_snapshot_is_malformed() {
    let store = MemoryStore::new();
    store.put_json(DAY, Artifact::Quotes, &json!({"quotes": []}));
    let pipeline = Pipeline::new(store, &AppConfig::default());

    let err = pipeline.run_stage(DAY, Stage::Evaluate, false).unwrap_err();
    assert!(is_engine_error(&err, |e| matches!(e, EngineError::MalformedSnapshot { .. })));
}

#[test]
fn test_defaulted_pool_fields_are_reported() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    let mut rows = pipeline.store().get_json(DAY, Artifact::EligiblePool);
    for row in rows.as_array_mut().unwrap() {
        if row["eventId"] == "E1" || row["eventId"] == "E2" {
            let fields = row.as_object_mut().unwrap();
            fields.remove("consensus");
            fields.remove("marketType");
            fields.insert("riskLevel".into(), json!("UNRATED"));
        } else if row["eventId"] == "E3" {
            row["probability"] = json!(-0.2);
        }
    }
    pipeline.store().put_json(DAY, Artifact::EligiblePool, &rows);

    let summary = pipeline.run_stage(DAY, Stage::Parlays, true).unwrap();
    assert_eq!(summary.defaulted_values, 7);
    assert_eq!(summary.malformed_skipped, 0);

    let principal = outcomes(pipeline.store())[2].parlay().cloned().unwrap();
    for leg in &principal.legs {
        assert_eq!(
            leg.defaulted,
            vec!["consensus".to_string(), "marketType".to_string(), "riskLevel".to_string()]
        );
        assert_eq!(leg.risk.level, RiskLevel::High);
    }
}

#[test]
fn test_duplicate_pool_keys_collapse_to_highest_edge() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    let mut rows = pipeline.store().get_json(DAY, Artifact::EligiblePool);
    let mut weaker = rows[0].clone();
    weaker["edge"] = json!(0.001);
    rows.as_array_mut().unwrap().push(weaker);
    pipeline.store().put_json(DAY, Artifact::EligiblePool, &rows);

    let summary = pipeline.run_stage(DAY, Stage::Parlays, true).unwrap();
    assert!(summary.notes.iter().any(|n| n.contains("1 duplicates collapsed")));

    let principal = outcomes(pipeline.store())[2].parlay().cloned().unwrap();
    assert!((principal.expected_edge_sum - 0.04).abs() < 1e-9);
}

#[test]
fn test_failed_write_keeps_previous_outputs() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();
    let before = pipeline.store().snapshot(DAY);

    pipeline.store().set_write_error("disk full");
    let err = pipeline.run_stage(DAY, Stage::Card, true).unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    assert_eq!(pipeline.store().snapshot(DAY), before);
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

#[test]
fn test_filesystem_run() {
    let mut root = std::env::temp_dir();
    root.push(format!("slipforge_it_{}", uuid::Uuid::new_v4()));

    let store = FsStore::new(&root);
    let quotes = serde_json::to_vec_pretty(&fixture_quotes()).unwrap();
    store.write(DAY, Artifact::Quotes, &quotes).unwrap();

    let pipeline = Pipeline::new(store, &AppConfig::default());
    pipeline.run_all(DAY, false).unwrap();

    let card_path = root.join(DAY).join("picks").join("card.json");
    assert!(card_path.is_file());
    assert!(root.join(DAY).join("pools").join("parlay_eligible.json").is_file());

    let card: DayCard = serde_json::from_slice(&std::fs::read(&card_path).unwrap()).unwrap();
    assert_eq!(card.parlays.len(), 1);

    let again = pipeline.run_all(DAY, false).unwrap();
    assert!(again.iter().all(|s| s.status == StageStatus::Skipped));
    assert_eq!(again[4].outputs, vec![card_path.display().to_string()]);

    let _ = std::fs::remove_dir_all(&root);
}
