//! Snapshot row decoding.
//!
//! Snapshots arrive as JSON arrays of loosely-typed objects. Rows with a
//! missing identifier or unusable odds are skipped and counted; optional
//! numeric fields fall back to a default and the field name is recorded
//! so a defaulted value is never mistaken for a computed one.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::{
    Consensus, EvaluatedQuote, MarketRisk, PickRecord, PoolEntry, Quote, TierOutcome,
};

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// A numeric field read from a loosely-typed row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// The row carried a usable number (or numeric string).
    Parsed(f64),
    /// The field was missing or unparseable; holds the fallback value.
    Defaulted(f64),
}

impl Numeric {
    pub fn value(&self) -> f64 {
        match self {
            Numeric::Parsed(v) | Numeric::Defaulted(v) => *v,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Numeric::Defaulted(_))
    }
}

/// Read a finite number from a JSON value, accepting numeric strings.
pub fn as_f64(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Read a number, falling back to `default` when absent or unparseable.
pub fn number_or(value: Option<&Value>, default: f64) -> Numeric {
    match as_f64(value) {
        Some(v) => Numeric::Parsed(v),
        None => Numeric::Defaulted(default),
    }
}

/// Read a non-empty, trimmed identifier. Numeric ids are stringified.
pub fn as_ident(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

// ---------------------------------------------------------------------------
// Decode report
// ---------------------------------------------------------------------------

/// Bookkeeping for one decoding pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    pub total: usize,
    pub skipped: usize,
    pub defaulted: usize,
}

impl DecodeReport {
    fn skip(&mut self, artifact: &str, index: usize, reason: &str) {
        self.skipped += 1;
        warn!(artifact, index, reason, "Skipping malformed record");
    }
}

/// A decoded row plus the names of fields that took a default.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub record: T,
    pub defaulted: Vec<String>,
}

// ---------------------------------------------------------------------------
// Row decoders
// ---------------------------------------------------------------------------

/// Decode raw quotes. Identifiers and odds (> 1.0) are required.
pub fn decode_quotes(rows: &[Value]) -> (Vec<Quote>, DecodeReport) {
    let mut report = DecodeReport { total: rows.len(), ..Default::default() };
    let mut quotes = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let ids = (
            as_ident(row.get("sport")),
            as_ident(row.get("eventId")),
            as_ident(row.get("bookmaker")),
            as_ident(row.get("market")),
            as_ident(row.get("selection")),
        );
        let (Some(sport), Some(event_id), Some(bookmaker), Some(market), Some(selection)) = ids
        else {
            report.skip("quotes", i, "missing identifier");
            continue;
        };
        let Some(odds) = as_f64(row.get("odds")) else {
            report.skip("quotes", i, "non-numeric odds");
            continue;
        };
        if odds <= 1.0 {
            report.skip("quotes", i, "odds not above 1.0");
            continue;
        }
        quotes.push(Quote { sport, event_id, bookmaker, market, selection, odds });
    }

    (quotes, report)
}

/// Decode rows that map onto a typed record, skipping rows that fail to
/// deserialise or that `check` rejects.
fn decode_typed<T, F>(rows: &[Value], artifact: &str, check: F) -> (Vec<T>, DecodeReport)
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), &'static str>,
{
    let mut report = DecodeReport { total: rows.len(), ..Default::default() };
    let mut out = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        match T::deserialize(row) {
            Ok(record) => match check(&record) {
                Ok(()) => out.push(record),
                Err(reason) => report.skip(artifact, i, reason),
            },
            Err(e) => report.skip(artifact, i, &e.to_string()),
        }
    }

    (out, report)
}

/// Decode evaluated quotes written by the evaluate stage.
pub fn decode_evaluated(rows: &[Value]) -> (Vec<EvaluatedQuote>, DecodeReport) {
    decode_typed(rows, "evaluated", |eq: &EvaluatedQuote| {
        let q = &eq.quote;
        let ids = [&q.sport, &q.event_id, &q.bookmaker, &q.market, &q.selection];
        if ids.iter().any(|id| id.trim().is_empty()) {
            Err("missing identifier")
        } else if q.odds <= 1.0 {
            Err("odds not above 1.0")
        } else {
            Ok(())
        }
    })
}

/// Decode single picks written by the singles stage.
pub fn decode_picks(rows: &[Value]) -> (Vec<PickRecord>, DecodeReport) {
    decode_typed(rows, "singles", |p: &PickRecord| {
        if p.odds <= 1.0 {
            Err("odds not above 1.0")
        } else if p.event_id.trim().is_empty() {
            Err("missing identifier")
        } else {
            Ok(())
        }
    })
}

/// Decode per-tier parlay outcomes written by the parlays stage.
pub fn decode_outcomes(rows: &[Value]) -> (Vec<TierOutcome>, DecodeReport) {
    decode_typed(rows, "parlays", |_: &TierOutcome| Ok(()))
}

/// Decode pool entries leniently.
///
/// Identifiers and odds are required. `probability` and `edge` default to
/// 0.0 and an out-of-range probability is clamped to [0, 1]; `consensus`
/// defaults to low and `riskLevel` to HIGH; a missing `marketType` or
/// `marketRisk` is resolved by `classify_risk` from the market name. Every
/// fallback is recorded.
pub fn decode_pool<F>(rows: &[Value], classify_risk: F) -> (Vec<Decoded<PoolEntry>>, DecodeReport)
where
    F: Fn(&str) -> (crate::types::MarketType, MarketRisk),
{
    let mut report = DecodeReport { total: rows.len(), ..Default::default() };
    let mut out = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let ids = (
            as_ident(row.get("sport")),
            as_ident(row.get("eventId")),
            as_ident(row.get("market")),
            as_ident(row.get("selection")),
        );
        let (Some(sport), Some(event_id), Some(market), Some(selection)) = ids else {
            report.skip("pool", i, "missing identifier");
            continue;
        };
        let Some(odds) = as_f64(row.get("odds")).filter(|o| *o > 1.0) else {
            report.skip("pool", i, "unusable odds");
            continue;
        };

        let mut defaulted = Vec::new();
        let mut take = |name: &str, default: f64| {
            let n = number_or(row.get(name), default);
            if n.is_defaulted() {
                defaulted.push(name.to_string());
            }
            n.value()
        };
        let raw_probability = take("probability", 0.0);
        let edge = take("edge", 0.0);
        let ev = take("ev", 0.0);
        let best_vs_second = take("bestVsSecond", 0.0);
        let best_vs_median = take("bestVsMedian", 0.0);
        let bookmaker_count = take("bookmakerCount", 0.0).max(0.0) as usize;

        let probability = raw_probability.clamp(0.0, 1.0);
        if probability != raw_probability {
            defaulted.push("probability".to_string());
        }

        let consensus = match row.get("consensus").and_then(Value::as_str).map(str::parse) {
            Some(Ok(c)) => c,
            _ => {
                defaulted.push("consensus".to_string());
                Consensus::Low
            }
        };

        let (classified_type, classified_risk) = classify_risk(&market);
        let market_risk = match row.get("marketRisk").and_then(Value::as_str).map(str::parse) {
            Some(Ok(r)) => r,
            _ => {
                defaulted.push("marketRisk".to_string());
                classified_risk
            }
        };
        let market_type = match row.get("marketType").cloned().map(serde_json::from_value) {
            Some(Ok(t)) => t,
            _ => {
                defaulted.push("marketType".to_string());
                classified_type
            }
        };
        let risk_level = match row.get("riskLevel").cloned().map(serde_json::from_value) {
            Some(Ok(level)) => level,
            _ => {
                defaulted.push("riskLevel".to_string());
                crate::types::RiskLevel::High
            }
        };
        let inflated = match row.get("inflated").and_then(Value::as_bool) {
            Some(flag) => flag,
            None => {
                defaulted.push("inflated".to_string());
                false
            }
        };

        report.defaulted += defaulted.len();
        out.push(Decoded {
            record: PoolEntry {
                sport,
                event_id,
                market,
                selection,
                odds,
                probability,
                edge,
                ev,
                risk_level,
                bookmaker_count,
                best_vs_second,
                best_vs_median,
                consensus,
                market_type,
                market_risk,
                inflated,
            },
            defaulted,
        });
    }

    (out, report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
