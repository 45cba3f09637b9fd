//! Shared types for the SLIPFORGE engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that odds, strategy, and engine
//! modules can depend on them without circular references. Every record
//! that is persisted serialises with camelCase field names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Quotes and identity
// ---------------------------------------------------------------------------

/// One bookmaker's price for one selection. Immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub sport: String,
    pub event_id: String,
    pub bookmaker: String,
    pub market: String,
    pub selection: String,
    /// Decimal odds, always > 1.0.
    pub odds: f64,
}

impl Quote {
    pub fn key(&self) -> SelectionKey {
        SelectionKey::new(&self.sport, &self.event_id, &self.market, &self.selection)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} / {} @ {:.2} ({})",
            self.sport, self.event_id, self.market, self.selection, self.odds, self.bookmaker,
        )
    }
}

/// Identity of a selection: (sport, eventId, market, selection).
///
/// Unique within any persisted pool and used to exclude legs across
/// parlay tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionKey {
    pub sport: String,
    pub event_id: String,
    pub market: String,
    pub selection: String,
}

impl SelectionKey {
    pub fn new(sport: &str, event_id: &str, market: &str, selection: &str) -> Self {
        Self {
            sport: sport.to_string(),
            event_id: event_id.to_string(),
            market: market.to_string(),
            selection: selection.to_string(),
        }
    }

    /// Event identity (sport, eventId).
    pub fn event(&self) -> (&str, &str) {
        (&self.sport, &self.event_id)
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.sport, self.event_id, self.market, self.selection)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Value/risk level assigned by the EV rule ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Extreme,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Extreme => write!(f, "EXTREME"),
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EXTREME" => Ok(RiskLevel::Extreme),
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(anyhow::anyhow!("Unknown risk level: {s}")),
        }
    }
}

/// Structural market family, decided from the market's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Exotics,
    Totals,
    Handicap,
    Result,
    Props,
    Other,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketType::Exotics => "exotics",
            MarketType::Totals => "totals",
            MarketType::Handicap => "handicap",
            MarketType::Result => "result",
            MarketType::Props => "props",
            MarketType::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Structural risk tier of a market; picks the stability thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRisk {
    Low,
    Medium,
    High,
    Extreme,
}

impl MarketRisk {
    /// All tiers (useful for iteration).
    pub const ALL: &'static [MarketRisk] = &[
        MarketRisk::Low,
        MarketRisk::Medium,
        MarketRisk::High,
        MarketRisk::Extreme,
    ];
}

impl fmt::Display for MarketRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRisk::Low => "low",
            MarketRisk::Medium => "medium",
            MarketRisk::High => "high",
            MarketRisk::Extreme => "extreme",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MarketRisk {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(MarketRisk::Low),
            "medium" => Ok(MarketRisk::Medium),
            "high" => Ok(MarketRisk::High),
            "extreme" => Ok(MarketRisk::Extreme),
            _ => Err(anyhow::anyhow!("Unknown market risk: {s}")),
        }
    }
}

/// How many bookmakers agree on a selection. Used as a ranking tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Consensus {
    #[default]
    Low,
    Medium,
    High,
}

impl Consensus {
    /// Score contributed to a parlay's consensus sum.
    pub fn rank(&self) -> u32 {
        match self {
            Consensus::High => 2,
            Consensus::Medium => 1,
            Consensus::Low => 0,
        }
    }
}

impl std::str::FromStr for Consensus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Consensus::High),
            "medium" => Ok(Consensus::Medium),
            "low" => Ok(Consensus::Low),
            _ => Err(anyhow::anyhow!("Unknown consensus label: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluated quotes
// ---------------------------------------------------------------------------

/// Output of the risk ladder for one priced selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub delta_p: f64,
    pub ev_margin: f64,
}

/// A quote after the probability, EV and risk passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedQuote {
    #[serde(flatten)]
    pub quote: Quote,
    pub p_implied: f64,
    pub p_estimated: f64,
    pub stake: f64,
    pub ev: f64,
    pub risk: RiskAssessment,
}

impl EvaluatedQuote {
    pub fn key(&self) -> SelectionKey {
        self.quote.key()
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A classified selection as persisted in the `inflated` and
/// `parlay_eligible` pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntry {
    pub sport: String,
    pub event_id: String,
    pub market: String,
    pub selection: String,
    /// Best available odds.
    pub odds: f64,
    /// Estimated probability of the best-odds quote.
    pub probability: f64,
    /// probability − 1/odds.
    pub edge: f64,
    pub ev: f64,
    pub risk_level: RiskLevel,
    pub bookmaker_count: usize,
    pub best_vs_second: f64,
    pub best_vs_median: f64,
    pub consensus: Consensus,
    pub market_type: MarketType,
    pub market_risk: MarketRisk,
    pub inflated: bool,
}

impl PoolEntry {
    pub fn key(&self) -> SelectionKey {
        SelectionKey::new(&self.sport, &self.event_id, &self.market, &self.selection)
    }
}

impl fmt::Display for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.2} p={:.1}% edge={:+.2}% books={} [{}/{}]",
            self.key(),
            self.odds,
            self.probability * 100.0,
            self.edge * 100.0,
            self.bookmaker_count,
            self.market_type,
            self.market_risk,
        )
    }
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// Display risk attached to an output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTag {
    pub level: RiskLevel,
}

/// A single bet (or one leg of a parlay) in display-ready form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickRecord {
    pub sport: String,
    pub event_id: String,
    pub bookmaker: Option<String>,
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub p_implied: f64,
    pub p_estimated: f64,
    pub p_safe: f64,
    pub stake: Decimal,
    pub potential_win: Decimal,
    pub ev: f64,
    pub risk: RiskTag,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub premium_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_score: Option<f64>,
    /// Names of numeric fields that fell back to a default while decoding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<String>,
}

impl PickRecord {
    pub fn key(&self) -> SelectionKey {
        SelectionKey::new(&self.sport, &self.event_id, &self.market, &self.selection)
    }
}

impl fmt::Display for PickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.2} | safe={:.1}% est={:.1}% | stake={} win={} | {}{}",
            self.key(),
            self.odds,
            self.p_safe * 100.0,
            self.p_estimated * 100.0,
            self.stake,
            self.potential_win,
            self.risk.level,
            if self.premium { " ★" } else { "" },
        )
    }
}

/// Which leg source a parlay tier was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    Inflated,
    ParlayEligible,
    Singles,
}

impl fmt::Display for PoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSource::Inflated => write!(f, "inflated"),
            PoolSource::ParlayEligible => write!(f, "parlay_eligible"),
            PoolSource::Singles => write!(f, "singles"),
        }
    }
}

/// Which value margin admitted a parlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginAttempt {
    Primary,
    Fallback,
}

impl fmt::Display for MarginAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginAttempt::Primary => write!(f, "primary"),
            MarginAttempt::Fallback => write!(f, "fallback"),
        }
    }
}

/// The winning combination for one parlay tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParlayRecord {
    /// Tier label, e.g. `principal_2_legs`.
    #[serde(rename = "type")]
    pub tier: String,
    pub legs: Vec<PickRecord>,
    pub combined_odds: f64,
    pub combined_probability: f64,
    pub stake: Decimal,
    pub potential_win: Decimal,
    pub expected_profit: f64,
    pub expected_edge_sum: f64,
    pub consensus_score_sum: u32,
    pub margin: MarginAttempt,
    pub source: PoolSource,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub premium_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_score: Option<f64>,
}

impl fmt::Display for ParlayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} legs, {}) odds={:.2} p={:.1}% profit={:.2} edge_sum={:.4} [{}]",
            self.tier,
            self.legs.len(),
            self.source,
            self.combined_odds,
            self.combined_probability * 100.0,
            self.expected_profit,
            self.expected_edge_sum,
            self.margin,
        )
    }
}

/// Per-tier result of a parlay build. An absent tier is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TierOutcome {
    Built(ParlayRecord),
    Absent {
        tier: String,
        /// Sources that were searched, in order.
        #[serde(rename = "sourcesTried")]
        sources_tried: Vec<PoolSource>,
    },
}

impl TierOutcome {
    pub fn tier(&self) -> &str {
        match self {
            TierOutcome::Built(p) => &p.tier,
            TierOutcome::Absent { tier, .. } => tier,
        }
    }

    pub fn parlay(&self) -> Option<&ParlayRecord> {
        match self {
            TierOutcome::Built(p) => Some(p),
            TierOutcome::Absent { .. } => None,
        }
    }
}

/// The day's output artifact: every selected bet plus premium flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCard {
    pub day: String,
    pub singles: Vec<PickRecord>,
    pub parlays: Vec<ParlayRecord>,
    pub absent_tiers: Vec<String>,
    pub premium_count: usize,
    pub premium_message: String,
}

impl fmt::Display for DayCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Card {} | singles={} parlays={} absent={} premium={}",
            self.day,
            self.singles.len(),
            self.parlays.len(),
            self.absent_tiers.len(),
            self.premium_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SLIPFORGE.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Missing input snapshot for {day}: {artifact}")]
    MissingSnapshot { day: String, artifact: String },

    #[error("Malformed snapshot {artifact}: {message}")]
    MalformedSnapshot { artifact: String, message: String },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
