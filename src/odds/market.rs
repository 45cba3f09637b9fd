//! Market classification.
//!
//! Maps a market's free-text display name to a structural family and a
//! risk tier. The mapping is an ordered table: the first rule whose
//! keyword groups all match wins, and unmatched markets fall through to
//! the conservative `other/high` default. New markets are new rows.

use serde::{Deserialize, Serialize};

use crate::types::{MarketRisk, MarketType};

/// Sub-period phrasing that makes a totals market more volatile.
const SUB_PERIOD: &[&str] = &["1st", "2nd", "3rd", "quarter", "period", "half"];

/// One row of the classification table.
///
/// `all_of` is a list of keyword groups; the rule matches when every group
/// has at least one keyword contained in the normalised market name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRule {
    pub label: String,
    pub all_of: Vec<Vec<String>>,
    pub market_type: MarketType,
    pub risk: MarketRisk,
}

impl MarketRule {
    pub fn new(
        label: &str,
        all_of: &[&[&str]],
        market_type: MarketType,
        risk: MarketRisk,
    ) -> Self {
        Self {
            label: label.to_string(),
            all_of: all_of
                .iter()
                .map(|group| group.iter().map(|k| k.to_lowercase()).collect())
                .collect(),
            market_type,
            risk,
        }
    }

    /// Whether this rule applies to an already-normalised market name.
    pub fn matches(&self, normalised: &str) -> bool {
        !self.all_of.is_empty()
            && self
                .all_of
                .iter()
                .all(|group| group.iter().any(|k| normalised.contains(k.as_str())))
    }
}

/// Result of classifying a market name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClass {
    pub market_type: MarketType,
    pub risk: MarketRisk,
}

/// Ordered, table-driven market classifier.
#[derive(Debug, Clone)]
pub struct MarketClassifier {
    rules: Vec<MarketRule>,
}

impl Default for MarketClassifier {
    fn default() -> Self {
        Self::new(Self::builtin_rules())
    }
}

impl MarketClassifier {
    pub fn new(rules: Vec<MarketRule>) -> Self {
        Self { rules }
    }

    /// The built-in table, in precedence order.
    pub fn builtin_rules() -> Vec<MarketRule> {
        vec![
            MarketRule::new(
                "exotics",
                &[&[
                    "correct score",
                    "exact",
                    "first goal scorer",
                    "last goal scorer",
                    "anytime goal scorer",
                ]],
                MarketType::Exotics,
                MarketRisk::Extreme,
            ),
            MarketRule::new(
                "period totals",
                &[&["over/under", "total"], SUB_PERIOD],
                MarketType::Totals,
                MarketRisk::Medium,
            ),
            MarketRule::new(
                "totals",
                &[&["over/under", "total"]],
                MarketType::Totals,
                MarketRisk::Low,
            ),
            MarketRule::new(
                "handicap",
                &[&["handicap"]],
                MarketType::Handicap,
                MarketRisk::Medium,
            ),
            MarketRule::new(
                "result",
                &[&["3way", "double chance", "ht/ft", "home/away"]],
                MarketType::Result,
                MarketRisk::Medium,
            ),
            MarketRule::new("odd/even", &[&["odd/even"]], MarketType::Props, MarketRisk::High),
        ]
    }

    /// Add rules ahead of the built-in table (they take precedence).
    pub fn with_leading_rules(mut self, rules: Vec<MarketRule>) -> Self {
        let mut merged = rules;
        merged.append(&mut self.rules);
        self.rules = merged;
        self
    }

    pub fn rules(&self) -> &[MarketRule] {
        &self.rules
    }

    /// Classify a market display name. Never fails.
    pub fn classify(&self, market: &str) -> MarketClass {
        let normalised = market.trim().to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches(&normalised))
            .map(|r| MarketClass { market_type: r.market_type, risk: r.risk })
            .unwrap_or(MarketClass { market_type: MarketType::Other, risk: MarketRisk::High })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
