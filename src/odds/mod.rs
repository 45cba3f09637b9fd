//! Odds consensus.
//!
//! Groups per-bookmaker quotes by selection and derives the best, second
//! best and median price. Also hosts the market classifier and the
//! probability model, the two pure lookups every later stage relies on.

pub mod market;
pub mod probability;

use std::collections::HashMap;

use crate::types::{EvaluatedQuote, Quote, SelectionKey};

/// Anything that carries a selection identity and a decimal price.
pub trait Priced {
    fn selection_key(&self) -> SelectionKey;
    fn price(&self) -> f64;
}

impl Priced for Quote {
    fn selection_key(&self) -> SelectionKey {
        self.key()
    }

    fn price(&self) -> f64 {
        self.odds
    }
}

impl Priced for EvaluatedQuote {
    fn selection_key(&self) -> SelectionKey {
        self.key()
    }

    fn price(&self) -> f64 {
        self.quote.odds
    }
}

/// Consensus view of one selection across bookmakers.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSelection<T> {
    pub key: SelectionKey,
    /// All prices, highest first.
    pub odds_list: Vec<f64>,
    pub best_odds: f64,
    pub second_odds: f64,
    pub median_odds: f64,
    pub bookmaker_count: usize,
    /// The quote offering `best_odds` (first seen wins ties).
    pub best: T,
}

impl<T> AggregatedSelection<T> {
    pub fn best_vs_second(&self) -> f64 {
        if self.second_odds > 0.0 {
            self.best_odds / self.second_odds
        } else {
            0.0
        }
    }

    pub fn best_vs_median(&self) -> f64 {
        if self.median_odds > 0.0 {
            self.best_odds / self.median_odds
        } else {
            0.0
        }
    }
}

/// Median of a slice sorted in either direction.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Group quotes by selection and compute consensus prices.
///
/// Groups with fewer than two quotes are dropped. Output order follows the
/// first appearance of each selection in the input, so the result is a
/// pure function of the input sequence.
pub fn aggregate<T: Priced + Clone>(quotes: &[T]) -> Vec<AggregatedSelection<T>> {
    let mut index: HashMap<SelectionKey, usize> = HashMap::new();
    let mut groups: Vec<(SelectionKey, Vec<&T>)> = Vec::new();

    for q in quotes {
        let key = q.selection_key();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(q),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![q]));
            }
        }
    }

    groups
        .into_iter()
        .filter(|(_, items)| items.len() >= 2)
        .map(|(key, items)| {
            let mut odds_list: Vec<f64> = items.iter().map(|q| q.price()).collect();
            odds_list.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

            let mut best = items[0];
            for q in &items[1..] {
                if q.price() > best.price() {
                    best = q;
                }
            }

            AggregatedSelection {
                key,
                best_odds: odds_list[0],
                second_odds: odds_list[1],
                median_odds: median(&odds_list),
                bookmaker_count: odds_list.len(),
                odds_list,
                best: best.clone(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
