//! Strategy engine: value classification, pool building, single-pick
//! selection, parlay construction and premium flagging.

pub mod parlay;
pub mod pools;
pub mod premium;
pub mod singles;
pub mod tiers;
pub mod value;

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::warn;

/// Stake and potential win (stake × odds) for a bet, both cent-rounded.
/// Non-finite inputs convert to zero and are logged.
pub fn stake_and_win(stake: f64, odds: f64) -> (Decimal, Decimal) {
    let (Some(stake_dec), Some(odds_dec)) = (Decimal::from_f64_retain(stake), Decimal::from_f64_retain(odds))
    else {
        warn!(stake, odds, "Stake or odds not representable as a decimal, recording zero");
        return (Decimal::ZERO, Decimal::ZERO);
    };
    let Some(win) = stake_dec.checked_mul(odds_dec) else {
        warn!(stake, odds, "Potential win overflows, recording zero");
        return (stake_dec.round_dp(2), Decimal::ZERO);
    };
    (stake_dec.round_dp(2), win.round_dp(2))
}

/// Keep one item per key, replacing the kept item only when `better`
/// says the newcomer wins. Output order is the first appearance of each
/// key, so ties resolve to the earliest item and the result is
/// deterministic for a given input order.
pub fn keep_best_by<T, K, FK, FB>(items: Vec<T>, key: FK, better: FB) -> Vec<T>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FB: Fn(&T, &T) -> bool,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut kept: Vec<T> = Vec::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => {
                if better(&item, &kept[i]) {
                    kept[i] = item;
                }
            }
            None => {
                index.insert(k, kept.len());
                kept.push(item);
            }
        }
    }

    kept
}

/// Compare two float tuples lexicographically; NaN compares equal.
pub(crate) fn cmp_f64s(a: &[f64], b: &[f64]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y) {
            Some(std::cmp::Ordering::Equal) | None => continue,
            Some(ord) => return ord,
        }
    }
    std::cmp::Ordering::Equal
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
