//! Weighted prize selection
//!
//! One uniform roll over the cumulative weight range, O(n) in the catalog
//! size. Catalog order has no influence on the odds.

use rand::Rng;
use std::collections::HashMap;

use crate::domain::entities::Prize;
use crate::domain::value_objects::RarityTier;
use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightingPolicy {
    /// Each non-empty rarity tier gets its fixed share, split evenly among its prizes
    #[default]
    Rarity,
    /// Proportional to remaining stock; unlimited prizes are not drawn
    Stock,
}

impl WeightingPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rarity" => Some(WeightingPolicy::Rarity),
            "stock" => Some(WeightingPolicy::Stock),
            _ => None,
        }
    }
}

/// Integer weight of every catalog entry under `policy`.
///
/// Rarity weights are `tier_percent * product(other non-empty tier sizes)`, so
/// a tier with `k` prizes sums to `tier_percent * product(all sizes)` without
/// any rounding. Shares of empty tiers are redistributed proportionally.
pub fn weights(prizes: &[Prize], policy: WeightingPolicy) -> Vec<u128> {
    match policy {
        WeightingPolicy::Rarity => {
            let mut tier_sizes: HashMap<RarityTier, u128> = HashMap::new();
            for prize in prizes {
                *tier_sizes.entry(prize.rarity).or_default() += 1;
            }
            let product: u128 = tier_sizes.values().product();

            prizes
                .iter()
                .map(|prize| {
                    let size = tier_sizes.get(&prize.rarity).copied().unwrap_or(1);
                    u128::from(prize.rarity.percent()) * (product / size)
                })
                .collect()
        }
        WeightingPolicy::Stock => prizes
            .iter()
            .map(|prize| prize.stock.map_or(0, |stock| stock.max(0) as u128))
            .collect(),
    }
}

/// Index drawn from `weights`, `None` when every weight is zero.
pub fn draw_index<R: Rng>(weights: &[u128], rng: &mut R) -> Option<usize> {
    let total: u128 = weights.iter().sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.random_range(0..total);
    for (index, weight) in weights.iter().enumerate() {
        if roll < *weight {
            return Some(index);
        }
        roll -= weight;
    }
    None
}

/// Index of the drawn prize in `prizes`.
pub fn select_index<R: Rng>(
    prizes: &[Prize],
    policy: WeightingPolicy,
    rng: &mut R,
) -> RewardsResult<usize> {
    if prizes.is_empty() {
        return Err(RewardsError::NoPrizesConfigured);
    }
    draw_index(&weights(prizes, policy), rng).ok_or(RewardsError::NoPrizesConfigured)
}
