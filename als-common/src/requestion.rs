//! Replacement questions drawn from the removed pools

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

use crate::items::{Item, ItemBank, Scale};
use crate::selection::SelectionResult;

/// Items left out of the short forms, per driver scale and subscale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementPool {
    pools: BTreeMap<Scale, BTreeMap<String, Vec<String>>>,
}

impl ReplacementPool {
    pub fn from_selection(selection: &SelectionResult) -> Self {
        let pools = selection
            .scales
            .iter()
            .map(|(scale, s)| (*scale, s.removed_by_subscale.clone()))
            .collect();
        Self { pools }
    }

    /// Unused ids of `subscale`'s pool, or of the whole scale when that pool is empty
    /// or unknown
    pub fn candidates(&self, scale: Scale, subscale: &str, used: &HashSet<String>) -> Vec<&str> {
        let Some(pools) = self.pools.get(&scale) else {
            return Vec::new();
        };

        let own: Vec<&str> = pools
            .get(subscale)
            .map(|ids| unused(ids, used))
            .unwrap_or_default();
        if !own.is_empty() {
            return own;
        }
        pools.values().flat_map(|ids| unused(ids, used)).collect()
    }

    /// Up to one replacement item per driver scale (EQ first)
    pub fn next_questions<R: Rng + ?Sized>(
        &self,
        bank: &ItemBank,
        eq_subscale: &str,
        fla_subscale: &str,
        used: &HashSet<String>,
        rng: &mut R,
    ) -> Vec<Item> {
        [(Scale::Eq, eq_subscale), (Scale::Fla, fla_subscale)]
            .into_iter()
            .filter_map(|(scale, subscale)| {
                let candidates = self.candidates(scale, subscale, used);
                candidates.choose(&mut *rng).and_then(|id| bank.get(id)).cloned()
            })
            .collect()
    }
}

fn unused<'a>(ids: &'a [String], used: &HashSet<String>) -> Vec<&'a str> {
    ids.iter()
        .filter(|id| !used.contains(*id))
        .map(String::as_str)
        .collect()
}
