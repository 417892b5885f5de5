//! Lazy iterators over semibook snapshots
//!
//! Iterators own the snapshot they walk, so they stay valid and consistent
//! while the semibook keeps applying changes.

use crate::semibook::cache::SemibookState;
use crate::semibook::offer::Offer;
use crate::semibook::types::OfferId;
use alloy_primitives::U256;
use std::sync::Arc;

/// Iterator over the cached offers of a snapshot, best to worst
pub struct SemibookIter {
    state: Arc<SemibookState>,
    cursor: Option<OfferId>,
}

impl SemibookIter {
    /// Creates an iterator starting at the best offer of `state`
    pub fn new(state: Arc<SemibookState>) -> Self {
        let cursor = state.best();
        Self { state, cursor }
    }
}

impl Iterator for SemibookIter {
    type Item = Offer;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.state.get(self.cursor?)?;
        self.cursor = self.state.successor(current).map(|offer| offer.id);
        Some(current.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.state.len()))
    }
}

/// Aggregated view of one bin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinInfo {
    /// Tick of the bin
    pub tick: i32,

    /// Number of cached offers at this tick
    pub offer_count: usize,

    /// Raw outbound amount offered at this tick
    pub total_gives: U256,

    /// Raw outbound amount offered up to and including this tick
    pub cumulative_gives: U256,
}

/// Iterator over the bins of a snapshot with cumulative depth tracking
pub struct BinsWithCumulativeGives {
    state: Arc<SemibookState>,
    next_tick: Option<i32>,
    cumulative_gives: U256,
}

impl BinsWithCumulativeGives {
    /// Creates an iterator starting at the best bin of `state`
    pub fn new(state: Arc<SemibookState>) -> Self {
        let next_tick = state.bins().next().map(|bin| bin.tick());
        Self {
            state,
            next_tick,
            cumulative_gives: U256::ZERO,
        }
    }
}

impl Iterator for BinsWithCumulativeGives {
    type Item = BinInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let bin = self.state.bin(self.next_tick?)?;
        self.next_tick = bin.next();
        let total_gives = bin
            .offers()
            .iter()
            .filter_map(|id| self.state.get(*id))
            .fold(U256::ZERO, |sum, offer| sum.saturating_add(offer.gives));
        self.cumulative_gives = self.cumulative_gives.saturating_add(total_gives);
        Some(BinInfo {
            tick: bin.tick(),
            offer_count: bin.offers().len(),
            total_gives,
            cumulative_gives: self.cumulative_gives,
        })
    }
}
