//! Cache storage engine: the value state of a semibook.
//!
//! Offers live in an arena keyed by id and are grouped into bins keyed by
//! tick. Both offers and bins are doubly linked through ids and ticks, so the
//! whole state is a plain value that can be cloned into a snapshot while the
//! owning semibook keeps mutating its own copy.

use crate::semibook::error::SemibookError;
use crate::semibook::offer::{Bin, Offer};
use crate::semibook::types::OfferId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};
use tracing::trace;

/// Offers and bins of one offer list, ordered best to worst.
///
/// The cache always holds a gap free prefix of the remote list. `complete`
/// is set when that prefix is known to be the whole list, which is what
/// decides whether a fold running out of cached offers has to go back to the
/// remote source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemibookState {
    offers: HashMap<OfferId, Offer>,
    bins: BTreeMap<i32, Bin>,
    best: Option<OfferId>,
    worst: Option<OfferId>,
    complete: bool,
}

impl SemibookState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached offers.
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    /// Whether the cache holds no offer.
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Id of the best cached offer.
    pub fn best(&self) -> Option<OfferId> {
        self.best
    }

    /// Id of the worst cached offer.
    pub fn worst(&self) -> Option<OfferId> {
        self.worst
    }

    /// Whether the cache is known to hold the entire remote list.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Cached offer with `id`, if any.
    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(&id)
    }

    /// Whether `id` is cached.
    pub fn contains(&self, id: OfferId) -> bool {
        self.offers.contains_key(&id)
    }

    /// Cached offer with `id`.
    ///
    /// # Errors
    /// Returns [`SemibookError::NotInCache`] if the id is not cached.
    pub fn get_or_fail(&self, id: OfferId) -> Result<&Offer, SemibookError> {
        self.offers.get(&id).ok_or(SemibookError::NotInCache(id))
    }

    /// Bin at `tick`, if any offer sits there.
    pub fn bin(&self, tick: i32) -> Option<&Bin> {
        self.bins.get(&tick)
    }

    /// Bins ordered best to worst.
    pub fn bins(&self) -> impl Iterator<Item = &Bin> {
        self.bins.values()
    }

    /// Inserts an offer that is not cached yet.
    ///
    /// With a `max_offers` bound, exceeding it evicts the worst offer. The
    /// return value is `false` when the evicted offer is the one that was just
    /// inserted, meaning it lies outside the cached window.
    pub fn insert(&mut self, mut offer: Offer, max_offers: Option<usize>) -> bool {
        let id = offer.id;
        let tick = offer.tick;

        let (prev_id, next_id) = match self.bins.get_mut(&tick) {
            Some(bin) => {
                let prev_id = bin.last();
                bin.offers.push(id);
                let next_tick = bin.next;
                let next_id = next_tick
                    .and_then(|t| self.bins.get(&t))
                    .and_then(Bin::first);
                (prev_id, next_id)
            }
            None => {
                let lower = self.bins.range(..tick).next_back().map(|(t, _)| *t);
                let higher = self
                    .bins
                    .range((Excluded(tick), Unbounded))
                    .next()
                    .map(|(t, _)| *t);

                let mut bin = Bin::new(tick);
                bin.prev = lower;
                bin.next = higher;
                bin.offers.push(id);

                let mut prev_id = None;
                let mut next_id = None;
                if let Some(lower_bin) = lower.and_then(|t| self.bins.get_mut(&t)) {
                    lower_bin.next = Some(tick);
                    prev_id = lower_bin.last();
                }
                if let Some(higher_bin) = higher.and_then(|t| self.bins.get_mut(&t)) {
                    higher_bin.prev = Some(tick);
                    next_id = higher_bin.first();
                }
                self.bins.insert(tick, bin);
                (prev_id, next_id)
            }
        };

        offer.prev = prev_id;
        offer.next = next_id;
        if let Some(prev) = prev_id.and_then(|p| self.offers.get_mut(&p)) {
            prev.next = Some(id);
        }
        if let Some(next) = next_id.and_then(|n| self.offers.get_mut(&n)) {
            next.prev = Some(id);
        }
        self.offers.insert(id, offer);

        if prev_id.is_none() {
            self.best = Some(id);
        }
        if next_id.is_none() {
            self.worst = Some(id);
        }

        match (max_offers, self.worst) {
            (Some(max), Some(worst)) if self.offers.len() > max => {
                trace!(evicted = worst, inserted = id, max, "evicting worst offer");
                self.remove(worst, true);
                self.complete = false;
                worst != id
            }
            _ => true,
        }
    }

    /// Removes an offer, returning it if it was cached.
    ///
    /// A regular removal repairs the neighbours' pointers. An eviction leaves
    /// the predecessor's `next` pointing at the evicted id: the cache no longer
    /// knows what follows, and clearing the pointer would claim the list ends
    /// there.
    pub fn remove(&mut self, id: OfferId, eviction: bool) -> Option<Offer> {
        let offer = self.offers.remove(&id)?;

        if !eviction && let Some(prev) = offer.prev.and_then(|p| self.offers.get_mut(&p)) {
            prev.next = offer.next;
        }
        if let Some(next) = offer.next.and_then(|n| self.offers.get_mut(&n))
            && next.prev == Some(id)
        {
            next.prev = offer.prev;
        }

        let emptied = match self.bins.get_mut(&offer.tick) {
            Some(bin) => {
                bin.offers.retain(|other| *other != id);
                bin.offers.is_empty()
            }
            None => false,
        };
        if emptied && let Some(bin) = self.bins.remove(&offer.tick) {
            if let Some(lower) = bin.prev.and_then(|t| self.bins.get_mut(&t)) {
                lower.next = bin.next;
            }
            if let Some(higher) = bin.next.and_then(|t| self.bins.get_mut(&t)) {
                higher.prev = bin.prev;
            }
        }

        if self.best == Some(id) {
            self.best = self.bins.values().next().and_then(Bin::first);
        }
        if self.worst == Some(id) {
            self.worst = self.bins.values().next_back().and_then(Bin::last);
        }
        Some(offer)
    }

    /// Walks the cached offers best to worst.
    pub fn iter(&self) -> OfferIter<'_> {
        OfferIter {
            state: self,
            cursor: self.best,
        }
    }

    /// Offer following `offer` in the cache.
    ///
    /// Follows `next` when it is backed by a matching `prev`, which rules out
    /// the stub left by an eviction, and otherwise falls back to the bins.
    pub(crate) fn successor(&self, offer: &Offer) -> Option<&Offer> {
        if let Some(next) = offer.next.and_then(|n| self.offers.get(&n))
            && next.prev == Some(offer.id)
        {
            return Some(next);
        }
        let bin = self.bins.get(&offer.tick)?;
        let position = bin.offers.iter().position(|id| *id == offer.id)?;
        let next_id = match bin.offers.get(position + 1) {
            Some(id) => Some(*id),
            None => bin
                .next
                .and_then(|t| self.bins.get(&t))
                .and_then(Bin::first),
        };
        next_id.and_then(|id| self.offers.get(&id))
    }

    /// Checks every structural invariant of the state, describing the first
    /// violation found.
    ///
    /// The worst offer's `next` is a hint only and is not checked.
    pub fn check_invariants(&self) -> Result<(), String> {
        let ticks: Vec<i32> = self.bins.keys().copied().collect();
        let mut seen = HashSet::with_capacity(self.offers.len());
        let mut order = Vec::with_capacity(self.offers.len());

        for (index, (tick, bin)) in self.bins.iter().enumerate() {
            if bin.tick != *tick {
                return Err(format!("bin keyed {tick} holds tick {}", bin.tick));
            }
            if bin.offers.is_empty() {
                return Err(format!("bin {tick} is empty"));
            }
            let expected_prev = index.checked_sub(1).map(|i| ticks[i]);
            let expected_next = ticks.get(index + 1).copied();
            if bin.prev != expected_prev || bin.next != expected_next {
                return Err(format!(
                    "bin {tick} links {:?}/{:?}, expected {expected_prev:?}/{expected_next:?}",
                    bin.prev, bin.next
                ));
            }
            for id in &bin.offers {
                let offer = self
                    .offers
                    .get(id)
                    .ok_or_else(|| format!("bin {tick} lists missing offer {id}"))?;
                if offer.tick != *tick {
                    return Err(format!("offer {id} at tick {} sits in bin {tick}", offer.tick));
                }
                if !seen.insert(*id) {
                    return Err(format!("offer {id} listed twice"));
                }
                order.push(*id);
            }
        }
        if order.len() != self.offers.len() {
            return Err(format!(
                "{} offers cached but {} listed in bins",
                self.offers.len(),
                order.len()
            ));
        }
        if self.best != order.first().copied() {
            return Err(format!("best is {:?}, expected {:?}", self.best, order.first()));
        }
        if self.worst != order.last().copied() {
            return Err(format!("worst is {:?}, expected {:?}", self.worst, order.last()));
        }
        for (index, id) in order.iter().enumerate() {
            let offer = &self.offers[id];
            let expected_prev = index.checked_sub(1).map(|i| order[i]);
            if offer.prev != expected_prev {
                return Err(format!(
                    "offer {id} prev is {:?}, expected {expected_prev:?}",
                    offer.prev
                ));
            }
            if let Some(expected_next) = order.get(index + 1)
                && offer.next != Some(*expected_next)
            {
                return Err(format!(
                    "offer {id} next is {:?}, expected {expected_next}",
                    offer.next
                ));
            }
        }
        Ok(())
    }
}

/// Iterator over cached offers, best to worst.
pub struct OfferIter<'a> {
    state: &'a SemibookState,
    cursor: Option<OfferId>,
}

impl<'a> Iterator for OfferIter<'a> {
    type Item = &'a Offer;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.state.offers.get(&self.cursor?)?;
        self.cursor = self.state.successor(current).map(|offer| offer.id);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.state.offers.len()))
    }
}
