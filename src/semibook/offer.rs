//! Cached offers and the bins that group them by tick.

use crate::semibook::error::SemibookError;
use crate::semibook::tick_math;
use crate::semibook::tick_price::TickPriceHelper;
use crate::semibook::types::OfferId;
use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A live offer as held by the cache.
///
/// `prev` and `next` link the offer into the cache's best-to-worst chain.
/// They are owned by [`SemibookState`](crate::semibook::cache::SemibookState)
/// and reflect cache insertion order, not the remote list's own pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Remote offer id
    pub id: OfferId,
    /// Tick of the offer, lower is better for takers
    pub tick: i32,
    /// Raw outbound amount offered
    pub gives: U256,
    /// Maker address
    pub maker: Address,
    /// Gas the maker's contract needs to execute the offer
    pub gasreq: u64,
    /// Gas price the offer is provisioned for
    pub gasprice: u64,
    /// Gas base of the offer list at the time the offer was written
    pub offer_gasbase: u64,
    pub(crate) prev: Option<OfferId>,
    pub(crate) next: Option<OfferId>,
}

impl Offer {
    /// Creates an unlinked offer.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OfferId,
        tick: i32,
        gives: U256,
        maker: Address,
        gasreq: u64,
        gasprice: u64,
        offer_gasbase: u64,
    ) -> Self {
        Self {
            id,
            tick,
            gives,
            maker,
            gasreq,
            gasprice,
            offer_gasbase,
            prev: None,
            next: None,
        }
    }

    /// Previous offer in the cached chain.
    pub fn prev(&self) -> Option<OfferId> {
        self.prev
    }

    /// Next offer in the cached chain.
    pub fn next(&self) -> Option<OfferId> {
        self.next
    }

    /// Inbound amount owed for taking the whole offer, rounded up.
    ///
    /// # Errors
    /// Fails if `gives` does not fit the fixed point multiplication.
    pub fn wants(&self) -> Result<U256, SemibookError> {
        tick_math::inbound_from_outbound(self.tick, self.gives, true)
    }

    /// Display price of the offer.
    ///
    /// # Errors
    /// Fails if the tick cannot be priced.
    pub fn price(&self, helper: &TickPriceHelper) -> Result<Decimal, SemibookError> {
        helper.price_from_tick(self.tick)
    }

    /// Raw base volume of the offer.
    ///
    /// # Errors
    /// Fails if `wants` cannot be computed.
    pub fn volume(&self, helper: &TickPriceHelper) -> Result<U256, SemibookError> {
        Ok(helper.volume_for_gives_and_wants(self.gives, self.wants()?))
    }
}

/// All cached offers sharing one tick, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub(crate) tick: i32,
    pub(crate) offers: Vec<OfferId>,
    pub(crate) prev: Option<i32>,
    pub(crate) next: Option<i32>,
}

impl Bin {
    pub(crate) fn new(tick: i32) -> Self {
        Self {
            tick,
            offers: Vec::new(),
            prev: None,
            next: None,
        }
    }

    /// Tick of the bin.
    pub fn tick(&self) -> i32 {
        self.tick
    }

    /// Offer ids at this tick, first arrived first.
    pub fn offers(&self) -> &[OfferId] {
        &self.offers
    }

    /// Next better tick present in the cache.
    pub fn prev(&self) -> Option<i32> {
        self.prev
    }

    /// Next worse tick present in the cache.
    pub fn next(&self) -> Option<i32> {
        self.next
    }

    pub(crate) fn first(&self) -> Option<OfferId> {
        self.offers.first().copied()
    }

    pub(crate) fn last(&self) -> Option<OfferId> {
        self.offers.last().copied()
    }
}
