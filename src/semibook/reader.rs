//! Remote offer list reader.
//!
//! The semibook never talks to a node directly. Everything it needs from the
//! remote book goes through [`OfferListReader`], with every read pinned to a
//! block so that a paginated fetch observes one consistent version of the
//! list.

use crate::semibook::error::ReaderError;
use crate::semibook::offer::Offer;
use crate::semibook::types::{BlockId, LocalConfig, OfferId, OfferListKey};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An offer as returned by the remote book, with its true neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOffer {
    /// Offer id
    pub id: OfferId,
    /// Previous offer on the remote list, `0` if none
    pub prev: OfferId,
    /// Next offer on the remote list, `0` if none
    pub next: OfferId,
    /// Tick of the offer
    pub tick: i32,
    /// Raw outbound amount offered
    pub gives: U256,
    /// Maker address
    pub maker: Address,
    /// Gas required by the maker
    pub gasreq: u64,
    /// Gas price the offer is provisioned for
    pub gasprice: u64,
    /// Gas base recorded with the offer
    pub offer_gasbase: u64,
}

impl RemoteOffer {
    fn hint(id: OfferId) -> Option<OfferId> {
        (id != 0).then_some(id)
    }

    /// Offer carrying the remote neighbours as its `prev`/`next` hints.
    ///
    /// Used for point reads of offers that are not cached.
    pub fn into_offer(self) -> Offer {
        let mut offer = self.to_cache_offer();
        offer.prev = Self::hint(self.prev);
        offer.next = Self::hint(self.next);
        offer
    }

    /// Unlinked offer ready to be inserted into a cache, which computes its
    /// own links.
    pub fn to_cache_offer(&self) -> Offer {
        Offer::new(
            self.id,
            self.tick,
            self.gives,
            self.maker,
            self.gasreq,
            self.gasprice,
            self.offer_gasbase,
        )
    }
}

/// One page of an offer list read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferListPage {
    /// First offer of the following page, `0` when the list is exhausted
    pub next_id: OfferId,
    /// Offers of this page, best to worst
    pub offers: Vec<RemoteOffer>,
}

/// Read access to the remote book.
#[async_trait]
pub trait OfferListReader: Send + Sync {
    /// Reads up to `max_offers` offers of `key` starting at `from_id`
    /// (inclusive, `0` for the best offer), as of `block`.
    async fn offer_list(
        &self,
        key: &OfferListKey,
        from_id: OfferId,
        max_offers: usize,
        block: &BlockId,
    ) -> Result<OfferListPage, ReaderError>;

    /// Reads a single offer as of `block`.
    async fn offer_detail(
        &self,
        key: &OfferListKey,
        id: OfferId,
        block: &BlockId,
    ) -> Result<RemoteOffer, ReaderError>;

    /// Reads the local configuration of `key` as of `block`.
    async fn local_config(
        &self,
        key: &OfferListKey,
        block: &BlockId,
    ) -> Result<LocalConfig, ReaderError>;
}
