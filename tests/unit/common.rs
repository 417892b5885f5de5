//! Shared fixtures for the integration tests: an in-memory remote book and
//! block helpers.

#![allow(dead_code)]

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use semibook_rs::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const UNIT: u128 = 1_000_000_000_000_000_000;

pub fn hash(number: u64) -> B256 {
    B256::with_last_byte(number as u8)
}

pub fn block_id(number: u64) -> BlockId {
    BlockId::new(number, hash(number))
}

/// Header of block `number` on the canonical chain.
pub fn header(number: u64) -> Block {
    Block::new(number, hash(number), hash(number.saturating_sub(1)))
}

pub fn market() -> Market {
    Market::new(
        Token::new(Address::with_last_byte(0xaa), "WETH", 18),
        Token::new(Address::with_last_byte(0xbb), "DAI", 18),
        1,
    )
}

pub fn asks_key() -> OfferListKey {
    market().offer_list_key(BookSide::Asks)
}

pub fn retract(key: OfferListKey, number: u64, id: OfferId) -> BookLog {
    BookLog::new(
        block_id(number),
        0,
        key,
        MangroveEvent::OfferRetract {
            maker: Address::ZERO,
            id,
            deprovision: false,
        },
    )
}

#[derive(Default)]
pub struct MockReader {
    lists: Mutex<HashMap<OfferListKey, BTreeMap<u64, Vec<RemoteOffer>>>>,
    failures: AtomicU32,
}

impl MockReader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the list of `key` as of `block` to offers `(id, tick)`, each
    /// giving one unit, best to worst.
    pub fn set_offers(&self, key: &OfferListKey, block: u64, offers: &[(OfferId, i32)]) {
        let list: Vec<RemoteOffer> = offers
            .iter()
            .enumerate()
            .map(|(index, (id, tick))| RemoteOffer {
                id: *id,
                prev: index.checked_sub(1).map_or(0, |i| offers[i].0),
                next: offers.get(index + 1).map_or(0, |next| next.0),
                tick: *tick,
                gives: U256::from(UNIT),
                maker: Address::ZERO,
                gasreq: 80_000,
                gasprice: 0,
                offer_gasbase: 0,
            })
            .collect();
        self.lists
            .lock()
            .unwrap()
            .entry(*key)
            .or_default()
            .insert(block, list);
    }

    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn check(&self, block: &BlockId) -> Result<(), ReaderError> {
        match self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        {
            Ok(_) => Err(ReaderError::Reorg(*block)),
            Err(_) => Ok(()),
        }
    }

    fn list_at(&self, key: &OfferListKey, block: &BlockId) -> Vec<RemoteOffer> {
        self.lists
            .lock()
            .unwrap()
            .get(key)
            .and_then(|versions| versions.range(..=block.number).next_back())
            .map(|(_, list)| list.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OfferListReader for MockReader {
    async fn offer_list(
        &self,
        key: &OfferListKey,
        from_id: OfferId,
        max_offers: usize,
        block: &BlockId,
    ) -> Result<OfferListPage, ReaderError> {
        self.check(block)?;
        let list = self.list_at(key, block);
        let start = if from_id == 0 {
            0
        } else {
            list.iter()
                .position(|offer| offer.id == from_id)
                .ok_or(ReaderError::OfferNotFound(from_id))?
        };
        let end = (start + max_offers).min(list.len());
        Ok(OfferListPage {
            next_id: list.get(end).map_or(0, |offer| offer.id),
            offers: list[start..end].to_vec(),
        })
    }

    async fn offer_detail(
        &self,
        key: &OfferListKey,
        id: OfferId,
        block: &BlockId,
    ) -> Result<RemoteOffer, ReaderError> {
        self.check(block)?;
        self.list_at(key, block)
            .into_iter()
            .find(|offer| offer.id == id)
            .ok_or(ReaderError::OfferNotFound(id))
    }

    async fn local_config(
        &self,
        _key: &OfferListKey,
        block: &BlockId,
    ) -> Result<LocalConfig, ReaderError> {
        self.check(block)?;
        Ok(LocalConfig::default())
    }
}

/// A listener that counts its calls.
pub fn counting_listener() -> (SemibookListener, Arc<AtomicU32>) {
    let count = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&count);
    let listener: SemibookListener = Arc::new(move |_event: &SemibookEvent| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
}

pub fn ignore() -> SemibookListener {
    Arc::new(|_event: &SemibookEvent| {})
}
