//! The semibook: a synchronized replica of one side of a market.

use crate::semibook::book_change_event::{ListenerHandle, SemibookEvent, SemibookListener};
use crate::semibook::cache::SemibookState;
use crate::semibook::error::SemibookError;
use crate::semibook::fetcher::fetch_prefix_until;
use crate::semibook::iterators::{BinsWithCumulativeGives, SemibookIter};
use crate::semibook::offer::Offer;
use crate::semibook::options::{CacheBound, DEFAULT_MAX_OFFERS, SemibookOptions, TakerAction};
use crate::semibook::reader::{OfferListReader, RemoteOffer};
use crate::semibook::subscriber::EventSubscriber;
use crate::semibook::tick_math;
use crate::semibook::tick_price::{RoundingMode, TickPriceHelper};
use crate::semibook::types::{BlockId, BookSide, LocalConfig, Market, OfferId, OfferListKey};
use alloy_primitives::U256;
use crossbeam::atomic::AtomicCell;
use crossbeam::sync::{ShardedLock, ShardedLockReadGuard, ShardedLockWriteGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

/// Synchronization status of a semibook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// No consistent state yet, or waiting to be re-initialized after a
    /// rollback
    Uninitialized,
    /// Following the block stream
    Synchronized,
    /// Re-initialization kept failing, or a change could not be applied,
    /// and the semibook was abandoned
    Failed(String),
}

/// Stop predicate handed to the prefix fetcher.
type PrefixStop = Box<dyn FnMut(&[RemoteOffer], &[RemoteOffer]) -> bool + Send>;

/// A locally cached replica of one offer list.
///
/// A semibook is only obtained through [`Semibook::connect`] (or
/// [`EventSubscriber::connect`]), which returns it initialized. Reads never
/// block on synchronization: they work on the last committed state, which
/// is replaced as a whole whenever a change is applied.
pub struct Semibook {
    /// Market the offer list belongs to
    pub(super) market: Market,

    /// Side of the market held by this semibook
    pub(super) side: BookSide,

    /// Identity of the remote offer list
    pub(super) key: OfferListKey,

    /// Options the semibook was created with
    pub(super) options: SemibookOptions,

    /// Identity of `options`, shared by equivalent option sets
    pub(super) options_id: String,

    /// Price conversions for this side
    pub(super) tick_helper: TickPriceHelper,

    /// Remote source of the offer list
    pub(super) reader: Arc<dyn OfferListReader>,

    /// Committed state. Writers clone on write so outstanding snapshots stay
    /// valid.
    pub(super) state: ShardedLock<Arc<SemibookState>>,

    /// Local configuration of the offer list, as of the last applied change
    pub(super) local_config: AtomicCell<LocalConfig>,

    /// Last block whose changes are all reflected in `state`
    pub(super) synced_block: AtomicCell<Option<BlockId>>,

    /// Block of the last applied change, or of the last initialization
    pub(super) last_seen_event_block: AtomicCell<Option<BlockId>>,

    /// Synchronization status
    pub(super) status: ShardedLock<SyncStatus>,

    /// Serializes initialization, change handling and cache extension
    pub(super) sync_lock: Mutex<()>,

    /// Registered listeners, in registration order
    pub(super) listeners: ShardedLock<Vec<(ListenerHandle, SemibookListener)>>,
}

impl fmt::Debug for Semibook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semibook")
            .field("market", &self.market.to_string())
            .field("side", &self.side)
            .field("options_id", &self.options_id)
            .field("size", &self.size())
            .field("synced_block", &self.synced_block())
            .field("status", &self.status())
            .finish()
    }
}

impl Semibook {
    /// Builds an uninitialized semibook. Only the event subscriber calls
    /// this, and it initializes the result before handing it out.
    pub(crate) fn new(
        market: Market,
        side: BookSide,
        options: SemibookOptions,
        reader: Arc<dyn OfferListReader>,
    ) -> Result<Self, SemibookError> {
        options.validate()?;
        let options_id = options.options_id()?;
        let key = market.offer_list_key(side);
        let tick_helper = market.tick_price_helper(side);
        Ok(Self {
            market,
            side,
            key,
            options,
            options_id,
            tick_helper,
            reader,
            state: ShardedLock::new(Arc::new(SemibookState::new())),
            local_config: AtomicCell::new(LocalConfig::default()),
            synced_block: AtomicCell::new(None),
            last_seen_event_block: AtomicCell::new(None),
            status: ShardedLock::new(SyncStatus::Uninitialized),
            sync_lock: Mutex::new(()),
            listeners: ShardedLock::new(Vec::new()),
        })
    }

    /// Connects to `side` of `market` through `subscriber`, registering
    /// `listener`.
    ///
    /// Connecting twice with equivalent options returns the same semibook,
    /// with both listeners attached.
    ///
    /// # Errors
    /// Returns [`SemibookError::MissingSubscriber`] without a subscriber, and
    /// any initialization failure otherwise.
    pub async fn connect(
        subscriber: Option<&EventSubscriber>,
        market: &Market,
        side: BookSide,
        listener: SemibookListener,
        options: SemibookOptions,
    ) -> Result<(Arc<Semibook>, ListenerHandle), SemibookError> {
        let subscriber = subscriber.ok_or(SemibookError::MissingSubscriber)?;
        subscriber.connect(market, side, listener, options).await
    }

    pub(super) fn read_state(&self) -> ShardedLockReadGuard<'_, Arc<SemibookState>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write_state(&self) -> ShardedLockWriteGuard<'_, Arc<SemibookState>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, status: SyncStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Fetches the cached prefix as of `block` and replaces the state with it.
    ///
    /// On failure the state is left untouched.
    pub(crate) async fn initialize(&self, block: &BlockId) -> Result<(), SemibookError> {
        let _sync = self.sync_lock.lock().await;

        let config = self
            .reader
            .local_config(&self.key, block)
            .await
            .map_err(|source| SemibookError::FailedInitialize {
                block: block.number,
                source,
            })?;
        let stop = self.prefix_stop()?;
        let prefix = fetch_prefix_until(
            self.reader.as_ref(),
            &self.key,
            block,
            0,
            self.options.chunk_size(),
            stop,
        )
        .await?;

        let mut state = SemibookState::new();
        state.set_complete(prefix.exhausted);
        let max_offers = self.options.max_offers();
        for remote in &prefix.offers {
            state.insert(remote.to_cache_offer(), max_offers);
        }
        let size = state.len();
        let complete = state.is_complete();

        *self.write_state() = Arc::new(state);
        self.local_config.store(config);
        self.synced_block.store(Some(*block));
        self.last_seen_event_block.store(Some(*block));
        self.set_status(SyncStatus::Synchronized);

        info!(
            key = %self.key,
            block = block.number,
            offers = size,
            complete,
            "semibook initialized"
        );
        Ok(())
    }

    /// Builds the predicate deciding when enough of the list was fetched for
    /// the configured cache bound.
    fn prefix_stop(&self) -> Result<PrefixStop, SemibookError> {
        match self.options.bound() {
            CacheBound::MaxOffers { max_offers } => {
                let max_offers = *max_offers;
                Ok(Box::new(move |_chunk, all| all.len() >= max_offers))
            }
            CacheBound::DesiredPrice { price } => {
                let worst_tick = self.tick_helper.tick_from_price(*price, RoundingMode::Down)?;
                Ok(Box::new(move |chunk, _all| {
                    chunk.last().is_some_and(|offer| offer.tick > worst_tick)
                }))
            }
            CacheBound::DesiredVolume { volume } => {
                let volume = volume.clone();
                let mut total = U256::ZERO;
                Ok(Box::new(move |chunk, _all| {
                    for offer in chunk {
                        if volume.max_tick.is_some_and(|max_tick| offer.tick > max_tick) {
                            return true;
                        }
                        let amount = match volume.to {
                            TakerAction::Buy => Ok(offer.gives),
                            TakerAction::Sell => {
                                tick_math::inbound_from_outbound(offer.tick, offer.gives, true)
                            }
                        };
                        match amount {
                            Ok(amount) => total = total.saturating_add(amount),
                            Err(_) => return true,
                        }
                        if total >= volume.given {
                            return true;
                        }
                    }
                    false
                }))
            }
        }
    }

    /// Market of this semibook.
    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Side of the market held by this semibook.
    pub fn side(&self) -> BookSide {
        self.side
    }

    /// Remote offer list identity.
    pub fn offer_list_key(&self) -> OfferListKey {
        self.key
    }

    /// Options the semibook was created with.
    pub fn options(&self) -> &SemibookOptions {
        &self.options
    }

    /// Identity of the options.
    pub fn options_id(&self) -> &str {
        &self.options_id
    }

    /// Price conversions for this side.
    pub fn tick_price_helper(&self) -> &TickPriceHelper {
        &self.tick_helper
    }

    /// Synchronization status.
    pub fn status(&self) -> SyncStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the semibook is following the block stream.
    pub fn is_synchronized(&self) -> bool {
        matches!(self.status(), SyncStatus::Synchronized)
    }

    /// Last block whose changes are all reflected in the cache.
    pub fn synced_block(&self) -> Option<BlockId> {
        self.synced_block.load()
    }

    /// Block of the last applied change or initialization.
    pub fn last_seen_block(&self) -> Option<BlockId> {
        self.last_seen_event_block.load()
    }

    /// Cached local configuration of the offer list.
    pub fn local_config(&self) -> LocalConfig {
        self.local_config.load()
    }

    /// Current state. The snapshot never changes, however many changes are
    /// applied after it was taken.
    pub fn snapshot(&self) -> Arc<SemibookState> {
        Arc::clone(&self.read_state())
    }

    /// Number of cached offers.
    pub fn size(&self) -> usize {
        self.read_state().len()
    }

    /// Best cached offer.
    pub fn best(&self) -> Option<Offer> {
        let state = self.read_state();
        state.best().and_then(|id| state.get(id)).cloned()
    }

    /// Worst cached offer.
    pub fn worst(&self) -> Option<Offer> {
        let state = self.read_state();
        state.worst().and_then(|id| state.get(id)).cloned()
    }

    /// Display price of the best offer.
    ///
    /// # Errors
    /// Fails if the best tick cannot be priced.
    pub fn best_price(&self) -> Result<Option<Decimal>, SemibookError> {
        self.best()
            .map(|offer| offer.price(&self.tick_helper))
            .transpose()
    }

    /// Iterates over the cached offers best to worst, on a snapshot taken
    /// now.
    pub fn iter(&self) -> SemibookIter {
        SemibookIter::new(self.snapshot())
    }

    /// The `n` best cached offers.
    pub fn offers_up_to(&self, n: usize) -> Vec<Offer> {
        self.iter().take(n).collect()
    }

    /// Cached bins best to worst, with cumulative offered amounts.
    pub fn depth(&self) -> BinsWithCumulativeGives {
        BinsWithCumulativeGives::new(self.snapshot())
    }

    /// Offer `id`, from the cache or, failing that, read from the remote book
    /// as of the synchronized block.
    ///
    /// Offers read remotely carry the remote neighbours as `prev`/`next` and
    /// are not added to the cache.
    ///
    /// # Errors
    /// Returns [`SemibookError::NotSynchronized`] for an uncached offer while
    /// no block is synchronized, and surfaces reader failures, including
    /// unknown ids.
    pub async fn offer_info(&self, id: OfferId) -> Result<Offer, SemibookError> {
        if let Some(offer) = self.read_state().get(id).cloned() {
            return Ok(offer);
        }
        let block = self
            .synced_block()
            .ok_or(SemibookError::NotSynchronized)?;
        trace!(id, block = block.number, "offer not cached, reading remote");
        let remote = self.reader.offer_detail(&self.key, id, &block).await?;
        Ok(remote.into_offer())
    }

    /// Smallest raw amount an offer with `gasreq` may give.
    ///
    /// # Errors
    /// Fails if the density computation overflows.
    pub fn get_minimum_volume(&self, gasreq: u64) -> Result<U256, SemibookError> {
        self.local_config().min_volume(gasreq)
    }

    /// Largest gasreq among the best offers, up to the configured max offer
    /// count, fetching more offers if the cache is short.
    ///
    /// # Errors
    /// Surfaces fetch failures.
    pub async fn get_max_gas_req(&self) -> Result<Option<u64>, SemibookError> {
        let limit = self.options.max_offers().unwrap_or(DEFAULT_MAX_OFFERS);
        let (_, max_gasreq) = self
            .fold_left_until(
                (0usize, None::<u64>),
                move |(count, _)| *count >= limit,
                |offer, (count, max_gasreq)| {
                    *count += 1;
                    *max_gasreq = Some(max_gasreq.map_or(offer.gasreq, |m| m.max(offer.gasreq)));
                },
            )
            .await?;
        Ok(max_gasreq)
    }

    /// Registers `listener`, returning the handle that removes it.
    pub fn add_listener(&self, listener: SemibookListener) -> ListenerHandle {
        let handle = ListenerHandle::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, listener));
        debug!(key = %self.key, %handle, "listener added");
        handle
    }

    /// Removes a listener. Returns `false` if the handle is not registered
    /// here.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != handle);
        before != listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers `event` to every listener, in registration order.
    pub(super) fn notify(&self, event: &SemibookEvent) {
        let listeners: Vec<SemibookListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}
