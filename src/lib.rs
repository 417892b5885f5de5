//! # Semibook: a Synchronized Local Replica of an On-Chain Order Book Side
//!
//! This crate keeps a local, continuously synchronized copy of one side (bids
//! or asks) of a tick based on-chain limit order book, so that callers can
//! read, iterate and simulate trades against the book without a round trip to
//! the chain for every query.
//!
//! ## Key Features
//!
//! - **Bounded Prefix Cache**: Only the best part of the remote offer list is
//!   kept, bounded by an offer count, a price or a volume. The cache is always
//!   a gap free prefix of the true list, ordered best to worst.
//!
//! - **Reorg Safety**: Blocks are checked for continuity, and a rollback
//!   re-initializes every semibook that applied changes past the rollback
//!   target. Failed initializations are retried on the following blocks.
//!
//! - **Exact Simulation**: Market orders are simulated with the same fixed
//!   point tick arithmetic and rounding directions as the remote engine, so
//!   estimates match on-chain settlement to the unit.
//!
//! - **On-Demand Extension**: Folds that run out of cached offers fetch more
//!   from the remote list, first optimistically without locking, then under a
//!   per-semibook lock.
//!
//! - **Copy-on-Write State**: Readers work on immutable snapshots; changes
//!   replace the state as a whole, so partial updates are never observable.
//!
//! ## Architecture
//!
//! - [`semibook::cache`]: offers in an id arena, grouped into tick bins, both
//!   doubly linked by id.
//! - [`semibook::reader`]: the [`OfferListReader`] trait through which all
//!   remote reads go, pinned to a block.
//! - [`semibook::book`]: the [`Semibook`] replica and its read API.
//! - [`semibook::subscriber`]: the [`EventSubscriber`] that routes block
//!   changes and rollbacks to semibooks.
//! - [`semibook::market_order`]: market order simulation and volume estimates.
//! - [`semibook::tick_price`]: tick, price and display amount conversions.
//!
//! ## Example
//!
//! ```rust
//! use semibook_rs::prelude::*;
//!
//! let options = SemibookOptions::builder().with_max_offers(100).build()?;
//! assert_eq!(options.chunk_size(), 100);
//!
//! // only one cache bound may be configured
//! let ambiguous = SemibookOptions::builder()
//!     .with_max_offers(10)
//!     .with_desired_price("1.5".parse().unwrap_or_default())
//!     .build();
//! assert!(ambiguous.is_err());
//!
//! let helper = TickPriceHelper::new(BookSide::Asks, 18, 18);
//! let tick = helper.tick_from_price(helper.price_from_tick(42)?, RoundingMode::Nearest)?;
//! assert_eq!(tick, 42);
//! # Ok::<(), SemibookError>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.
//! Synchronization milestones are logged at `info`, retries at `warn`,
//! abandoned semibooks at `error`, and per offer activity at `trace`.

pub mod semibook;

/// Commonly used types.
pub mod prelude;

pub use semibook::{
    Block, BlockId, BookLog, BookSide, EventSubscriber, EventSubscriberConfig, LocalConfig,
    MangroveEvent, Market, MarketOrderSimulation, Offer, OfferId, OfferListKey, OfferListReader,
    ReaderError, Semibook, SemibookError, SemibookEvent, SemibookListener, SemibookOptions,
    SemibookState, Token, VolumeEstimate, VolumeParams,
};
