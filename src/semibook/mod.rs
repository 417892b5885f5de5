//! Semibook implementation: a synchronized, locally cached replica of one side
//! of an on-chain tick based order book.

pub mod book;
pub mod error;
/// Market, side, block and configuration types.
pub mod types;

/// Fixed point tick ratios and amount conversions.
pub mod tick_math;
/// Tick, price and display amount conversions.
pub mod tick_price;

pub mod offer;
/// Cache storage engine holding the cached prefix of an offer list.
pub mod cache;
/// Lazy iterators over semibook snapshots.
pub mod iterators;

/// Remote offer list reader.
pub mod reader;
mod fetcher;
/// Cache bounds and fetch options.
pub mod options;

/// Decoded change notifications of the remote book.
pub mod events;
/// Notifications delivered to semibook listeners.
pub mod book_change_event;
mod fold;
pub mod market_order;
mod operations;
/// Routing of block changes and rollbacks to semibooks.
pub mod subscriber;

pub use book::{Semibook, SyncStatus};
pub use book_change_event::{ListenerHandle, SemibookEvent, SemibookEventKind, SemibookListener};
pub use cache::SemibookState;
pub use error::{ReaderError, SemibookError};
pub use events::{BookLog, MangroveEvent};
pub use fetcher::{FetchedPrefix, fetch_prefix_until};
pub use iterators::{BinInfo, BinsWithCumulativeGives, SemibookIter};
pub use market_order::{MarketOrderSimulation, VolumeEstimate};
pub use offer::{Bin, Offer};
pub use options::{CacheBound, SemibookOptions, SemibookOptionsBuilder, TakerAction, VolumeParams};
pub use reader::{OfferListPage, OfferListReader, RemoteOffer};
pub use subscriber::{EventSubscriber, EventSubscriberConfig};
pub use tick_price::{RoundingMode, TickPriceHelper};
pub use types::{Block, BlockId, BookSide, LocalConfig, Market, OfferId, OfferListKey, Token};
