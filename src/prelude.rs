//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use semibook_rs::prelude::*;
//! ```

// Replica and routing
pub use crate::semibook::book::{Semibook, SyncStatus};
pub use crate::semibook::subscriber::{EventSubscriber, EventSubscriberConfig};

// Errors
pub use crate::semibook::error::{ReaderError, SemibookError};

// State and iteration
pub use crate::semibook::cache::SemibookState;
pub use crate::semibook::iterators::{BinInfo, SemibookIter};
pub use crate::semibook::offer::{Bin, Offer};

// Options and estimates
pub use crate::semibook::market_order::{MarketOrderSimulation, VolumeEstimate};
pub use crate::semibook::options::{
    CacheBound, SemibookOptions, SemibookOptionsBuilder, TakerAction, VolumeParams,
};

// Events and listeners
pub use crate::semibook::book_change_event::{
    ListenerHandle, SemibookEvent, SemibookEventKind, SemibookListener,
};
pub use crate::semibook::events::{BookLog, MangroveEvent};

// Remote source
pub use crate::semibook::reader::{OfferListPage, OfferListReader, RemoteOffer};

// Market and price types
pub use crate::semibook::tick_price::{RoundingMode, TickPriceHelper};
pub use crate::semibook::types::{
    Block, BlockId, BookSide, LocalConfig, MAX_TICK, MIN_TICK, Market, OfferId, OfferListKey,
    Token,
};
