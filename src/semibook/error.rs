//! Semibook error types

use crate::semibook::types::{BlockId, OfferId};
use thiserror::Error;

/// Errors raised by the remote offer list reader.
///
/// Readers map their transport failures onto these variants so the
/// synchronization layer can tell a reorganized block apart from a plain
/// I/O failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReaderError {
    /// The block the read was pinned to is no longer canonical
    #[error("block {0} was reorganized away")]
    Reorg(BlockId),

    /// The remote source could not be reached or returned garbage
    #[error("transport error: {0}")]
    Transport(String),

    /// The requested offer does not exist on the remote book
    #[error("offer {0} not found on the remote book")]
    OfferNotFound(OfferId),
}

impl ReaderError {
    /// Whether the failure was caused by a chain reorganization.
    pub fn is_reorg(&self) -> bool {
        matches!(self, ReaderError::Reorg(_))
    }
}

/// Errors that can occur within a semibook or its event subscriber
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SemibookError {
    /// Fetching the offer list prefix from the remote source failed
    #[error("failed to initialize semibook at block {block}: {source}")]
    FailedInitialize {
        /// Block height the fetch was pinned to
        block: u64,
        /// Underlying reader failure
        #[source]
        source: ReaderError,
    },

    /// An offer id was read from the cache but is not there
    #[error("offer {0} is not in the cache")]
    NotInCache(OfferId),

    /// A change notification the semibook does not know how to apply
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Synchronization was requested without an event subscriber
    #[error("no event subscriber available to synchronize the semibook")]
    MissingSubscriber,

    /// The semibook has no synchronized block to read the remote book at
    #[error("semibook is not synchronized")]
    NotSynchronized,

    /// The options do not describe exactly one cache bound
    #[error("invalid semibook options: {0}")]
    InvalidOptions(String),

    /// Tick outside the range accepted by the remote book
    #[error("tick {tick} is outside [{min}, {max}]")]
    InvalidTick {
        /// The offending tick
        tick: i32,
        /// Lowest accepted tick
        min: i32,
        /// Highest accepted tick
        max: i32,
    },

    /// Price that cannot be mapped onto a tick (zero, negative or non finite)
    #[error("price cannot be converted to a tick")]
    InvalidPrice,

    /// Fixed point arithmetic overflowed
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// A block does not extend the last block seen by the subscriber
    #[error("block discontinuity: expected a child of {expected}, received {received}")]
    BlockDiscontinuity {
        /// Cursor the block should have extended
        expected: BlockId,
        /// The block that was delivered
        received: BlockId,
    },

    /// Background re-initialization kept failing
    #[error("initialization failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the last failure
        last_error: String,
    },

    /// Reader failure on a query path
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

impl SemibookError {
    /// Whether the error was caused by a chain reorganization.
    pub fn is_reorg(&self) -> bool {
        match self {
            SemibookError::FailedInitialize { source, .. } => source.is_reorg(),
            SemibookError::Reader(source) => source.is_reorg(),
            _ => false,
        }
    }
}
