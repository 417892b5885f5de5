//! Decoded change notifications of the remote book.

use crate::semibook::types::{BlockId, OfferId, OfferListKey};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// An event emitted by the remote book for one offer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum MangroveEvent {
    /// An offer was created or updated
    OfferWrite {
        /// Maker of the offer
        maker: Address,
        /// Tick of the offer
        tick: i32,
        /// Raw outbound amount offered
        gives: U256,
        /// Gas price the offer is provisioned for
        gasprice: u64,
        /// Gas required by the maker
        gasreq: u64,
        /// Offer id
        id: OfferId,
    },
    /// An offer was taken and executed
    OfferSuccess {
        /// Taker address
        taker: Address,
        /// Offer id
        id: OfferId,
        /// Raw outbound amount received by the taker
        taker_wants: U256,
        /// Raw inbound amount paid by the taker
        taker_gives: U256,
    },
    /// An offer was taken and executed, and its posthook returned data
    OfferSuccessWithPosthookData {
        /// Taker address
        taker: Address,
        /// Offer id
        id: OfferId,
        /// Raw outbound amount received by the taker
        taker_wants: U256,
        /// Raw inbound amount paid by the taker
        taker_gives: U256,
        /// Data returned by the posthook
        posthook_data: B256,
    },
    /// An offer was taken but the maker failed to deliver
    OfferFail {
        /// Taker address
        taker: Address,
        /// Offer id
        id: OfferId,
        /// Raw outbound amount the taker asked for
        taker_wants: U256,
        /// Raw inbound amount the taker would have paid
        taker_gives: U256,
        /// Penalty paid by the maker
        penalty: U256,
        /// Failure reason reported by the maker
        mgv_data: B256,
    },
    /// An offer failed and its posthook returned data
    OfferFailWithPosthookData {
        /// Taker address
        taker: Address,
        /// Offer id
        id: OfferId,
        /// Raw outbound amount the taker asked for
        taker_wants: U256,
        /// Raw inbound amount the taker would have paid
        taker_gives: U256,
        /// Penalty paid by the maker
        penalty: U256,
        /// Failure reason reported by the maker
        mgv_data: B256,
        /// Data returned by the posthook
        posthook_data: B256,
    },
    /// An offer was retracted by its maker
    OfferRetract {
        /// Maker of the offer
        maker: Address,
        /// Offer id
        id: OfferId,
        /// Whether the provision was returned to the maker
        deprovision: bool,
    },
    /// The offer list gas base changed
    SetGasbase {
        /// New gas base
        offer_gasbase: u64,
    },
    /// The offer list was activated or deactivated
    SetActive {
        /// Whether the list is active
        active: bool,
    },
    /// The offer list fee changed
    SetFee {
        /// New fee in basis points
        fee: u16,
    },
    /// The offer list density changed
    SetDensity96X32 {
        /// New density, 96x32 fixed point
        density: U256,
    },
    /// Any event the semibook does not model
    Unknown {
        /// Event name as emitted
        event: String,
    },
}

impl MangroveEvent {
    /// Event name as emitted by the remote book.
    pub fn name(&self) -> &str {
        match self {
            MangroveEvent::OfferWrite { .. } => "OfferWrite",
            MangroveEvent::OfferSuccess { .. } => "OfferSuccess",
            MangroveEvent::OfferSuccessWithPosthookData { .. } => "OfferSuccessWithPosthookData",
            MangroveEvent::OfferFail { .. } => "OfferFail",
            MangroveEvent::OfferFailWithPosthookData { .. } => "OfferFailWithPosthookData",
            MangroveEvent::OfferRetract { .. } => "OfferRetract",
            MangroveEvent::SetGasbase { .. } => "SetGasbase",
            MangroveEvent::SetActive { .. } => "SetActive",
            MangroveEvent::SetFee { .. } => "SetFee",
            MangroveEvent::SetDensity96X32 { .. } => "SetDensity96X32",
            MangroveEvent::Unknown { event } => event,
        }
    }

    /// Offer the event is about, if any.
    pub fn offer_id(&self) -> Option<OfferId> {
        match self {
            MangroveEvent::OfferWrite { id, .. }
            | MangroveEvent::OfferSuccess { id, .. }
            | MangroveEvent::OfferSuccessWithPosthookData { id, .. }
            | MangroveEvent::OfferFail { id, .. }
            | MangroveEvent::OfferFailWithPosthookData { id, .. }
            | MangroveEvent::OfferRetract { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// An event together with where it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLog {
    /// Block containing the event
    pub block: BlockId,
    /// Position of the event within the block
    pub log_index: u64,
    /// Offer list the event belongs to
    pub ol_key: OfferListKey,
    /// Decoded event
    pub event: MangroveEvent,
}

impl BookLog {
    /// Creates a new log entry.
    pub fn new(block: BlockId, log_index: u64, ol_key: OfferListKey, event: MangroveEvent) -> Self {
        Self {
            block,
            log_index,
            ol_key,
            event,
        }
    }
}
