use crate::semibook::events::MangroveEvent;
use crate::semibook::offer::Offer;
use crate::semibook::types::{BlockId, OfferListKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// What happened to the semibook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemibookEventKind {
    /// An offer was written
    OfferWrite,
    /// An offer was executed
    OfferSuccess,
    /// An offer failed to execute
    OfferFail,
    /// An offer was retracted
    OfferRetract,
    /// The offer list gas base changed
    SetGasbase,
    /// The offer list was activated or deactivated
    SetActive,
    /// The offer list fee changed
    SetFee,
    /// The offer list density changed
    SetDensity,
}

impl SemibookEventKind {
    /// Kind of semibook event a remote event produces, if any.
    pub fn of(event: &MangroveEvent) -> Option<Self> {
        match event {
            MangroveEvent::OfferWrite { .. } => Some(Self::OfferWrite),
            MangroveEvent::OfferSuccess { .. }
            | MangroveEvent::OfferSuccessWithPosthookData { .. } => Some(Self::OfferSuccess),
            MangroveEvent::OfferFail { .. } | MangroveEvent::OfferFailWithPosthookData { .. } => {
                Some(Self::OfferFail)
            }
            MangroveEvent::OfferRetract { .. } => Some(Self::OfferRetract),
            MangroveEvent::SetGasbase { .. } => Some(Self::SetGasbase),
            MangroveEvent::SetActive { .. } => Some(Self::SetActive),
            MangroveEvent::SetFee { .. } => Some(Self::SetFee),
            MangroveEvent::SetDensity96X32 { .. } => Some(Self::SetDensity),
            MangroveEvent::Unknown { .. } => None,
        }
    }
}

/// Notification delivered to semibook listeners after a log was applied.
///
/// `offer` is the cached offer affected by the event. It is `None` when the
/// event concerns an offer outside the cached prefix, or for configuration
/// events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemibookEvent {
    /// Kind of change
    pub kind: SemibookEventKind,
    /// Offer list the change belongs to
    pub ol_key: OfferListKey,
    /// Affected offer
    pub offer: Option<Offer>,
    /// Outbound display amount received by the taker, for executions
    pub taker_wants: Option<Decimal>,
    /// Inbound display amount paid by the taker, for executions
    pub taker_gives: Option<Decimal>,
    /// Raw event as received
    pub event: MangroveEvent,
    /// Block the event was emitted in
    pub block: BlockId,
}

/// A thread-safe listener callback for semibook events.
///
/// Listeners are called synchronously, in registration order, once the
/// changes of a block are committed and the semibook is unlocked. They may
/// read the semibook but must not block.
pub type SemibookListener = Arc<dyn Fn(&SemibookEvent) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerHandle(Uuid);

impl ListenerHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
