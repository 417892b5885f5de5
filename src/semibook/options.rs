//! Semibook options: which prefix of the remote list to cache, and how to
//! fetch it.

use crate::semibook::error::SemibookError;
use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Default number of cached offers when no bound is configured.
pub const DEFAULT_MAX_OFFERS: usize = 50;

/// Default number of offers requested per remote read.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// What the taker does with the volume given to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerAction {
    /// The taker wants to receive `given` outbound tokens
    Buy,
    /// The taker wants to spend `given` inbound tokens
    Sell,
}

/// Parameters of a volume estimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeParams {
    /// Raw amount to buy or to sell
    pub given: U256,
    /// Whether `given` is received or spent
    pub to: TakerAction,
    /// Worst tick the taker accepts, unbounded if `None`
    #[serde(default)]
    pub max_tick: Option<i32>,
}

impl VolumeParams {
    /// Buy `given` outbound tokens.
    pub fn buy(given: U256) -> Self {
        Self {
            given,
            to: TakerAction::Buy,
            max_tick: None,
        }
    }

    /// Sell `given` inbound tokens.
    pub fn sell(given: U256) -> Self {
        Self {
            given,
            to: TakerAction::Sell,
            max_tick: None,
        }
    }

    /// Limits the estimate to offers at or below `max_tick`.
    #[must_use]
    pub fn with_max_tick(mut self, max_tick: i32) -> Self {
        self.max_tick = Some(max_tick);
        self
    }
}

/// Prefix of the remote list a semibook keeps cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheBound {
    /// At most `max_offers` offers; the worst one is evicted on overflow
    MaxOffers {
        /// Maximum number of cached offers
        max_offers: usize,
    },
    /// Every offer priced at least as well as `price`
    DesiredPrice {
        /// Worst display price worth caching
        price: Decimal,
    },
    /// Enough offers to fill `volume`
    DesiredVolume {
        /// Volume the cache must be able to fill
        volume: VolumeParams,
    },
}

impl CacheBound {
    /// Maximum cached offer count, for count bounded caches.
    pub fn max_offers(&self) -> Option<usize> {
        match self {
            CacheBound::MaxOffers { max_offers } => Some(*max_offers),
            _ => None,
        }
    }
}

/// Immutable options of a semibook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemibookOptions {
    bound: CacheBound,
    chunk_size: usize,
}

impl Default for SemibookOptions {
    fn default() -> Self {
        Self {
            bound: CacheBound::MaxOffers {
                max_offers: DEFAULT_MAX_OFFERS,
            },
            chunk_size: DEFAULT_MAX_OFFERS,
        }
    }
}

impl SemibookOptions {
    /// Starts building options.
    pub fn builder() -> SemibookOptionsBuilder {
        SemibookOptionsBuilder::default()
    }

    /// Cache bound.
    pub fn bound(&self) -> &CacheBound {
        &self.bound
    }

    /// Offers requested per remote read.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maximum cached offer count, for count bounded caches.
    pub fn max_offers(&self) -> Option<usize> {
        self.bound.max_offers()
    }

    /// Checks options that did not come out of the builder, such as
    /// deserialized ones.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidOptions`] describing the problem.
    pub fn validate(&self) -> Result<(), SemibookError> {
        if self.chunk_size == 0 {
            return Err(SemibookError::InvalidOptions(
                "chunk size must be positive".to_string(),
            ));
        }
        match &self.bound {
            CacheBound::MaxOffers { max_offers: 0 } => Err(SemibookError::InvalidOptions(
                "max offers must be positive".to_string(),
            )),
            CacheBound::DesiredPrice { price } if *price <= Decimal::ZERO => Err(
                SemibookError::InvalidOptions("desired price must be positive".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Deterministic identity of these options.
    ///
    /// Two option sets describing the same cache share an id: decimal
    /// prices are normalized before hashing, so `1.50` and `1.5` agree.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidOptions`] if the options cannot be
    /// serialized.
    pub fn options_id(&self) -> Result<String, SemibookError> {
        let mut normalized = self.clone();
        if let CacheBound::DesiredPrice { price } = &mut normalized.bound {
            *price = price.normalize();
        }
        let payload = serde_json::to_vec(&normalized)
            .map_err(|error| SemibookError::InvalidOptions(error.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(payload);
        let digest = hasher.finalize();

        let mut id = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(id, "{byte:02x}");
        }
        Ok(id)
    }
}

/// Builder for [`SemibookOptions`].
///
/// At most one of the three cache bounds may be set; none means
/// [`DEFAULT_MAX_OFFERS`].
#[derive(Debug, Clone, Default)]
pub struct SemibookOptionsBuilder {
    max_offers: Option<usize>,
    desired_price: Option<Decimal>,
    desired_volume: Option<VolumeParams>,
    chunk_size: Option<usize>,
}

impl SemibookOptionsBuilder {
    /// Caches at most `max_offers` offers.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_max_offers(mut self, max_offers: usize) -> Self {
        self.max_offers = Some(max_offers);
        self
    }

    /// Caches every offer priced at least as well as `price`.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_desired_price(mut self, price: Decimal) -> Self {
        self.desired_price = Some(price);
        self
    }

    /// Caches enough offers to fill `volume`.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_desired_volume(mut self, volume: VolumeParams) -> Self {
        self.desired_volume = Some(volume);
        self
    }

    /// Offers requested per remote read. Defaults to the max offer count for
    /// count bounded caches and to [`DEFAULT_CHUNK_SIZE`] otherwise.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidOptions`] when more than one bound is
    /// set or a size is zero.
    pub fn build(self) -> Result<SemibookOptions, SemibookError> {
        let configured = [
            self.max_offers.is_some(),
            self.desired_price.is_some(),
            self.desired_volume.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if configured > 1 {
            return Err(SemibookError::InvalidOptions(
                "only one of max offers, desired price and desired volume may be set".to_string(),
            ));
        }

        let bound = if let Some(price) = self.desired_price {
            CacheBound::DesiredPrice { price }
        } else if let Some(volume) = self.desired_volume {
            CacheBound::DesiredVolume { volume }
        } else {
            CacheBound::MaxOffers {
                max_offers: self.max_offers.unwrap_or(DEFAULT_MAX_OFFERS),
            }
        };
        let chunk_size = self
            .chunk_size
            .or(bound.max_offers())
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let options = SemibookOptions { bound, chunk_size };
        options.validate()?;
        Ok(options)
    }
}
