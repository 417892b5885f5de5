//! Market, side, block and configuration types shared across the semibook.

use crate::semibook::error::SemibookError;
use crate::semibook::tick_price::TickPriceHelper;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote-assigned offer identifier. `0` is reserved and means "no offer".
pub type OfferId = u32;

/// Lowest tick the remote book accepts.
pub const MIN_TICK: i32 = -887_272;

/// Highest tick the remote book accepts.
pub const MAX_TICK: i32 = -MIN_TICK;

/// Fee denominator: local fees are expressed in basis points.
pub const FEE_DENOMINATOR: u64 = 10_000;

/// Which side of a market an offer list holds.
///
/// On the asks side makers give the base token and want the quote token; on
/// the bids side they give quote and want base. In both cases a lower tick is
/// a better price for the taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Offers buying the base token.
    Bids,
    /// Offers selling the base token.
    Asks,
}

impl BookSide {
    /// Returns the other side of the market.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            BookSide::Bids => BookSide::Asks,
            BookSide::Asks => BookSide::Bids,
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bids => write!(f, "bids"),
            BookSide::Asks => write!(f, "asks"),
        }
    }
}

/// An ERC-20 style token with its display precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Contract address
    pub address: Address,
    /// Display symbol
    pub symbol: String,
    /// Number of decimals between raw units and display units
    pub decimals: u8,
}

impl Token {
    /// Creates a new token description.
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A base/quote market on the remote book.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    /// Base token (given by asks)
    pub base: Token,
    /// Quote token (given by bids)
    pub quote: Token,
    /// Tick spacing shared by both offer lists of the market
    pub tick_spacing: u64,
}

impl Market {
    /// Creates a new market.
    pub fn new(base: Token, quote: Token, tick_spacing: u64) -> Self {
        Self {
            base,
            quote,
            tick_spacing,
        }
    }

    /// Token given by makers on `side`.
    pub fn outbound(&self, side: BookSide) -> &Token {
        match side {
            BookSide::Asks => &self.base,
            BookSide::Bids => &self.quote,
        }
    }

    /// Token wanted by makers on `side`.
    pub fn inbound(&self, side: BookSide) -> &Token {
        match side {
            BookSide::Asks => &self.quote,
            BookSide::Bids => &self.base,
        }
    }

    /// Identity of the remote offer list backing `side`.
    pub fn offer_list_key(&self, side: BookSide) -> OfferListKey {
        OfferListKey {
            outbound_tkn: self.outbound(side).address,
            inbound_tkn: self.inbound(side).address,
            tick_spacing: self.tick_spacing,
        }
    }

    /// Tick/price conversions for `side` of this market.
    pub fn tick_price_helper(&self, side: BookSide) -> TickPriceHelper {
        TickPriceHelper::new(side, self.base.decimals, self.quote.decimals)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base.symbol, self.quote.symbol)
    }
}

/// Identity of one remote offer list: what makers give, what they want, and
/// the tick spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferListKey {
    /// Token given by makers
    pub outbound_tkn: Address,
    /// Token wanted by makers
    pub inbound_tkn: Address,
    /// Tick spacing
    pub tick_spacing: u64,
}

impl OfferListKey {
    /// The offer list of the opposite side of the same market.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            outbound_tkn: self.inbound_tkn,
            inbound_tkn: self.outbound_tkn,
            tick_spacing: self.tick_spacing,
        }
    }
}

impl fmt::Display for OfferListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.outbound_tkn, self.inbound_tkn, self.tick_spacing
        )
    }
}

/// Block height/hash pair, used as the synchronization cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    /// Block height
    pub number: u64,
    /// Block hash
    pub hash: B256,
}

impl BlockId {
    /// Creates a new block identifier.
    pub fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.hash)
    }
}

/// A block header as delivered by the block stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    /// Block height
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Hash of the parent block
    pub parent_hash: B256,
}

impl Block {
    /// Creates a new block header.
    pub fn new(number: u64, hash: B256, parent_hash: B256) -> Self {
        Self {
            number,
            hash,
            parent_hash,
        }
    }

    /// The cursor form of this block.
    pub fn id(&self) -> BlockId {
        BlockId::new(self.number, self.hash)
    }

    /// Whether this block directly follows `parent`.
    pub fn extends(&self, parent: &BlockId) -> bool {
        self.number == parent.number.saturating_add(1) && self.parent_hash == parent.hash
    }
}

/// Per offer list configuration read from the remote book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Whether the offer list accepts takers
    pub active: bool,
    /// Taker fee in basis points, taken from what the taker receives
    pub fee: u16,
    /// Minimum outbound volume per unit of gas, fixed point with
    /// [`LocalConfig::DENSITY_FRACTIONAL_BITS`] fractional bits
    pub density: U256,
    /// Gas charged by the book per executed offer, on top of the offer's gasreq
    pub offer_gasbase: u64,
}

impl LocalConfig {
    /// Fractional bits of the density fixed point representation.
    pub const DENSITY_FRACTIONAL_BITS: usize = 32;

    /// Minimum raw outbound volume an offer with `gasreq` needs to be accepted.
    ///
    /// A zero density still requires one indivisible unit.
    ///
    /// # Errors
    /// Returns [`SemibookError::Overflow`] when the product does not fit 256 bits.
    pub fn min_volume(&self, gasreq: u64) -> Result<U256, SemibookError> {
        if self.density.is_zero() {
            return Ok(U256::from(1u8));
        }
        let gas = U256::from(gasreq) + U256::from(self.offer_gasbase);
        let scaled = self
            .density
            .checked_mul(gas)
            .ok_or(SemibookError::Overflow("density * gas"))?;
        let mask = (U256::from(1u8) << Self::DENSITY_FRACTIONAL_BITS) - U256::from(1u8);
        let floor = scaled >> Self::DENSITY_FRACTIONAL_BITS;
        if (scaled & mask).is_zero() {
            Ok(floor)
        } else {
            Ok(floor + U256::from(1u8))
        }
    }

    /// Fee owed on `amount` received by a taker, rounded down.
    pub fn fee_on(&self, amount: U256) -> U256 {
        amount.saturating_mul(U256::from(self.fee)) / U256::from(FEE_DENOMINATOR)
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            active: true,
            fee: 0,
            density: U256::ZERO,
            offer_gasbase: 0,
        }
    }
}
