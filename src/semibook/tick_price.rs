//! Conversions between ticks, prices and display amounts.

use crate::semibook::error::SemibookError;
use crate::semibook::tick_math::{self, check_tick};
use crate::semibook::types::BookSide;
use alloy_primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Ticks closer than this to an integer are treated as that integer when
/// converting from a price, so that `tick_from_price(price_from_tick(t)) == t`.
const TICK_EPSILON: f64 = 1e-7;

/// How a fractional tick is turned into a book tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Closest tick
    Nearest,
    /// Lower tick, a better price for takers
    Down,
    /// Higher tick, a worse price for takers
    Up,
}

/// Price/tick helper for one side of a market.
///
/// Prices are always quoted as quote display units per base display unit,
/// whichever side is being priced. On the asks side the tick ratio is quote
/// per base; on the bids side it is base per quote and gets inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickPriceHelper {
    side: BookSide,
    base_decimals: u8,
    quote_decimals: u8,
}

impl TickPriceHelper {
    /// Creates a new helper.
    pub fn new(side: BookSide, base_decimals: u8, quote_decimals: u8) -> Self {
        Self {
            side,
            base_decimals,
            quote_decimals,
        }
    }

    /// Side this helper prices.
    pub fn side(&self) -> BookSide {
        self.side
    }

    fn decimals_shift(&self) -> f64 {
        10f64.powi(i32::from(self.base_decimals) - i32::from(self.quote_decimals))
    }

    /// Display price of `tick`.
    ///
    /// # Errors
    /// Fails on an out of range tick or when the price cannot be represented
    /// as a [`Decimal`].
    pub fn price_from_tick(&self, tick: i32) -> Result<Decimal, SemibookError> {
        let ratio = tick_math::ratio_from_tick(tick)?.to_f64();
        let price = match self.side {
            BookSide::Asks => ratio * self.decimals_shift(),
            BookSide::Bids => self.decimals_shift() / ratio,
        };
        Decimal::from_f64(price).ok_or(SemibookError::InvalidPrice)
    }

    /// Tick of `price`, rounded according to `mode`.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidPrice`] for non positive prices and
    /// [`SemibookError::InvalidTick`] when the result leaves the tick range.
    pub fn tick_from_price(
        &self,
        price: Decimal,
        mode: RoundingMode,
    ) -> Result<i32, SemibookError> {
        let price = price
            .to_f64()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or(SemibookError::InvalidPrice)?;
        let ratio = match self.side {
            BookSide::Asks => price / self.decimals_shift(),
            BookSide::Bids => self.decimals_shift() / price,
        };
        let exact = ratio.ln() / 1.0001f64.ln();
        if !exact.is_finite() {
            return Err(SemibookError::InvalidPrice);
        }
        let nearest = exact.round();
        let tick = if (exact - nearest).abs() < TICK_EPSILON {
            nearest
        } else {
            match mode {
                RoundingMode::Nearest => nearest,
                RoundingMode::Down => exact.floor(),
                RoundingMode::Up => exact.ceil(),
            }
        };
        if tick < f64::from(i32::MIN) || tick > f64::from(i32::MAX) {
            return Err(SemibookError::InvalidPrice);
        }
        let tick = tick as i32;
        check_tick(tick)?;
        Ok(tick)
    }

    /// Smallest multiple of `tick_spacing` that is not better than `tick`.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidTick`] when the coerced tick leaves
    /// the tick range.
    pub fn coerce_tick(&self, tick: i32, tick_spacing: u64) -> Result<i32, SemibookError> {
        if tick_spacing <= 1 {
            check_tick(tick)?;
            return Ok(tick);
        }
        let spacing =
            i64::try_from(tick_spacing).map_err(|_| SemibookError::Overflow("tick spacing"))?;
        let tick = i64::from(tick);
        let mut coerced = tick.div_euclid(spacing) * spacing;
        if coerced < tick {
            coerced += spacing;
        }
        let coerced = i32::try_from(coerced).map_err(|_| SemibookError::Overflow("tick"))?;
        check_tick(coerced)?;
        Ok(coerced)
    }

    /// Base volume of an offer giving `gives` and wanting `wants`.
    pub fn volume_for_gives_and_wants(&self, gives: U256, wants: U256) -> U256 {
        match self.side {
            BookSide::Asks => gives,
            BookSide::Bids => wants,
        }
    }

    /// Decimals of the token given by makers on this side.
    pub fn outbound_decimals(&self) -> u8 {
        match self.side {
            BookSide::Asks => self.base_decimals,
            BookSide::Bids => self.quote_decimals,
        }
    }

    /// Decimals of the token wanted by makers on this side.
    pub fn inbound_decimals(&self) -> u8 {
        match self.side {
            BookSide::Asks => self.quote_decimals,
            BookSide::Bids => self.base_decimals,
        }
    }
}

/// Converts a raw token amount into display units.
///
/// # Errors
/// Returns [`SemibookError::Overflow`] when the amount does not fit a
/// [`Decimal`].
pub fn to_display(raw: U256, decimals: u8) -> Result<Decimal, SemibookError> {
    let value = i128::try_from(raw).map_err(|_| SemibookError::Overflow("display amount"))?;
    Decimal::try_from_i128_with_scale(value, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| SemibookError::Overflow("display amount"))
}

/// Converts a display amount into raw token units, truncating extra digits.
///
/// # Errors
/// Returns [`SemibookError::Overflow`] for negative or oversized amounts.
pub fn to_raw(display: Decimal, decimals: u8) -> Result<U256, SemibookError> {
    let unit = 10i128
        .checked_pow(u32::from(decimals))
        .and_then(|unit| Decimal::try_from_i128_with_scale(unit, 0).ok())
        .ok_or(SemibookError::Overflow("raw amount"))?;
    let scaled = display
        .checked_mul(unit)
        .ok_or(SemibookError::Overflow("raw amount"))?
        .trunc();
    scaled
        .to_u128()
        .map(U256::from)
        .ok_or(SemibookError::Overflow("raw amount"))
}
