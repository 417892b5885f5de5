//! Fixed point tick arithmetic.
//!
//! A tick `t` stands for the price ratio `1.0001^t` (inbound per outbound).
//! The remote book stores that ratio as a normalized 128-bit mantissa and a
//! binary exponent, and every amount conversion is a single multiply-shift
//! with an explicit rounding direction. The simulator must land on the same
//! units as the remote engine, so this module keeps the same representation
//! instead of going through floating point.

use crate::semibook::error::SemibookError;
use crate::semibook::types::{MAX_TICK, MIN_TICK};
use alloy_primitives::U256;

/// Bits held by a normalized mantissa.
const MANTISSA_BITS: usize = 128;

/// `floor(2^(128 + shift) * 1.0001^-(2^i))` for every bit `i` of a tick
/// magnitude, paired with `shift`. Entries from bit 13 on are scaled up so
/// that each factor keeps a full 128-bit mantissa.
const TICK_FACTORS: [(u128, i32); 20] = [
    (0xfff97272373d413259a46990580e2139, 0),
    (0xfff2e50f5f656932ef12357cf3c7fdcb, 0),
    (0xffe5caca7e10e4e61c3624eaa0941ccf, 0),
    (0xffcb9843d60f6159c9db58835c926643, 0),
    (0xff973b41fa98c081472e6896dfb254bf, 0),
    (0xff2ea16466c96a3843ec78b326b52860, 0),
    (0xfe5dee046a99a2a811c461f1969c3052, 0),
    (0xfcbe86c7900a88aedcffc83b479aa3a3, 0),
    (0xf987a7253ac413176f2b074cf7815e53, 0),
    (0xf3392b0822b70005940c7a398e4b70f2, 0),
    (0xe7159475a2c29b7443b29c7fa6e889d8, 0),
    (0xd097f3bdfd2022b8845ad8f792aa5825, 0),
    (0xa9f746462d870fdf8a65dc1f90e061e4, 0),
    (0xe1b0d342ada5437121767bec575e65ed, 1),
    (0xc6f84d7e5f423f66048c541550bf3e96, 2),
    (0x9aa508b5b7a84e1c677de54f3e99bc8f, 4),
    (0xbad5f1bdb70232cd33865244bdcc089c, 9),
    (0x885b9613d7e87aa498106fb7fa5edd37, 18),
    (0x9142e0723efb884889d1f447715afacd, 37),
    (0xa4d9a773d61316918f140bd96e8e6814, 75),
];

/// A positive ratio `mantissa * 2^-exponent` with a normalized mantissa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    mantissa: U256,
    exponent: i32,
}

impl Ratio {
    /// The ratio `1`.
    pub fn one() -> Self {
        Self {
            mantissa: U256::from(1u8) << (MANTISSA_BITS - 1),
            exponent: (MANTISSA_BITS - 1) as i32,
        }
    }

    /// Builds a ratio from an arbitrary non-zero mantissa, flooring when bits
    /// have to be dropped.
    fn normalized(mantissa: U256, exponent: i32) -> Self {
        let bits = mantissa.bit_len();
        if bits > MANTISSA_BITS {
            let shift = bits - MANTISSA_BITS;
            Self {
                mantissa: mantissa >> shift,
                exponent: exponent - shift as i32,
            }
        } else {
            let shift = MANTISSA_BITS - bits;
            Self {
                mantissa: mantissa << shift,
                exponent: exponent + shift as i32,
            }
        }
    }

    /// Normalized mantissa.
    pub fn mantissa(&self) -> U256 {
        self.mantissa
    }

    /// Binary exponent; the ratio is `mantissa * 2^-exponent`.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Multiplies a raw amount by this ratio.
    ///
    /// # Errors
    /// Returns [`SemibookError::Overflow`] when `amount` is not below `2^128`
    /// or the result does not fit 256 bits.
    pub fn mul_amount(&self, amount: U256, round_up: bool) -> Result<U256, SemibookError> {
        if amount.bit_len() > MANTISSA_BITS {
            return Err(SemibookError::Overflow("amount exceeds 128 bits"));
        }
        let product = self.mantissa.wrapping_mul(amount);
        if product.is_zero() {
            return Ok(U256::ZERO);
        }
        if self.exponent <= 0 {
            let shift = self.exponent.unsigned_abs() as usize;
            if product.bit_len() + shift > 256 {
                return Err(SemibookError::Overflow("ratio * amount"));
            }
            return Ok(product << shift);
        }
        let shift = self.exponent as usize;
        if shift >= 256 {
            return Ok(if round_up { U256::from(1u8) } else { U256::ZERO });
        }
        let floor = product >> shift;
        let mask = (U256::from(1u8) << shift) - U256::from(1u8);
        if round_up && !(product & mask).is_zero() {
            Ok(floor + U256::from(1u8))
        } else {
            Ok(floor)
        }
    }

    /// Lossy floating point view, for display and price search only.
    pub fn to_f64(&self) -> f64 {
        let limbs = self.mantissa.as_limbs();
        let mantissa = limbs[1] as f64 * 18_446_744_073_709_551_616.0 + limbs[0] as f64;
        mantissa * 2f64.powi(-self.exponent)
    }
}

/// Checks that `tick` lies within the range accepted by the remote book.
///
/// # Errors
/// Returns [`SemibookError::InvalidTick`] otherwise.
pub fn check_tick(tick: i32) -> Result<(), SemibookError> {
    if (MIN_TICK..=MAX_TICK).contains(&tick) {
        Ok(())
    } else {
        Err(SemibookError::InvalidTick {
            tick,
            min: MIN_TICK,
            max: MAX_TICK,
        })
    }
}

/// The ratio `1.0001^tick`.
///
/// # Errors
/// Returns [`SemibookError::InvalidTick`] for ticks outside the book range.
pub fn ratio_from_tick(tick: i32) -> Result<Ratio, SemibookError> {
    check_tick(tick)?;
    let magnitude = tick.unsigned_abs();
    // 1.0001^-|tick| as a Q128 product of the table factors
    let mut mantissa = U256::from(1u8) << MANTISSA_BITS;
    let mut shift = 0i32;
    for (bit, &(factor, extra)) in TICK_FACTORS.iter().enumerate() {
        if magnitude & (1 << bit) != 0 {
            mantissa = mantissa.wrapping_mul(U256::from(factor)) >> MANTISSA_BITS;
            shift += extra;
        }
    }
    if tick > 0 {
        // 2^256 / mantissa, as the remote engine computes it
        mantissa = U256::MAX / mantissa;
        shift = -shift;
    }
    Ok(Ratio::normalized(mantissa, MANTISSA_BITS as i32 + shift))
}

/// Inbound amount owed for `outbound` at `tick`.
///
/// # Errors
/// Fails on an invalid tick or an oversized amount.
pub fn inbound_from_outbound(
    tick: i32,
    outbound: U256,
    round_up: bool,
) -> Result<U256, SemibookError> {
    ratio_from_tick(tick)?.mul_amount(outbound, round_up)
}

/// Outbound amount obtained for `inbound` at `tick`.
///
/// # Errors
/// Fails on an invalid tick or an oversized amount.
pub fn outbound_from_inbound(
    tick: i32,
    inbound: U256,
    round_up: bool,
) -> Result<U256, SemibookError> {
    ratio_from_tick(-tick)?.mul_amount(inbound, round_up)
}
