//! Market order simulation and volume estimates.
//!
//! The simulation walks the offer list the way the remote engine executes a
//! market order: best offer first, full takes while the remaining volume
//! covers the offer, then one partial take. Partial amounts are rounded in
//! the engine's favour (the taker's payment up, what the taker receives
//! down) so that estimates never promise more than the chain delivers.

use super::book::Semibook;
use super::error::SemibookError;
use super::offer::Offer;
use super::options::{TakerAction, VolumeParams};
use super::tick_math;
use super::tick_price::{TickPriceHelper, to_display};
use crate::semibook::types::MAX_TICK;
use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Divisor of the last offer's gasreq added to the gas estimate, covering
/// the gas the engine keeps back for the last posthook.
const POSTHOOK_GAS_DIVISOR: u64 = 63;

/// Predicted outcome of a market order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderSimulation {
    /// Raw outbound amount the taker receives
    pub total_got: U256,
    /// Raw inbound amount the taker pays
    pub total_gave: U256,
    /// Gas estimate for executing the order
    pub gas: U256,
    /// Worst tick matched, `None` if nothing matched
    pub max_tick_matched: Option<i32>,
    /// Number of offers taken, fully or partially
    pub offers_considered: u64,
    /// Part of the requested volume the book cannot fill
    pub remaining_fill_volume: U256,
}

impl MarketOrderSimulation {
    /// Display amount received by the taker.
    ///
    /// # Errors
    /// Fails if the amount does not fit a [`Decimal`].
    pub fn got_display(&self, helper: &TickPriceHelper) -> Result<Decimal, SemibookError> {
        to_display(self.total_got, helper.outbound_decimals())
    }

    /// Display amount paid by the taker.
    ///
    /// # Errors
    /// Fails if the amount does not fit a [`Decimal`].
    pub fn gave_display(&self, helper: &TickPriceHelper) -> Result<Decimal, SemibookError> {
        to_display(self.total_gave, helper.inbound_decimals())
    }
}

/// Estimate returned by [`Semibook::estimate_volume`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEstimate {
    /// Raw amount paid when buying, or received when selling
    pub estimated_volume: U256,
    /// Raw fee taken from what the taker receives
    pub estimated_fee: U256,
    /// Part of the given volume the book cannot fill
    pub remaining_fill_volume: U256,
    /// Worst tick matched
    pub max_tick_matched: Option<i32>,
    /// Gas estimate
    pub gas: U256,
}

#[derive(Debug, Clone)]
struct SimulationAcc {
    simulation: MarketOrderSimulation,
    total_gasreq: U256,
    last_gasreq: u64,
    price_exceeded: bool,
    error: Option<SemibookError>,
}

impl SimulationAcc {
    fn new(fill_volume: U256) -> Self {
        Self {
            simulation: MarketOrderSimulation {
                remaining_fill_volume: fill_volume,
                ..MarketOrderSimulation::default()
            },
            total_gasreq: U256::ZERO,
            last_gasreq: 0,
            price_exceeded: false,
            error: None,
        }
    }

    fn done(&self) -> bool {
        self.price_exceeded
            || self.error.is_some()
            || self.simulation.remaining_fill_volume.is_zero()
    }

    fn take(&mut self, offer: &Offer, max_tick: i32, fill_wants: bool) {
        if offer.tick > max_tick {
            self.price_exceeded = true;
            return;
        }
        if let Err(error) = self.try_take(offer, fill_wants) {
            self.error = Some(error);
        }
    }

    fn try_take(&mut self, offer: &Offer, fill_wants: bool) -> Result<(), SemibookError> {
        let wants = offer.wants()?;
        let remaining = self.simulation.remaining_fill_volume;
        let offered = if fill_wants { offer.gives } else { wants };

        let (got, gave) = if remaining >= offered {
            self.simulation.remaining_fill_volume = remaining - offered;
            (offer.gives, wants)
        } else {
            self.simulation.remaining_fill_volume = U256::ZERO;
            if fill_wants {
                let gave = tick_math::inbound_from_outbound(offer.tick, remaining, true)?;
                (remaining, gave)
            } else {
                let got = tick_math::outbound_from_inbound(offer.tick, remaining, false)?;
                (got.min(offer.gives), remaining)
            }
        };

        let simulation = &mut self.simulation;
        simulation.total_got = simulation.total_got.saturating_add(got);
        simulation.total_gave = simulation.total_gave.saturating_add(gave);
        simulation.max_tick_matched = Some(offer.tick);
        simulation.offers_considered += 1;
        self.total_gasreq = self.total_gasreq.saturating_add(U256::from(offer.gasreq));
        self.last_gasreq = offer.gasreq;
        trace!(id = offer.id, tick = offer.tick, %got, %gave, "offer taken in simulation");
        Ok(())
    }
}

impl Semibook {
    /// Predicts a market order on this offer list.
    ///
    /// `fill_volume` is the outbound amount wanted when `fill_wants` is set,
    /// the inbound amount given otherwise. Offers worse than `max_tick` are
    /// not taken. The cache is extended from the remote list if it does not
    /// hold enough offers.
    ///
    /// # Errors
    /// Surfaces fetch failures and fixed point overflows.
    pub async fn simulate_market_order(
        &self,
        max_tick: i32,
        fill_volume: U256,
        fill_wants: bool,
    ) -> Result<MarketOrderSimulation, SemibookError> {
        let acc = self
            .fold_left_until(
                SimulationAcc::new(fill_volume),
                SimulationAcc::done,
                move |offer, acc| acc.take(offer, max_tick, fill_wants),
            )
            .await?;
        if let Some(error) = acc.error {
            return Err(error);
        }

        let mut simulation = acc.simulation;
        let gasbase = U256::from(self.local_config().offer_gasbase);
        simulation.gas = acc
            .total_gasreq
            .saturating_add(U256::from(acc.last_gasreq / POSTHOOK_GAS_DIVISOR))
            .saturating_add(gasbase.saturating_mul(U256::from(simulation.offers_considered)));
        Ok(simulation)
    }

    /// Estimates the volume exchanged when buying or selling `params.given`.
    ///
    /// Buying reports what the taker pays; selling reports what the taker
    /// receives. The fee is the offer list fee applied to what the taker
    /// receives.
    ///
    /// # Errors
    /// Surfaces fetch failures and fixed point overflows.
    pub async fn estimate_volume(
        &self,
        params: &VolumeParams,
    ) -> Result<VolumeEstimate, SemibookError> {
        let fill_wants = params.to == TakerAction::Buy;
        let max_tick = params.max_tick.unwrap_or(MAX_TICK);
        let simulation = self
            .simulate_market_order(max_tick, params.given, fill_wants)
            .await?;
        let estimated_volume = match params.to {
            TakerAction::Buy => simulation.total_gave,
            TakerAction::Sell => simulation.total_got,
        };
        Ok(VolumeEstimate {
            estimated_volume,
            estimated_fee: self.local_config().fee_on(simulation.total_got),
            remaining_fill_volume: simulation.remaining_fill_volume,
            max_tick_matched: simulation.max_tick_matched,
            gas: simulation.gas,
        })
    }

    /// Volume received when selling `given` inbound tokens.
    ///
    /// # Errors
    /// See [`Semibook::estimate_volume`].
    pub async fn estimate_volume_to_receive(
        &self,
        given: U256,
    ) -> Result<VolumeEstimate, SemibookError> {
        self.estimate_volume(&VolumeParams::sell(given)).await
    }

    /// Volume paid when buying `given` outbound tokens.
    ///
    /// # Errors
    /// See [`Semibook::estimate_volume`].
    pub async fn estimate_volume_to_spend(
        &self,
        given: U256,
    ) -> Result<VolumeEstimate, SemibookError> {
        self.estimate_volume(&VolumeParams::buy(given)).await
    }
}
