//! Applying block changes to a semibook

use super::book::{Semibook, SyncStatus};
use super::book_change_event::{SemibookEvent, SemibookEventKind};
use super::error::SemibookError;
use super::events::{BookLog, MangroveEvent};
use super::offer::Offer;
use super::tick_math;
use super::tick_price::to_display;
use crate::semibook::types::BlockId;
use std::sync::Arc;
use tracing::{debug, trace};

impl Semibook {
    /// Applies the logs of `block` that belong to this offer list, then marks
    /// the block as synchronized.
    ///
    /// Logs from blocks already reflected in the cache are skipped. Nothing
    /// happens while the semibook waits for re-initialization: it will fetch
    /// a state that includes these changes.
    ///
    /// # Errors
    /// Returns [`SemibookError::UnknownEvent`] for events the semibook cannot
    /// apply. Such an error leaves the semibook unusable. Listeners still
    /// receive the events applied before it.
    pub(crate) async fn handle_block(
        &self,
        block: &BlockId,
        logs: &[&BookLog],
    ) -> Result<(), SemibookError> {
        let mut events = Vec::with_capacity(logs.len());
        let outcome = {
            let _sync = self.sync_lock.lock().await;
            self.apply_block(block, logs, &mut events)
        };
        // listeners run once the sync lock is released
        for event in &events {
            self.notify(event);
        }
        outcome
    }

    /// Applies `logs` under the sync lock, collecting the events committed.
    fn apply_block(
        &self,
        block: &BlockId,
        logs: &[&BookLog],
        events: &mut Vec<SemibookEvent>,
    ) -> Result<(), SemibookError> {
        if !self.is_synchronized() {
            trace!(key = %self.key, block = block.number, "semibook not synchronized, skipping block");
            return Ok(());
        }

        let synced = self.synced_block();
        for log in logs {
            if synced.is_some_and(|synced| log.block.number <= synced.number) {
                trace!(
                    key = %self.key,
                    block = log.block.number,
                    event = log.event.name(),
                    "log already reflected in cache"
                );
                continue;
            }
            events.push(self.apply_log(log)?);
            self.last_seen_event_block.store(Some(log.block));
        }

        if synced.is_none_or(|synced| synced.number < block.number) {
            self.synced_block.store(Some(*block));
        }
        Ok(())
    }

    fn apply_log(&self, log: &BookLog) -> Result<SemibookEvent, SemibookError> {
        let kind = SemibookEventKind::of(&log.event)
            .ok_or_else(|| SemibookError::UnknownEvent(log.event.name().to_string()))?;
        let mut taker_wants = None;
        let mut taker_gives = None;

        let offer = match &log.event {
            MangroveEvent::OfferWrite {
                maker,
                tick,
                gives,
                gasprice,
                gasreq,
                id,
            } => {
                tick_math::check_tick(*tick)?;
                let offer = Offer::new(
                    *id,
                    *tick,
                    *gives,
                    *maker,
                    *gasreq,
                    *gasprice,
                    self.local_config().offer_gasbase,
                );
                let max_offers = self.options.max_offers();

                let mut guard = self.write_state();
                let state = Arc::make_mut(&mut *guard);
                state.remove(*id, false);

                // an incomplete cache cannot place offers at or past its worst
                // tick without opening a gap
                let outside = !state.is_complete()
                    && state
                        .worst()
                        .and_then(|worst| state.get(worst))
                        .is_none_or(|worst| *tick >= worst.tick);
                if outside {
                    trace!(id, tick, "offer written outside the cached prefix");
                    None
                } else if state.insert(offer, max_offers) {
                    state.get(*id).cloned()
                } else {
                    None
                }
            }
            MangroveEvent::OfferSuccess {
                id,
                taker_wants: wants,
                taker_gives: gives,
                ..
            }
            | MangroveEvent::OfferSuccessWithPosthookData {
                id,
                taker_wants: wants,
                taker_gives: gives,
                ..
            }
            | MangroveEvent::OfferFail {
                id,
                taker_wants: wants,
                taker_gives: gives,
                ..
            }
            | MangroveEvent::OfferFailWithPosthookData {
                id,
                taker_wants: wants,
                taker_gives: gives,
                ..
            } => {
                taker_wants = to_display(*wants, self.tick_helper.outbound_decimals()).ok();
                taker_gives = to_display(*gives, self.tick_helper.inbound_decimals()).ok();
                let mut guard = self.write_state();
                Arc::make_mut(&mut *guard).remove(*id, false)
            }
            MangroveEvent::OfferRetract { id, .. } => {
                let mut guard = self.write_state();
                Arc::make_mut(&mut *guard).remove(*id, false)
            }
            MangroveEvent::SetGasbase { offer_gasbase } => {
                let mut config = self.local_config();
                config.offer_gasbase = *offer_gasbase;
                self.local_config.store(config);
                None
            }
            MangroveEvent::SetActive { active } => {
                let mut config = self.local_config();
                config.active = *active;
                self.local_config.store(config);
                None
            }
            MangroveEvent::SetFee { fee } => {
                let mut config = self.local_config();
                config.fee = *fee;
                self.local_config.store(config);
                None
            }
            MangroveEvent::SetDensity96X32 { density } => {
                let mut config = self.local_config();
                config.density = *density;
                self.local_config.store(config);
                None
            }
            MangroveEvent::Unknown { event } => {
                return Err(SemibookError::UnknownEvent(event.clone()));
            }
        };

        trace!(
            key = %self.key,
            event = log.event.name(),
            id = ?log.event.offer_id(),
            cached = offer.is_some(),
            "log applied"
        );
        Ok(SemibookEvent {
            kind,
            ol_key: self.key,
            offer,
            taker_wants,
            taker_gives,
            event: log.event.clone(),
            block: log.block,
        })
    }

    /// Prepares the semibook for a rollback to `target`.
    ///
    /// Returns `true` when changes past `target` were applied, in which case
    /// the semibook is marked uninitialized and must be initialized again at
    /// `target`. Otherwise only the synchronized block is moved back.
    pub(crate) async fn rewind(&self, target: &BlockId) -> bool {
        let _sync = self.sync_lock.lock().await;
        if !self.is_synchronized() {
            return false;
        }
        if self
            .last_seen_block()
            .is_some_and(|seen| seen.number > target.number)
        {
            debug!(key = %self.key, target = target.number, "rollback past applied changes");
            self.set_status(SyncStatus::Uninitialized);
            return true;
        }
        if self
            .synced_block()
            .is_some_and(|synced| synced.number > target.number)
        {
            self.synced_block.store(Some(*target));
        }
        false
    }
}
