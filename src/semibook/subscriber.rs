//! Routing of block changes to semibooks.
//!
//! The [`EventSubscriber`] is the single consumer of the block stream. It
//! owns the routing table of semibooks, checks that blocks arrive in order,
//! fans changes out to the semibooks they concern, handles rollbacks, and
//! retries initializations that failed (typically because the block they
//! were pinned to got reorganized away) on the following blocks.

use crate::semibook::book::{Semibook, SyncStatus};
use crate::semibook::book_change_event::{ListenerHandle, SemibookListener};
use crate::semibook::error::SemibookError;
use crate::semibook::events::BookLog;
use crate::semibook::options::SemibookOptions;
use crate::semibook::reader::OfferListReader;
use crate::semibook::types::{Block, BlockId, BookSide, Market, OfferListKey};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

/// Default number of re-initialization attempts after a failed one.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Event subscriber configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSubscriberConfig {
    /// Re-initialization attempts, one per handled block, before a failed
    /// semibook is abandoned
    pub max_retries: u32,
}

impl Default for EventSubscriberConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Routing key of a semibook: its offer list and options identity.
type SemibookKey = (OfferListKey, String);

type InitWaiter = oneshot::Sender<Result<(), SemibookError>>;

/// A semibook waiting to be initialized.
struct PendingInit {
    semibook: Arc<Semibook>,
    retries_left: u32,
    last_error: String,
    waiters: Vec<InitWaiter>,
}

/// Dispatches block changes and rollbacks to the semibooks it created.
pub struct EventSubscriber {
    /// Remote source handed to every semibook
    reader: Arc<dyn OfferListReader>,

    /// Retry configuration
    config: EventSubscriberConfig,

    /// Semibooks by offer list and options identity
    semibooks: DashMap<SemibookKey, Arc<Semibook>>,

    /// Last block handled, or the rollback target
    last_block: AtomicCell<BlockId>,

    /// Semibooks whose initialization failed and is retried on the next block
    pending: Mutex<Vec<PendingInit>>,

    /// Serializes block handling, rollbacks and connections
    block_lock: Mutex<()>,
}

impl EventSubscriber {
    /// Creates a subscriber whose block stream resumes after `start_block`.
    pub fn new(
        reader: Arc<dyn OfferListReader>,
        start_block: BlockId,
        config: EventSubscriberConfig,
    ) -> Self {
        Self {
            reader,
            config,
            semibooks: DashMap::new(),
            last_block: AtomicCell::new(start_block),
            pending: Mutex::new(Vec::new()),
            block_lock: Mutex::new(()),
        }
    }

    /// Last block handled.
    pub fn last_block(&self) -> BlockId {
        self.last_block.load()
    }

    /// Subscriber configuration.
    pub fn config(&self) -> &EventSubscriberConfig {
        &self.config
    }

    /// Number of semibooks routed by this subscriber.
    pub fn semibook_count(&self) -> usize {
        self.semibooks.len()
    }

    /// Semibooks following `key`, whatever their options.
    pub fn semibooks_for(&self, key: &OfferListKey) -> Vec<Arc<Semibook>> {
        self.semibooks
            .iter()
            .filter(|entry| entry.key().0 == *key)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn all_semibooks(&self) -> Vec<Arc<Semibook>> {
        self.semibooks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn unregister(&self, semibook: &Semibook) {
        let key = (semibook.offer_list_key(), semibook.options_id().to_string());
        self.semibooks.remove(&key);
    }

    /// Returns the semibook for `side` of `market` with `options`, creating
    /// and initializing it at the last handled block if needed, and registers
    /// `listener` on it.
    ///
    /// If initialization fails it is retried on the following blocks, and
    /// this call resolves once it succeeds or the retries run out.
    ///
    /// # Errors
    /// Returns [`SemibookError::InvalidOptions`] for invalid options,
    /// [`SemibookError::RetriesExhausted`] when initialization kept failing,
    /// and any non retryable initialization error.
    pub async fn connect(
        &self,
        market: &Market,
        side: BookSide,
        listener: SemibookListener,
        options: SemibookOptions,
    ) -> Result<(Arc<Semibook>, ListenerHandle), SemibookError> {
        options.validate()?;
        let key = (market.offer_list_key(side), options.options_id()?);

        let (semibook, handle, receiver) = {
            let _blocks = self.block_lock.lock().await;
            let existing = self
                .semibooks
                .get(&key)
                .map(|entry| Arc::clone(entry.value()));

            match existing {
                Some(semibook) => {
                    let handle = semibook.add_listener(listener);
                    debug!(key = %key.0, options_id = %key.1, "attached to existing semibook");
                    if semibook.is_synchronized() {
                        return Ok((semibook, handle));
                    }
                    let (sender, receiver) = oneshot::channel();
                    self.wait_for_init(&semibook, sender).await;
                    (semibook, handle, receiver)
                }
                None => {
                    let semibook = Arc::new(Semibook::new(
                        market.clone(),
                        side,
                        options,
                        Arc::clone(&self.reader),
                    )?);
                    let handle = semibook.add_listener(listener);
                    self.semibooks.insert(key.clone(), Arc::clone(&semibook));
                    info!(key = %key.0, options_id = %key.1, "semibook created");

                    let block = self.last_block.load();
                    match semibook.initialize(&block).await {
                        Ok(()) => return Ok((semibook, handle)),
                        Err(error @ SemibookError::FailedInitialize { .. }) => {
                            warn!(key = %key.0, %error, "initialization failed, will retry");
                            let (sender, receiver) = oneshot::channel();
                            self.enqueue(&semibook, &error, Some(sender)).await;
                            (semibook, handle, receiver)
                        }
                        Err(error) => {
                            self.fail(&semibook, &error);
                            semibook.remove_listener(handle);
                            return Err(error);
                        }
                    }
                }
            }
        };

        let outcome = match receiver.await {
            Ok(result) => result,
            Err(_) => Err(SemibookError::MissingSubscriber),
        };
        match outcome {
            Ok(()) => Ok((semibook, handle)),
            Err(error) => {
                semibook.remove_listener(handle);
                Err(error)
            }
        }
    }

    /// Removes a listener from whichever semibook holds it.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        self.all_semibooks()
            .iter()
            .any(|semibook| semibook.remove_listener(handle))
    }

    /// Registers `waiter` to be told when `semibook` finishes initializing.
    async fn wait_for_init(&self, semibook: &Arc<Semibook>, waiter: InitWaiter) {
        let mut pending = self.pending.lock().await;
        if let Some(position) = Self::position_of(&pending, semibook) {
            pending[position].waiters.push(waiter);
            return;
        }
        drop(pending);

        // not queued: a rollback reset it without a retry scheduled
        let block = self.last_block.load();
        match semibook.initialize(&block).await {
            Ok(()) => {
                let _ = waiter.send(Ok(()));
            }
            Err(error @ SemibookError::FailedInitialize { .. }) => {
                self.enqueue(semibook, &error, Some(waiter)).await;
            }
            Err(error) => {
                self.fail(semibook, &error);
                let _ = waiter.send(Err(error));
            }
        }
    }

    fn position_of(pending: &[PendingInit], semibook: &Arc<Semibook>) -> Option<usize> {
        pending
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.semibook, semibook))
    }

    /// Queues `semibook` for re-initialization after `error`.
    async fn enqueue(
        &self,
        semibook: &Arc<Semibook>,
        error: &SemibookError,
        waiter: Option<InitWaiter>,
    ) {
        if self.config.max_retries == 0 {
            self.abandon(semibook, 1, error.to_string(), waiter.into_iter().collect());
            return;
        }
        let mut pending = self.pending.lock().await;
        match Self::position_of(&pending, semibook) {
            Some(position) => {
                let entry = &mut pending[position];
                entry.last_error = error.to_string();
                entry.waiters.extend(waiter);
            }
            None => pending.push(PendingInit {
                semibook: Arc::clone(semibook),
                retries_left: self.config.max_retries,
                last_error: error.to_string(),
                waiters: waiter.into_iter().collect(),
            }),
        }
    }

    /// Marks `semibook` failed and stops routing to it.
    fn fail(&self, semibook: &Semibook, error: &SemibookError) {
        error!(key = %semibook.offer_list_key(), options_id = %semibook.options_id(), %error, "semibook failed");
        semibook.set_status(SyncStatus::Failed(error.to_string()));
        self.unregister(semibook);
    }

    /// Gives up on `semibook`, failing everyone waiting for it.
    fn abandon(
        &self,
        semibook: &Semibook,
        attempts: u32,
        last_error: String,
        waiters: Vec<InitWaiter>,
    ) {
        error!(
            key = %semibook.offer_list_key(),
            attempts,
            %last_error,
            "semibook initialization abandoned"
        );
        semibook.set_status(SyncStatus::Failed(last_error.clone()));
        self.unregister(semibook);
        let error = SemibookError::RetriesExhausted {
            attempts,
            last_error,
        };
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// Handles the next block of the stream with the logs it contains.
    ///
    /// Logs are applied in order by the semibooks following their offer
    /// list; every synchronized semibook then moves to `block`. Pending
    /// initializations are retried afterwards, at `block`.
    ///
    /// A semibook that cannot apply its logs is marked failed and dropped
    /// from the routing table. The others still move to `block`, and so
    /// does the subscriber.
    ///
    /// # Errors
    /// Returns [`SemibookError::BlockDiscontinuity`] if `block` does not
    /// extend the last handled block, leaving everything untouched, and
    /// otherwise the first error raised while applying a log.
    pub async fn handle_block(&self, block: &Block, logs: &[BookLog]) -> Result<(), SemibookError> {
        let _blocks = self.block_lock.lock().await;
        let last = self.last_block.load();
        if !block.extends(&last) {
            warn!(expected = %last, received = %block.id(), "block does not extend the last handled block");
            return Err(SemibookError::BlockDiscontinuity {
                expected: last,
                received: block.id(),
            });
        }

        let id = block.id();
        let mut routed: HashMap<OfferListKey, Vec<&BookLog>> = HashMap::new();
        for log in logs {
            if log.block != id {
                warn!(log_block = %log.block, block = %id, "log delivered with another block, ignored");
                continue;
            }
            routed.entry(log.ol_key).or_default().push(log);
        }

        let mut first_error = None;
        for semibook in self.all_semibooks() {
            let logs = routed
                .get(&semibook.offer_list_key())
                .map(Vec::as_slice)
                .unwrap_or_default();
            if let Err(error) = semibook.handle_block(&id, logs).await {
                self.fail(&semibook, &error);
                first_error.get_or_insert(error);
            }
        }
        self.last_block.store(id);
        debug!(block = %id, logs = logs.len(), "block handled");

        self.retry_pending(&id).await;
        first_error.map_or(Ok(()), Err)
    }

    async fn retry_pending(&self, block: &BlockId) {
        let mut pending = self.pending.lock().await;
        for mut entry in std::mem::take(&mut *pending) {
            match entry.semibook.initialize(block).await {
                Ok(()) => {
                    info!(
                        key = %entry.semibook.offer_list_key(),
                        block = block.number,
                        "pending semibook initialized"
                    );
                    for waiter in entry.waiters {
                        let _ = waiter.send(Ok(()));
                    }
                }
                Err(error) => {
                    entry.retries_left = entry.retries_left.saturating_sub(1);
                    entry.last_error = error.to_string();
                    let retryable = matches!(error, SemibookError::FailedInitialize { .. });
                    if entry.retries_left == 0 || !retryable {
                        let attempts = self.config.max_retries - entry.retries_left + 1;
                        self.abandon(&entry.semibook, attempts, entry.last_error, entry.waiters);
                    } else {
                        warn!(
                            key = %entry.semibook.offer_list_key(),
                            retries_left = entry.retries_left,
                            %error,
                            "semibook initialization failed again"
                        );
                        pending.push(entry);
                    }
                }
            }
        }
    }

    /// Rolls every semibook back to `target` after a reorganization.
    ///
    /// Semibooks that applied changes past `target` are initialized again at
    /// `target`; if that fails they are retried on the following blocks like
    /// any failed initialization. The next handled block must extend
    /// `target`.
    ///
    /// # Errors
    /// Returns the first non retryable initialization error. The semibook
    /// that raised it is marked failed and dropped; the others are still
    /// rolled back.
    pub async fn rollback(&self, target: &BlockId) -> Result<(), SemibookError> {
        let _blocks = self.block_lock.lock().await;
        info!(target = %target, "rolling back");
        self.last_block.store(*target);

        let mut first_error = None;
        for semibook in self.all_semibooks() {
            if !semibook.rewind(target).await {
                continue;
            }
            match semibook.initialize(target).await {
                Ok(()) => {}
                Err(error @ SemibookError::FailedInitialize { .. }) => {
                    warn!(key = %semibook.offer_list_key(), %error, "re-initialization after rollback failed, will retry");
                    self.enqueue(&semibook, &error, None).await;
                }
                Err(error) => {
                    self.fail(&semibook, &error);
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
