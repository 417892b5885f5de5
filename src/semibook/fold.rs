//! Folding over the offer list, extending the cache on demand

use super::book::Semibook;
use super::cache::SemibookState;
use super::error::SemibookError;
use super::fetcher::fetch_prefix_until;
use super::offer::Offer;
use std::sync::Arc;
use tracing::debug;

impl Semibook {
    /// Folds `step` over the offers best to worst until `stop` holds.
    ///
    /// The fold first runs on the committed state without locking. If the
    /// cache runs out before `stop` holds and may not hold the whole list,
    /// the fold is run again under the sync lock, on whatever state is
    /// committed by then, and continues on offers fetched from the remote
    /// list at the synchronized block. Fetched offers are added to the cache
    /// within its bound.
    ///
    /// # Errors
    /// Surfaces fetch failures.
    pub async fn fold_left_until<A, S, F>(
        &self,
        initial: A,
        stop: S,
        mut step: F,
    ) -> Result<A, SemibookError>
    where
        A: Clone + Send,
        S: Fn(&A) -> bool + Send + Sync,
        F: FnMut(&Offer, &mut A) + Send,
    {
        let snapshot = self.snapshot();
        let (acc, needs_more) = fold_cached(&snapshot, initial.clone(), &stop, &mut step);
        if !needs_more {
            return Ok(acc);
        }
        drop(snapshot);

        let _sync = self.sync_lock.lock().await;
        let snapshot = self.snapshot();
        let (mut acc, needs_more) = fold_cached(&snapshot, initial, &stop, &mut step);
        if !needs_more {
            return Ok(acc);
        }
        let Some(block) = self.synced_block() else {
            return Ok(acc);
        };

        let from_id = snapshot.worst().unwrap_or(0);
        debug!(
            key = %self.key,
            from_id,
            block = block.number,
            cached = snapshot.len(),
            "cache exhausted during fold, fetching more offers"
        );
        let prefix = fetch_prefix_until(
            self.reader.as_ref(),
            &self.key,
            &block,
            from_id,
            self.options.chunk_size(),
            |chunk, _| {
                for remote in chunk {
                    if snapshot.contains(remote.id) {
                        continue;
                    }
                    if stop(&acc) {
                        return true;
                    }
                    step(&remote.to_cache_offer(), &mut acc);
                }
                stop(&acc)
            },
        )
        .await?;
        drop(snapshot);

        let max_offers = self.options.max_offers();
        {
            let mut guard = self.write_state();
            let state = Arc::make_mut(&mut *guard);
            if prefix.exhausted {
                state.set_complete(true);
            }
            for remote in &prefix.offers {
                if !state.contains(remote.id) {
                    state.insert(remote.to_cache_offer(), max_offers);
                }
            }
        }
        Ok(acc)
    }
}

/// Folds over the cached offers. The flag tells whether the fold ran out of
/// offers before `stop` held while more may exist remotely.
fn fold_cached<A, S, F>(state: &SemibookState, mut acc: A, stop: &S, step: &mut F) -> (A, bool)
where
    S: Fn(&A) -> bool,
    F: FnMut(&Offer, &mut A),
{
    for offer in state.iter() {
        if stop(&acc) {
            return (acc, false);
        }
        step(offer, &mut acc);
    }
    let satisfied = stop(&acc);
    (acc, !satisfied && !state.is_complete())
}
