//! Prefix fetcher: paginated reads of the remote offer list.

use crate::semibook::error::SemibookError;
use crate::semibook::reader::{OfferListReader, RemoteOffer};
use crate::semibook::types::{BlockId, OfferId, OfferListKey};
use tracing::{debug, trace};

/// Result of a prefix fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPrefix {
    /// Offers read, best to worst
    pub offers: Vec<RemoteOffer>,
    /// Whether the remote list ended within the fetched range
    pub exhausted: bool,
}

/// Reads `key` in chunks of `chunk_size` offers starting at `from_id`
/// (inclusive, `0` for the best offer), every read pinned to `block`.
///
/// After each non empty chunk `stop(chunk, all_so_far)` decides whether
/// enough has been read. Fetching also ends when the remote list is
/// exhausted, in which case the result is marked as such even if `stop`
/// held.
///
/// # Errors
/// Returns [`SemibookError::FailedInitialize`] if any read fails, including
/// when `block` has been reorganized away.
pub async fn fetch_prefix_until<F>(
    reader: &dyn OfferListReader,
    key: &OfferListKey,
    block: &BlockId,
    from_id: OfferId,
    chunk_size: usize,
    mut stop: F,
) -> Result<FetchedPrefix, SemibookError>
where
    F: FnMut(&[RemoteOffer], &[RemoteOffer]) -> bool + Send,
{
    let chunk_size = chunk_size.max(1);
    let mut offers: Vec<RemoteOffer> = Vec::new();
    let mut cursor = from_id;

    loop {
        let page = reader
            .offer_list(key, cursor, chunk_size, block)
            .await
            .map_err(|source| SemibookError::FailedInitialize {
                block: block.number,
                source,
            })?;
        trace!(
            from = cursor,
            received = page.offers.len(),
            next = page.next_id,
            "fetched offer list chunk"
        );

        let start = offers.len();
        offers.extend(page.offers);
        let chunk = &offers[start..];
        // the last chunk still goes through `stop`, which may consume it
        let satisfied = !chunk.is_empty() && stop(chunk, &offers);
        if chunk.is_empty() || page.next_id == 0 {
            debug!(offers = offers.len(), block = block.number, "offer list exhausted");
            return Ok(FetchedPrefix {
                offers,
                exhausted: true,
            });
        }
        if satisfied {
            debug!(offers = offers.len(), block = block.number, "prefix fetched");
            return Ok(FetchedPrefix {
                offers,
                exhausted: false,
            });
        }
        cursor = page.next_id;
    }
}
