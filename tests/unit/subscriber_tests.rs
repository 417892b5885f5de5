//! Integration tests for connecting semibooks and routing blocks through the
//! event subscriber.

#[cfg(test)]
mod tests {
    use crate::common::*;
    use alloy_primitives::{Address, U256};
    use semibook_rs::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn ten_offers() -> Vec<(OfferId, i32)> {
        [0, 1, 1, 2, 3, 5, 5, 5, 8, 13]
            .into_iter()
            .enumerate()
            .map(|(index, tick)| (index as OfferId + 1, tick))
            .collect()
    }

    fn setup() -> (Arc<MockReader>, EventSubscriber) {
        let reader = MockReader::new();
        reader.set_offers(&asks_key(), 1, &ten_offers());
        let subscriber = EventSubscriber::new(
            reader.clone(),
            block_id(1),
            EventSubscriberConfig::default(),
        );
        (reader, subscriber)
    }

    fn ids(semibook: &Semibook) -> Vec<OfferId> {
        semibook.iter().map(|offer| offer.id).collect()
    }

    fn unknown(key: OfferListKey, number: u64) -> BookLog {
        BookLog::new(
            block_id(number),
            0,
            key,
            MangroveEvent::Unknown {
                event: "Mystery".to_string(),
            },
        )
    }

    /// Block `number` of a chain that forks off the canonical one after
    /// block `fork`.
    fn forked_id(number: u64, fork: u64) -> BlockId {
        if number <= fork {
            block_id(number)
        } else {
            BlockId::new(number, hash(100 + number))
        }
    }

    fn forked_header(number: u64, fork: u64) -> Block {
        let parent = forked_id(number - 1, fork);
        Block::new(number, forked_id(number, fork).hash, parent.hash)
    }

    fn forked_retract(number: u64, fork: u64, id: OfferId) -> BookLog {
        let mut log = retract(asks_key(), number, id);
        log.block = forked_id(number, fork);
        log
    }

    #[tokio::test]
    async fn test_connect_initializes_at_last_block() {
        let (_, subscriber) = setup();

        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        assert!(semibook.is_synchronized());
        assert_eq!(semibook.synced_block(), Some(block_id(1)));
        assert_eq!(semibook.size(), 10);
        assert_eq!(semibook.best().unwrap().tick, 0);
        assert_eq!(subscriber.semibook_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_subscriber() {
        let result = Semibook::connect(
            None,
            &market(),
            BookSide::Asks,
            ignore(),
            SemibookOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(SemibookError::MissingSubscriber)));
    }

    #[tokio::test]
    async fn test_connect_through_semibook() {
        let (_, subscriber) = setup();

        let (semibook, _) = Semibook::connect(
            Some(&subscriber),
            &market(),
            BookSide::Asks,
            ignore(),
            SemibookOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(semibook.size(), 10);
    }

    #[tokio::test]
    async fn test_equivalent_options_share_semibook() {
        let (_, subscriber) = setup();
        let (first_listener, first_count) = counting_listener();
        let (second_listener, second_count) = counting_listener();

        let (first, _) = subscriber
            .connect(&market(), BookSide::Asks, first_listener, SemibookOptions::default())
            .await
            .unwrap();
        let options = SemibookOptions::builder()
            .with_max_offers(50)
            .with_chunk_size(50)
            .build()
            .unwrap();
        let (second, _) = subscriber
            .connect(&market(), BookSide::Asks, second_listener, options)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.listener_count(), 2);
        assert_eq!(subscriber.semibook_count(), 1);

        subscriber
            .handle_block(&header(2), &[retract(asks_key(), 2, 1)])
            .await
            .unwrap();
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_options_get_own_semibook() {
        let (_, subscriber) = setup();

        let (small, _) = subscriber
            .connect(
                &market(),
                BookSide::Asks,
                ignore(),
                SemibookOptions::builder().with_max_offers(3).build().unwrap(),
            )
            .await
            .unwrap();
        let (large, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&small, &large));
        assert_eq!(small.size(), 3);
        assert_eq!(large.size(), 10);
        assert_eq!(subscriber.semibooks_for(&asks_key()).len(), 2);
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let (_, subscriber) = setup();
        let (semibook, handle) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        assert!(subscriber.remove_listener(handle));
        assert!(!subscriber.remove_listener(handle));
        assert_eq!(semibook.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_logs_routed_to_their_offer_list() {
        let (reader, subscriber) = setup();
        let bids_key = market().offer_list_key(BookSide::Bids);
        reader.set_offers(&bids_key, 1, &[(1, 0), (2, 4)]);

        let (asks, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        let (bids, _) = subscriber
            .connect(&market(), BookSide::Bids, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        subscriber
            .handle_block(&header(2), &[retract(bids_key, 2, 1)])
            .await
            .unwrap();

        assert_eq!(asks.size(), 10);
        assert_eq!(ids(&bids), vec![2]);
        assert_eq!(asks.synced_block(), Some(block_id(2)));
        assert_eq!(bids.synced_block(), Some(block_id(2)));
        assert_eq!(subscriber.last_block(), block_id(2));
    }

    #[tokio::test]
    async fn test_block_discontinuity() {
        let (_, subscriber) = setup();
        subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        let result = subscriber.handle_block(&header(3), &[]).await;
        assert!(matches!(result, Err(SemibookError::BlockDiscontinuity { .. })));

        let forked = Block::new(2, hash(42), hash(41));
        let result = subscriber.handle_block(&forked, &[]).await;
        assert!(matches!(result, Err(SemibookError::BlockDiscontinuity { .. })));
        assert_eq!(subscriber.last_block(), block_id(1));
    }

    #[tokio::test]
    async fn test_log_from_other_block_ignored() {
        let (_, subscriber) = setup();
        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        subscriber
            .handle_block(&header(2), &[retract(asks_key(), 7, 1)])
            .await
            .unwrap();

        assert_eq!(semibook.size(), 10);
    }

    #[tokio::test]
    async fn test_unknown_event_surfaces() {
        let (_, subscriber) = setup();
        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        let result = subscriber
            .handle_block(&header(2), &[unknown(asks_key(), 2)])
            .await;
        assert!(matches!(result, Err(SemibookError::UnknownEvent(_))));
        assert!(matches!(semibook.status(), SyncStatus::Failed(_)));
        assert_eq!(subscriber.semibook_count(), 0);
        assert_eq!(subscriber.last_block(), block_id(2));

        // the stream keeps going
        subscriber.handle_block(&header(3), &[]).await.unwrap();
        assert_eq!(subscriber.last_block(), block_id(3));
    }

    #[tokio::test]
    async fn test_failing_offer_list_does_not_stall_others() {
        let (reader, subscriber) = setup();
        let bids_key = market().offer_list_key(BookSide::Bids);
        reader.set_offers(&bids_key, 1, &[(1, 0), (2, 4), (3, 9)]);

        let (asks, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        let (bids_listener, bids_events) = counting_listener();
        let (bids, _) = subscriber
            .connect(&market(), BookSide::Bids, bids_listener, SemibookOptions::default())
            .await
            .unwrap();

        let result = subscriber
            .handle_block(&header(2), &[unknown(asks_key(), 2), retract(bids_key, 2, 1)])
            .await;
        assert!(matches!(result, Err(SemibookError::UnknownEvent(_))));
        assert!(matches!(asks.status(), SyncStatus::Failed(_)));
        assert_eq!(ids(&bids), vec![2, 3]);
        assert_eq!(bids.synced_block(), Some(block_id(2)));
        assert_eq!(subscriber.last_block(), block_id(2));
        assert_eq!(subscriber.semibook_count(), 1);

        subscriber
            .handle_block(&header(3), &[unknown(asks_key(), 3), retract(bids_key, 3, 2)])
            .await
            .unwrap();
        assert_eq!(ids(&bids), vec![3]);
        assert_eq!(bids.synced_block(), Some(block_id(3)));
        assert_eq!(bids_events.load(Ordering::SeqCst), 2);
        assert_eq!(subscriber.last_block(), block_id(3));
    }

    #[tokio::test]
    async fn test_failed_initialization_retried_on_next_block() {
        let (reader, subscriber) = setup();
        reader.fail_next(1);

        let market = market();
        let header2 = header(2);
        let (connected, handled) = tokio::join!(
            subscriber.connect(&market, BookSide::Asks, ignore(), SemibookOptions::default()),
            subscriber.handle_block(&header2, &[]),
        );

        handled.unwrap();
        let (semibook, _) = connected.unwrap();
        assert!(semibook.is_synchronized());
        assert_eq!(semibook.synced_block(), Some(block_id(2)));
        assert_eq!(semibook.size(), 10);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let reader = MockReader::new();
        reader.set_offers(&asks_key(), 1, &ten_offers());
        let subscriber = EventSubscriber::new(
            reader.clone(),
            block_id(1),
            EventSubscriberConfig { max_retries: 2 },
        );
        reader.fail_next(u32::MAX);

        let market = market();
        let (connected, _) = tokio::join!(
            subscriber.connect(&market, BookSide::Asks, ignore(), SemibookOptions::default()),
            async {
                for number in 2..=4 {
                    subscriber.handle_block(&header(number), &[]).await.unwrap();
                }
            },
        );

        match connected {
            Err(SemibookError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(subscriber.semibook_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_detaches_listeners() {
        let reader = MockReader::new();
        reader.set_offers(&asks_key(), 1, &ten_offers());
        let subscriber = EventSubscriber::new(
            reader.clone(),
            block_id(1),
            EventSubscriberConfig { max_retries: 1 },
        );
        reader.fail_next(u32::MAX);

        let market = market();
        let (first, second, semibook) = tokio::join!(
            subscriber.connect(&market, BookSide::Asks, ignore(), SemibookOptions::default()),
            subscriber.connect(&market, BookSide::Asks, ignore(), SemibookOptions::default()),
            async {
                let semibook = Arc::clone(&subscriber.semibooks_for(&asks_key())[0]);
                assert_eq!(semibook.listener_count(), 2);
                subscriber.handle_block(&header(2), &[]).await.unwrap();
                semibook
            },
        );

        assert!(matches!(first, Err(SemibookError::RetriesExhausted { attempts: 2, .. })));
        assert!(matches!(second, Err(SemibookError::RetriesExhausted { attempts: 2, .. })));
        assert_eq!(semibook.listener_count(), 0);
        assert!(matches!(semibook.status(), SyncStatus::Failed(_)));
        assert_eq!(subscriber.semibook_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_then_longer_fork_matches_fresh_initialization() {
        let (reader, subscriber) = setup();
        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        // abandoned chain: offer 1 moves, then offer 2 is retracted
        let moved = BookLog::new(
            block_id(2),
            0,
            asks_key(),
            MangroveEvent::OfferWrite {
                maker: Address::ZERO,
                tick: 20,
                gives: U256::from(UNIT),
                gasprice: 0,
                gasreq: 80_000,
                id: 1,
            },
        );
        subscriber.handle_block(&header(2), &[moved]).await.unwrap();
        subscriber
            .handle_block(&header(3), &[retract(asks_key(), 3, 2)])
            .await
            .unwrap();
        assert_eq!(semibook.worst().unwrap().id, 1);

        subscriber.rollback(&block_id(1)).await.unwrap();

        // canonical chain: offer 1 then offer 3 are retracted, one block longer
        let mut canonical = ten_offers();
        canonical.retain(|(id, _)| *id != 1);
        reader.set_offers(&asks_key(), 2, &canonical);
        canonical.retain(|(id, _)| *id != 3);
        reader.set_offers(&asks_key(), 3, &canonical);
        subscriber
            .handle_block(&forked_header(2, 1), &[forked_retract(2, 1, 1)])
            .await
            .unwrap();
        subscriber
            .handle_block(&forked_header(3, 1), &[forked_retract(3, 1, 3)])
            .await
            .unwrap();
        subscriber.handle_block(&forked_header(4, 1), &[]).await.unwrap();

        let fresh_subscriber = EventSubscriber::new(
            reader.clone(),
            forked_id(4, 1),
            EventSubscriberConfig::default(),
        );
        let (fresh, _) = fresh_subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();

        assert_eq!(semibook.synced_block(), Some(forked_id(4, 1)));
        assert_eq!(ids(&semibook), vec![2, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(*semibook.snapshot(), *fresh.snapshot());
    }

    #[tokio::test]
    async fn test_rollback_matches_fresh_initialization() {
        let (reader, subscriber) = setup();
        let mut after_retract = ten_offers();
        after_retract.remove(0);
        reader.set_offers(&asks_key(), 2, &after_retract);

        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        subscriber
            .handle_block(&header(2), &[retract(asks_key(), 2, 1)])
            .await
            .unwrap();
        assert_eq!(semibook.best().unwrap().id, 2);

        subscriber.rollback(&block_id(1)).await.unwrap();

        let (_, fresh_subscriber) = setup();
        let (fresh, _) = fresh_subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        assert!(semibook.is_synchronized());
        assert_eq!(semibook.synced_block(), Some(block_id(1)));
        assert_eq!(*semibook.snapshot(), *fresh.snapshot());
        assert_eq!(subscriber.last_block(), block_id(1));

        // the stream resumes from the rollback target
        subscriber
            .handle_block(&header(2), &[retract(asks_key(), 2, 1)])
            .await
            .unwrap();
        assert_eq!(semibook.best().unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_rollback_without_changes_keeps_cache() {
        let (_, subscriber) = setup();
        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        subscriber.handle_block(&header(2), &[]).await.unwrap();
        subscriber.handle_block(&header(3), &[]).await.unwrap();

        subscriber.rollback(&block_id(2)).await.unwrap();

        assert!(semibook.is_synchronized());
        assert_eq!(semibook.synced_block(), Some(block_id(2)));
        assert_eq!(semibook.size(), 10);
    }

    #[tokio::test]
    async fn test_failed_reinitialization_after_rollback_retried() {
        let (reader, subscriber) = setup();
        let (semibook, _) = subscriber
            .connect(&market(), BookSide::Asks, ignore(), SemibookOptions::default())
            .await
            .unwrap();
        subscriber
            .handle_block(&header(2), &[retract(asks_key(), 2, 1)])
            .await
            .unwrap();

        reader.fail_next(1);
        subscriber.rollback(&block_id(1)).await.unwrap();
        assert_eq!(semibook.status(), SyncStatus::Uninitialized);

        subscriber.handle_block(&header(2), &[]).await.unwrap();
        assert!(semibook.is_synchronized());
        assert_eq!(semibook.synced_block(), Some(block_id(2)));
        assert_eq!(semibook.size(), 10);
    }
}
