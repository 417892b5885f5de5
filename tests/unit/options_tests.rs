//! Integration tests for semibook options and price conversions.

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use rust_decimal::Decimal;
    use semibook_rs::prelude::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = SemibookOptions::default();

        assert_eq!(options.max_offers(), Some(50));
        assert_eq!(options.chunk_size(), 50);
        assert_eq!(options, SemibookOptions::builder().build().unwrap());
    }

    #[test]
    fn test_chunk_size_follows_max_offers() {
        let options = SemibookOptions::builder().with_max_offers(7).build().unwrap();
        assert_eq!(options.chunk_size(), 7);

        let options = SemibookOptions::builder()
            .with_desired_price(dec("2"))
            .build()
            .unwrap();
        assert_eq!(options.chunk_size(), 50);
        assert_eq!(options.max_offers(), None);
    }

    #[test]
    fn test_single_bound_only() {
        let result = SemibookOptions::builder()
            .with_max_offers(10)
            .with_desired_volume(VolumeParams::sell(U256::from(5u8)))
            .build();

        assert!(matches!(result, Err(SemibookError::InvalidOptions(_))));
    }

    #[test]
    fn test_invalid_sizes_and_prices() {
        assert!(SemibookOptions::builder().with_max_offers(0).build().is_err());
        assert!(SemibookOptions::builder().with_chunk_size(0).build().is_err());
        assert!(
            SemibookOptions::builder()
                .with_desired_price(dec("-1"))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_deserialized_options_are_validated() {
        let options: SemibookOptions = serde_json::from_str(
            r#"{"bound":{"kind":"max_offers","max_offers":0},"chunk_size":10}"#,
        )
        .unwrap();

        assert!(matches!(options.validate(), Err(SemibookError::InvalidOptions(_))));
    }

    #[test]
    fn test_options_id_identity() {
        let default_id = SemibookOptions::default().options_id().unwrap();
        let explicit = SemibookOptions::builder()
            .with_max_offers(50)
            .with_chunk_size(50)
            .build()
            .unwrap();
        let other = SemibookOptions::builder().with_max_offers(51).build().unwrap();

        assert_eq!(default_id.len(), 64);
        assert_eq!(explicit.options_id().unwrap(), default_id);
        assert_ne!(other.options_id().unwrap(), default_id);
    }

    #[test]
    fn test_options_id_ignores_price_scale() {
        let short = SemibookOptions::builder()
            .with_desired_price(dec("1.5"))
            .build()
            .unwrap();
        let long = SemibookOptions::builder()
            .with_desired_price(dec("1.500"))
            .build()
            .unwrap();

        assert_eq!(short.options_id().unwrap(), long.options_id().unwrap());
    }

    #[test]
    fn test_bound_serialization() {
        let options = SemibookOptions::builder().with_max_offers(3).build().unwrap();
        let value = serde_json::to_value(options.bound()).unwrap();

        assert_eq!(value["kind"], "max_offers");
        assert_eq!(value["max_offers"], 3);
    }

    #[test]
    fn test_tick_price_round_trip_on_both_sides() {
        let market = Market::new(
            Token::new(Default::default(), "BASE", 18),
            Token::new(Default::default(), "QUOTE", 6),
            1,
        );
        for side in [BookSide::Asks, BookSide::Bids] {
            let helper = market.tick_price_helper(side);
            for tick in [-20_000, -1, 0, 1, 345, 20_000] {
                let price = helper.price_from_tick(tick).unwrap();
                assert_eq!(helper.tick_from_price(price, RoundingMode::Nearest).unwrap(), tick);
            }
        }
    }

    #[test]
    fn test_better_ticks_mean_better_prices() {
        let market = Market::new(
            Token::new(Default::default(), "BASE", 18),
            Token::new(Default::default(), "QUOTE", 18),
            1,
        );
        let asks = market.tick_price_helper(BookSide::Asks);
        let bids = market.tick_price_helper(BookSide::Bids);

        // asks get more expensive, bids pay less as ticks grow
        assert!(asks.price_from_tick(10).unwrap() > asks.price_from_tick(0).unwrap());
        assert!(bids.price_from_tick(10).unwrap() < bids.price_from_tick(0).unwrap());
    }
}
