//! Unit tests for the snapshot store: aggregation, retention, filtering.

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::positions::{NewPosition, Position, PositionStore, PositionUpdate};
    use crate::snapshots::{PortfolioSnapshot, SnapshotOverrides, SnapshotStore};
    use crate::utils::today;

    fn position(symbol: &str, quantity: Decimal, price: Decimal) -> Position {
        PositionStore::validate(NewPosition {
            symbol: symbol.to_string(),
            quantity,
            purchase_price_per_share: price,
            ..Default::default()
        })
        .unwrap()
    }

    fn snapshot_on(date: &str, value: Decimal) -> PortfolioSnapshot {
        let snapshot_date: NaiveDate = date.parse().unwrap();
        PortfolioSnapshot {
            id: format!("snap-{}", date),
            snapshot_date,
            timestamp: snapshot_date.and_time(NaiveTime::MIN).and_utc(),
            total_portfolio_value: value,
            total_invested: value,
            gain_loss: Decimal::ZERO,
            gain_loss_percentage: Decimal::ZERO,
            positions_snapshot: Vec::new(),
        }
    }

    // ==================== Aggregation ====================

    #[test]
    fn test_create_aggregates_over_positions() {
        let positions = vec![
            position("AAPL", dec!(100), dec!(150)),
            position("MSFT", dec!(1000), dec!(140)),
            position("GOOG", dec!(300), dec!(100)),
        ];
        let mut store = SnapshotStore::new();
        let snapshot = store.create(&positions, SnapshotOverrides::default());

        assert_eq!(snapshot.total_portfolio_value, dec!(185000.00));
        assert_eq!(snapshot.total_invested, dec!(185000.00));
        assert_eq!(snapshot.gain_loss, dec!(0));
        assert_eq!(snapshot.gain_loss_percentage, dec!(0));
        assert_eq!(snapshot.snapshot_date, today());
        assert_eq!(snapshot.positions_snapshot.len(), 3);
    }

    #[test]
    fn test_create_values_positions_at_last_quote() {
        let mut positions = vec![position("AAPL", dec!(10), dec!(100))];
        positions[0].current_price = Some(dec!(110));

        let mut store = SnapshotStore::new();
        let snapshot = store.create(&positions, SnapshotOverrides::default());

        assert_eq!(snapshot.total_portfolio_value, dec!(1100.00));
        assert_eq!(snapshot.total_invested, dec!(1000.00));
        assert_eq!(snapshot.gain_loss, dec!(100.00));
        assert_eq!(snapshot.gain_loss_percentage, dec!(10.00));
    }

    #[test]
    fn test_create_with_no_positions_has_zero_percentage() {
        let mut store = SnapshotStore::new();
        let snapshot = store.create(&[], SnapshotOverrides::default());

        assert_eq!(snapshot.total_invested, dec!(0));
        assert_eq!(snapshot.total_portfolio_value, dec!(0));
        // Zero invested must not divide.
        assert_eq!(snapshot.gain_loss_percentage, dec!(0));
    }

    #[test]
    fn test_create_applies_caller_overrides() {
        let positions = vec![position("AAPL", dec!(10), dec!(100))];
        let mut store = SnapshotStore::new();
        let snapshot = store.create(
            &positions,
            SnapshotOverrides {
                snapshot_date: Some(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
                total_portfolio_value: Some(dec!(1250)),
            },
        );

        assert_eq!(
            snapshot.snapshot_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(snapshot.total_portfolio_value, dec!(1250.00));
        assert_eq!(snapshot.gain_loss, dec!(250.00));
        assert_eq!(snapshot.gain_loss_percentage, dec!(25.00));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_position_changes() {
        let mut positions = PositionStore::new();
        let lot = positions
            .add(NewPosition {
                symbol: "AAPL".to_string(),
                quantity: dec!(10),
                purchase_price_per_share: dec!(100),
                ..Default::default()
            })
            .unwrap();

        let mut snapshots = SnapshotStore::new();
        let snapshot = snapshots.create(&positions.list(), SnapshotOverrides::default());

        positions
            .update(
                &lot.id,
                PositionUpdate {
                    quantity: Some(dec!(999)),
                    ..Default::default()
                },
            )
            .unwrap();

        let retained = snapshots.list();
        assert_eq!(retained[0].positions_snapshot[0].quantity, dec!(10));
        assert_eq!(snapshot.positions_snapshot[0].quantity, dec!(10));
    }

    // ==================== Retention ====================

    #[test]
    fn test_retention_cap_drops_oldest_first() {
        let mut store = SnapshotStore::from_snapshots(
            vec![
                snapshot_on("2024-01-01", dec!(100)),
                snapshot_on("2024-02-01", dec!(200)),
                snapshot_on("2024-03-01", dec!(300)),
            ],
            3,
        );

        store.create(&[], SnapshotOverrides::default());

        assert_eq!(store.len(), 3);
        let dates: Vec<NaiveDate> = store.list().iter().map(|s| s.snapshot_date).collect();
        assert!(!dates.contains(&NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn test_from_snapshots_trims_to_retention() {
        let store = SnapshotStore::from_snapshots(
            vec![
                snapshot_on("2024-01-01", dec!(100)),
                snapshot_on("2024-02-01", dec!(200)),
                snapshot_on("2024-03-01", dec!(300)),
            ],
            2,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.list().last().unwrap().snapshot_date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_evict_oldest_goes_by_timestamp() {
        let mut store = SnapshotStore::from_snapshots(
            vec![
                snapshot_on("2024-03-01", dec!(300)),
                snapshot_on("2024-01-01", dec!(100)),
                snapshot_on("2024-02-01", dec!(200)),
            ],
            365,
        );

        let evicted = store.evict_oldest().unwrap();
        assert_eq!(
            evicted.snapshot_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(store.len(), 2);

        assert!(SnapshotStore::new().evict_oldest().is_none());
    }

    // ==================== Listing / filtering ====================

    #[test]
    fn test_list_is_most_recent_first() {
        let store = SnapshotStore::from_snapshots(
            vec![
                snapshot_on("2024-01-01", dec!(100)),
                snapshot_on("2024-03-01", dec!(300)),
                snapshot_on("2024-02-01", dec!(200)),
            ],
            365,
        );

        let dates: Vec<NaiveDate> = store.list().iter().map(|s| s.snapshot_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_by_date_range_is_inclusive() {
        let store = SnapshotStore::from_snapshots(
            vec![
                snapshot_on("2024-01-01", dec!(100)),
                snapshot_on("2024-02-01", dec!(200)),
                snapshot_on("2024-03-01", dec!(300)),
                snapshot_on("2024-04-01", dec!(400)),
            ],
            365,
        );

        let matched = store.by_date_range("2024-02-01", "2024-03-01");
        let dates: Vec<NaiveDate> = matched.iter().map(|s| s.snapshot_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_by_date_range_with_malformed_input_is_empty() {
        let store = SnapshotStore::from_snapshots(
            vec![snapshot_on("2024-01-01", dec!(100))],
            365,
        );
        assert!(store.by_date_range("invalid", "2024-01-01").is_empty());
        assert!(store.by_date_range("2024-01-01", "not-a-date").is_empty());
    }

    // ==================== Dirty tracking ====================

    #[test]
    fn test_create_and_eviction_mark_store_dirty() {
        let mut store = SnapshotStore::new();
        assert!(!store.is_dirty());

        store.create(&[], SnapshotOverrides::default());
        assert!(store.is_dirty());
        assert!(store.take_dirty());
        assert!(!store.is_dirty());

        store.evict_oldest();
        assert!(store.is_dirty());
    }
}
