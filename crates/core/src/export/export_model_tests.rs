//! Unit tests for the export/import document shapes and sanitizers.

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::export::{
        sanitize_positions, sanitize_snapshots, PortfolioExport, PortfolioImport, EXPORT_VERSION,
    };
    use crate::positions::{NewPosition, PositionStore};
    use crate::utils::today;

    #[test]
    fn test_build_records_counts() {
        let position = PositionStore::validate(NewPosition {
            symbol: "AAPL".to_string(),
            quantity: dec!(1),
            purchase_price_per_share: dec!(1),
            ..Default::default()
        })
        .unwrap();

        let export = PortfolioExport::build(vec![position], Vec::new());
        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.metadata.position_count, 1);
        assert_eq!(export.metadata.snapshot_count, 0);
        assert_eq!(export.metadata.generator, "pocketfolio");
    }

    #[test]
    fn test_sanitize_positions_keeps_full_records_intact() {
        let original = PositionStore::validate(NewPosition {
            symbol: "AAPL".to_string(),
            quantity: dec!(100),
            purchase_price_per_share: dec!(150),
            ..Default::default()
        })
        .unwrap();

        let (accepted, dropped) =
            sanitize_positions(vec![serde_json::to_value(&original).unwrap()]);
        assert_eq!(dropped, 0);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, original.id);
        assert_eq!(accepted[0].created_at, original.created_at);
        assert_eq!(accepted[0].total_investment, dec!(15000.00));
    }

    #[test]
    fn test_sanitize_positions_defaults_partial_entries() {
        let (accepted, dropped) = sanitize_positions(vec![json!({
            "symbol": "msft",
            "quantity": 5,
            "purchasePricePerShare": 300
        })]);
        assert_eq!(dropped, 0);
        assert_eq!(accepted[0].symbol, "MSFT");
        assert_eq!(accepted[0].purchase_date, today());
        assert!(!accepted[0].id.is_empty());
    }

    #[test]
    fn test_sanitize_positions_drops_invalid_entries_individually() {
        let valid = json!({
            "symbol": "AAPL",
            "quantity": 10,
            "purchasePricePerShare": 100
        });
        let zero_quantity = json!({
            "symbol": "AAPL",
            "quantity": 0,
            "purchasePricePerShare": 100
        });
        let garbage = json!("not a position");

        let (accepted, dropped) = sanitize_positions(vec![valid, zero_quantity, garbage]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_sanitize_snapshots_drops_unreadable_entries() {
        let valid = json!({
            "id": "snap-1",
            "snapshotDate": "2024-01-15",
            "timestamp": "2024-01-15T00:00:00Z",
            "totalPortfolioValue": 1000.0,
            "totalInvested": 900.0,
            "gainLoss": 100.0,
            "gainLossPercentage": 11.11
        });
        let garbage = json!({ "id": 42 });

        let (accepted, dropped) = sanitize_snapshots(vec![valid, garbage]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(dropped, 1);
        assert_eq!(accepted[0].id, "snap-1");
        assert!(accepted[0].positions_snapshot.is_empty());
    }

    #[test]
    fn test_import_document_tolerates_missing_sections() {
        let document: PortfolioImport = serde_json::from_str(r#"{"version": 1}"#).unwrap();
        assert_eq!(document.version, 1);
        assert!(document.positions.is_empty());
        assert!(document.snapshots.is_empty());
    }
}
