//! Trade ledger types and net-position arithmetic.
//!
//! The ledger is append-only: a buy inserts a row with positive `shares`, a sell a
//! row with negative `shares`. Current holdings are always derived by summing, never
//! stored.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One immutable record of a buy or sell.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub symbol: String,
    /// Signed share count: positive = bought, negative = sold.
    pub shares: i64,
    /// Price per share at the time of the trade.
    pub price: Decimal,
    pub date: NaiveDateTime,
}

/// Net holdings for one symbol, always positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetPosition {
    pub symbol: String,
    pub shares: i64,
}

/// Group entries by symbol, sum the signed share counts, and keep only symbols with
/// a positive net position, ordered by symbol.
///
/// This is the reference computation for what the SQL aggregation in the store must
/// produce.
pub fn net_positions(entries: &[LedgerEntry]) -> Vec<NetPosition> {
    let mut sums: BTreeMap<&str, i64> = BTreeMap::new();
    for entry in entries {
        *sums.entry(entry.symbol.as_str()).or_insert(0) += entry.shares;
    }
    sums.into_iter()
        .filter(|(_, shares)| *shares > 0)
        .map(|(symbol, shares)| NetPosition {
            symbol: symbol.to_string(),
            shares,
        })
        .collect()
}

/// Net shares held of a single symbol, zero if never traded.
pub fn net_shares(entries: &[LedgerEntry], symbol: &str) -> i64 {
    entries
        .iter()
        .filter(|e| e.symbol == symbol)
        .map(|e| e.shares)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn entry(symbol: &str, shares: i64) -> LedgerEntry {
        LedgerEntry {
            symbol: symbol.to_string(),
            shares,
            price: dec!(10.00),
            date: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn sums_signed_shares_per_symbol() {
        let entries = vec![
            entry("AAPL", 5),
            entry("NET", 3),
            entry("AAPL", -2),
            entry("NET", 1),
        ];
        let positions = net_positions(&entries);
        assert_eq!(
            positions,
            vec![
                NetPosition {
                    symbol: "AAPL".into(),
                    shares: 3
                },
                NetPosition {
                    symbol: "NET".into(),
                    shares: 4
                },
            ]
        );
    }

    #[test]
    fn excludes_fully_sold_symbols() {
        let entries = vec![entry("AAPL", 5), entry("AAPL", -5), entry("NET", 1)];
        let positions = net_positions(&entries);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "NET");
    }

    #[test]
    fn empty_ledger_has_no_positions() {
        assert!(net_positions(&[]).is_empty());
    }

    #[test]
    fn net_shares_for_unknown_symbol_is_zero() {
        assert_eq!(net_shares(&[entry("AAPL", 5)], "NET"), 0);
    }

    proptest! {
        /// Net position per symbol always equals the plain sum of its signed
        /// share counts, whatever the interleaving.
        #[test]
        fn net_matches_manual_sum(counts in proptest::collection::vec(-10i64..=10, 0..40)) {
            let entries: Vec<LedgerEntry> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| entry(if i % 2 == 0 { "AAPL" } else { "NET" }, n))
                .collect();

            let expected_aapl: i64 = counts.iter().step_by(2).sum();
            let expected_net: i64 = counts.iter().skip(1).step_by(2).sum();

            prop_assert_eq!(net_shares(&entries, "AAPL"), expected_aapl);
            prop_assert_eq!(net_shares(&entries, "NET"), expected_net);

            for p in net_positions(&entries) {
                prop_assert!(p.shares > 0);
                prop_assert_eq!(p.shares, net_shares(&entries, &p.symbol));
            }
        }
    }
}
