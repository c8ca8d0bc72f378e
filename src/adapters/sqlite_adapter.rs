//! SQLite store adapter.
//!
//! Buy and sell run their invariant checks and both writes inside a single
//! IMMEDIATE transaction, so concurrent trades against the same user serialize on
//! the database and can never jointly overdraw cash or oversell a position.

use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, TransactionBehavior, params};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::domain::error::PapertradeError;
use crate::domain::ledger::{LedgerEntry, NetPosition};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{StorePort, UserRecord};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Virtual cash granted to every new account.
pub fn starting_cash() -> Decimal {
    Decimal::new(10_000_00, 2)
}

#[derive(Debug)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertradeError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| PapertradeError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("database", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| PapertradeError::ConfigInvalid {
                section: "database".into(),
                key: "pool_size".into(),
                reason: format!("must be a positive integer, got {pool_size}"),
            })?;
        Self::open(&db_path, pool_size)
    }

    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, PapertradeError> {
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PapertradeError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), PapertradeError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                hash TEXT NOT NULL,
                phone TEXT NOT NULL,
                cash TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS stocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                shares INTEGER NOT NULL,
                price TEXT NOT NULL,
                date TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_stocks_user_symbol ON stocks(user_id, symbol);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PapertradeError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> PapertradeError {
    PapertradeError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, PapertradeError> {
    Decimal::from_str(text).map_err(|e| PapertradeError::Database {
        reason: format!("bad decimal {text:?}: {e}"),
    })
}

fn parse_date(text: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            text.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<(UserRecord, String), rusqlite::Error> {
    // cash comes back as text and is parsed by the caller, which can report a
    // proper domain error.
    let cash_text: String = row.get(4)?;
    Ok((
        UserRecord {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            phone: row.get(3)?,
            cash: Decimal::ZERO,
        },
        cash_text,
    ))
}

fn fetch_user(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<UserRecord>, PapertradeError> {
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let mut rows = stmt
        .query_map(params, row_to_user)
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)?;

    match rows.pop() {
        Some((mut user, cash_text)) => {
            user.cash = parse_decimal(&cash_text)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl StorePort for SqliteAdapter {
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        phone: &str,
    ) -> Result<UserRecord, PapertradeError> {
        let conn = self.conn()?;
        let cash = starting_cash();

        conn.execute(
            "INSERT INTO users (username, hash, phone, cash) VALUES (?1, ?2, ?3, ?4)",
            params![username, password_hash, phone, cash.to_string()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                PapertradeError::UsernameTaken {
                    username: username.to_string(),
                }
            } else {
                query_err(e)
            }
        })?;

        Ok(UserRecord {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            phone: phone.to_string(),
            cash,
        })
    }

    fn user_by_name(&self, username: &str) -> Result<Option<UserRecord>, PapertradeError> {
        let conn = self.conn()?;
        fetch_user(
            &conn,
            "SELECT id, username, hash, phone, cash FROM users WHERE username = ?1",
            params![username],
        )
    }

    fn user_by_id(&self, id: i64) -> Result<Option<UserRecord>, PapertradeError> {
        let conn = self.conn()?;
        fetch_user(
            &conn,
            "SELECT id, username, hash, phone, cash FROM users WHERE id = ?1",
            params![id],
        )
    }

    fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), PapertradeError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE users SET hash = ?1 WHERE id = ?2",
                params![password_hash, user_id],
            )
            .map_err(query_err)?;
        if updated == 0 {
            return Err(PapertradeError::UnknownUser);
        }
        Ok(())
    }

    fn delete_user(&self, user_id: i64) -> Result<(), PapertradeError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .map_err(query_err)?;
        if deleted == 0 {
            return Err(PapertradeError::UnknownUser);
        }
        Ok(())
    }

    fn cash(&self, user_id: i64) -> Result<Decimal, PapertradeError> {
        let conn = self.conn()?;
        read_cash(&conn, user_id)
    }

    fn record_buy(
        &self,
        user_id: i64,
        symbol: &str,
        shares: i64,
        price: Decimal,
        date: NaiveDateTime,
    ) -> Result<(), PapertradeError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let cash = read_cash(&tx, user_id)?;
        let cost = price * Decimal::from(shares);
        if cash < cost {
            return Err(PapertradeError::InsufficientCash {
                symbol: symbol.to_string(),
                shares,
                cost,
                cash,
            });
        }

        append_entry(&tx, user_id, symbol, shares, price, date)?;
        write_cash(&tx, user_id, cash - cost)?;

        tx.commit().map_err(query_err)
    }

    fn record_sell(
        &self,
        user_id: i64,
        symbol: &str,
        shares: i64,
        price: Decimal,
        date: NaiveDateTime,
    ) -> Result<(), PapertradeError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let held: i64 = tx
            .query_row(
                "SELECT COALESCE(SUM(shares), 0) FROM stocks
                 WHERE user_id = ?1 AND symbol = ?2",
                params![user_id, symbol],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        if shares > held {
            return Err(PapertradeError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: shares,
                held,
            });
        }

        let cash = read_cash(&tx, user_id)?;
        append_entry(&tx, user_id, symbol, -shares, price, date)?;
        write_cash(&tx, user_id, cash + price * Decimal::from(shares))?;

        tx.commit().map_err(query_err)
    }

    fn net_positions(&self, user_id: i64) -> Result<Vec<NetPosition>, PapertradeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, SUM(shares) FROM stocks
                 WHERE user_id = ?1
                 GROUP BY symbol HAVING SUM(shares) > 0
                 ORDER BY symbol",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(NetPosition {
                    symbol: row.get(0)?,
                    shares: row.get(1)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn history(&self, user_id: i64) -> Result<Vec<LedgerEntry>, PapertradeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, shares, price, date FROM stocks
                 WHERE user_id = ?1
                 ORDER BY date DESC, id DESC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let price_text: String = row.get(2)?;
                let date_text: String = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, price_text, date_text))
            })
            .map_err(query_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (symbol, shares, price_text, date_text) = row.map_err(query_err)?;
            entries.push(LedgerEntry {
                symbol,
                shares,
                price: parse_decimal(&price_text)?,
                date: parse_date(&date_text).map_err(query_err)?,
            });
        }

        Ok(entries)
    }
}

fn read_cash(conn: &Connection, user_id: i64) -> Result<Decimal, PapertradeError> {
    let text: Option<String> = conn
        .query_row(
            "SELECT cash FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(query_err(other)),
        })?;

    match text {
        Some(text) => parse_decimal(&text),
        None => Err(PapertradeError::UnknownUser),
    }
}

fn write_cash(conn: &Connection, user_id: i64, cash: Decimal) -> Result<(), PapertradeError> {
    conn.execute(
        "UPDATE users SET cash = ?1 WHERE id = ?2",
        params![cash.to_string(), user_id],
    )
    .map_err(query_err)?;
    Ok(())
}

fn append_entry(
    conn: &Connection,
    user_id: i64,
    symbol: &str,
    shares: i64,
    price: Decimal,
    date: NaiveDateTime,
) -> Result<(), PapertradeError> {
    conn.execute(
        "INSERT INTO stocks (symbol, shares, price, date, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            symbol,
            shares,
            price.to_string(),
            date.format(DATE_FORMAT).to_string(),
            user_id
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn trade_date(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn create_user_grants_starting_cash() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();
        assert_eq!(user.cash, dec!(10000.00));
        assert_eq!(store.cash(user.id).unwrap(), dec!(10000.00));
    }

    #[test]
    fn duplicate_username_is_rejected_without_a_row() {
        let store = adapter();
        store.create_user("alice", "hash", "+15550001111").unwrap();
        match store.create_user("alice", "other", "+15550002222") {
            Err(PapertradeError::UsernameTaken { username }) => assert_eq!(username, "alice"),
            other => panic!("expected UsernameTaken, got {other:?}"),
        }
        // original row untouched
        let user = store.user_by_name("alice").unwrap().unwrap();
        assert_eq!(user.password_hash, "hash");
    }

    #[test]
    fn user_lookup_misses_return_none() {
        let store = adapter();
        assert!(store.user_by_name("nobody").unwrap().is_none());
        assert!(store.user_by_id(99).unwrap().is_none());
    }

    #[test]
    fn unique_detection_ignores_other_constraint_failures() {
        let store = adapter();

        // foreign key failure: also a constraint violation, but not a duplicate
        let fk_err = store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO stocks (symbol, shares, price, date, user_id)
                 VALUES ('AAPL', 1, '10.00', '2024-03-01 09:00:00', 999)",
                [],
            )
            .unwrap_err();
        assert!(!is_unique_violation(&fk_err));

        store.create_user("alice", "hash", "+15550001111").unwrap();
        let dup_err = store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO users (username, hash, phone, cash)
                 VALUES ('alice', 'h', 'p', '0')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&dup_err));
    }

    struct PoolSizeConfig(i64);

    impl ConfigPort for PoolSizeConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            match (section, key) {
                ("database", "path") => Some(":memory:".to_string()),
                _ => None,
            }
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            match (section, key) {
                ("database", "pool_size") => self.0,
                _ => default,
            }
        }

        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }

        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn non_positive_pool_size_is_a_config_error() {
        for bad in [-1, 0] {
            match SqliteAdapter::from_config(&PoolSizeConfig(bad)) {
                Err(PapertradeError::ConfigInvalid { section, key, .. }) => {
                    assert_eq!(section, "database");
                    assert_eq!(key, "pool_size");
                }
                other => panic!("pool_size {bad} should be rejected, got {other:?}"),
            }
        }
        assert!(SqliteAdapter::from_config(&PoolSizeConfig(2)).is_ok());
    }

    #[test]
    fn buy_debits_exactly_price_times_shares() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();

        store
            .record_buy(user.id, "AAPL", 3, dec!(50.00), trade_date(1, 9))
            .unwrap();

        assert_eq!(store.cash(user.id).unwrap(), dec!(9850.00));
        let positions = store.net_positions(user.id).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "AAPL");
        assert_eq!(positions[0].shares, 3);
    }

    #[test]
    fn buy_beyond_cash_fails_and_changes_nothing() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();

        // cash 10000, 201 shares at 50.00 costs 10050
        let result = store.record_buy(user.id, "AAPL", 201, dec!(50.00), trade_date(1, 9));
        match result {
            Err(PapertradeError::InsufficientCash { cost, cash, .. }) => {
                assert_eq!(cost, dec!(10050.00));
                assert_eq!(cash, dec!(10000.00));
            }
            other => panic!("expected InsufficientCash, got {other:?}"),
        }

        assert_eq!(store.cash(user.id).unwrap(), dec!(10000.00));
        assert!(store.history(user.id).unwrap().is_empty());
    }

    #[test]
    fn sell_beyond_holdings_fails_and_changes_nothing() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();
        store
            .record_buy(user.id, "AAPL", 5, dec!(10.00), trade_date(1, 9))
            .unwrap();

        match store.record_sell(user.id, "AAPL", 6, dec!(10.00), trade_date(1, 10)) {
            Err(PapertradeError::InsufficientShares {
                requested, held, ..
            }) => {
                assert_eq!(requested, 6);
                assert_eq!(held, 5);
            }
            other => panic!("expected InsufficientShares, got {other:?}"),
        }

        assert_eq!(store.cash(user.id).unwrap(), dec!(9950.00));
        assert_eq!(store.history(user.id).unwrap().len(), 1);
    }

    #[test]
    fn sell_of_never_held_symbol_fails() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();
        assert!(matches!(
            store.record_sell(user.id, "NET", 1, dec!(10.00), trade_date(1, 9)),
            Err(PapertradeError::InsufficientShares { held: 0, .. })
        ));
    }

    #[test]
    fn buy_then_sell_round_trip_restores_cash_and_clears_position() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();

        store
            .record_buy(user.id, "AAPL", 4, dec!(25.50), trade_date(1, 9))
            .unwrap();
        store
            .record_sell(user.id, "AAPL", 4, dec!(25.50), trade_date(2, 9))
            .unwrap();

        assert_eq!(store.cash(user.id).unwrap(), dec!(10000.00));
        assert!(store.net_positions(user.id).unwrap().is_empty());
        // the ledger keeps both rows
        assert_eq!(store.history(user.id).unwrap().len(), 2);
    }

    #[test]
    fn net_positions_exclude_non_positive_sums_but_keep_others() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();

        store
            .record_buy(user.id, "AAPL", 2, dec!(10.00), trade_date(1, 9))
            .unwrap();
        store
            .record_buy(user.id, "NET", 3, dec!(10.00), trade_date(1, 10))
            .unwrap();
        store
            .record_sell(user.id, "AAPL", 2, dec!(10.00), trade_date(1, 11))
            .unwrap();

        let positions = store.net_positions(user.id).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "NET");
        assert_eq!(positions[0].shares, 3);
    }

    #[test]
    fn history_is_most_recent_first() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();

        store
            .record_buy(user.id, "AAPL", 1, dec!(10.00), trade_date(1, 9))
            .unwrap();
        store
            .record_buy(user.id, "NET", 1, dec!(20.00), trade_date(2, 9))
            .unwrap();
        store
            .record_sell(user.id, "AAPL", 1, dec!(11.00), trade_date(3, 9))
            .unwrap();

        let history = store.history(user.id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].symbol, "AAPL");
        assert_eq!(history[0].shares, -1);
        assert_eq!(history[1].symbol, "NET");
        assert_eq!(history[2].symbol, "AAPL");
        assert_eq!(history[2].shares, 1);
        assert_eq!(history[2].price, dec!(10.00));
    }

    #[test]
    fn deleting_a_user_cascades_to_the_ledger() {
        let store = adapter();
        let user = store.create_user("alice", "hash", "+15550001111").unwrap();
        store
            .record_buy(user.id, "AAPL", 1, dec!(10.00), trade_date(1, 9))
            .unwrap();

        store.delete_user(user.id).unwrap();

        assert!(store.user_by_id(user.id).unwrap().is_none());
        assert!(store.history(user.id).unwrap().is_empty());
    }

    #[test]
    fn update_password_replaces_hash() {
        let store = adapter();
        let user = store.create_user("alice", "old", "+15550001111").unwrap();
        store.update_password(user.id, "new").unwrap();
        let user = store.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(user.password_hash, "new");
    }

    #[test]
    fn update_password_for_missing_user_fails() {
        let store = adapter();
        assert!(matches!(
            store.update_password(42, "hash"),
            Err(PapertradeError::UnknownUser)
        ));
    }

    #[test]
    fn ledgers_are_per_user() {
        let store = adapter();
        let alice = store.create_user("alice", "hash", "+15550001111").unwrap();
        let bob = store.create_user("bob", "hash", "+15550002222").unwrap();

        store
            .record_buy(alice.id, "AAPL", 2, dec!(10.00), trade_date(1, 9))
            .unwrap();

        assert!(store.net_positions(bob.id).unwrap().is_empty());
        assert_eq!(store.cash(bob.id).unwrap(), dec!(10000.00));
    }
}
