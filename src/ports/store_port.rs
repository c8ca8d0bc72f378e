//! Persistence port: user accounts plus the append-only trade ledger.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::domain::error::PapertradeError;
use crate::domain::ledger::{LedgerEntry, NetPosition};

/// A persisted user row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    /// Argon2id hash in PHC string format.
    pub password_hash: String,
    pub phone: String,
    pub cash: Decimal,
}

pub trait StorePort: Send + Sync {
    /// Insert a new user with the default starting cash. Fails with
    /// [`PapertradeError::UsernameTaken`] if the username exists; no row is created
    /// in that case.
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        phone: &str,
    ) -> Result<UserRecord, PapertradeError>;

    fn user_by_name(&self, username: &str) -> Result<Option<UserRecord>, PapertradeError>;

    fn user_by_id(&self, id: i64) -> Result<Option<UserRecord>, PapertradeError>;

    fn update_password(&self, user_id: i64, password_hash: &str)
    -> Result<(), PapertradeError>;

    /// Delete the user; ledger rows cascade.
    fn delete_user(&self, user_id: i64) -> Result<(), PapertradeError>;

    fn cash(&self, user_id: i64) -> Result<Decimal, PapertradeError>;

    /// Atomically verify cash >= shares * price, append the ledger row, and debit
    /// cash. The check and both writes must happen in one transaction so a
    /// concurrent buy cannot overdraw.
    fn record_buy(
        &self,
        user_id: i64,
        symbol: &str,
        shares: i64,
        price: Decimal,
        date: NaiveDateTime,
    ) -> Result<(), PapertradeError>;

    /// Atomically verify net holdings >= shares, append a negated ledger row, and
    /// credit cash. Same single-transaction requirement as [`Self::record_buy`].
    fn record_sell(
        &self,
        user_id: i64,
        symbol: &str,
        shares: i64,
        price: Decimal,
        date: NaiveDateTime,
    ) -> Result<(), PapertradeError>;

    /// Symbols with positive net holdings for the user, ordered by symbol.
    fn net_positions(&self, user_id: i64) -> Result<Vec<NetPosition>, PapertradeError>;

    /// Every ledger entry for the user, most recent first.
    fn history(&self, user_id: i64) -> Result<Vec<LedgerEntry>, PapertradeError>;
}
