//! Transaction processor: validates and executes buy/sell orders.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::error::PapertradeError;
use crate::ports::quote_port::QuotePort;
use crate::ports::store_port::StorePort;

/// A validated buy or sell request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Upper-cased, non-empty symbol.
    pub symbol: String,
    /// Always positive; the ledger sign is decided by buy vs sell.
    pub shares: i64,
}

impl Order {
    /// Validate raw form input: symbol must be non-empty (case-normalized to
    /// uppercase), shares must parse to a positive whole number.
    pub fn parse(symbol: &str, shares: &str) -> Result<Self, PapertradeError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(PapertradeError::MissingField { field: "symbol" });
        }

        let shares = shares.trim();
        if shares.is_empty() {
            return Err(PapertradeError::MissingField { field: "shares" });
        }
        let shares: i64 = shares
            .parse()
            .map_err(|_| PapertradeError::InvalidField {
                field: "shares",
                reason: "must be a whole number".into(),
            })?;
        if shares <= 0 {
            return Err(PapertradeError::InvalidField {
                field: "shares",
                reason: "must be a positive number".into(),
            });
        }

        Ok(Self { symbol, shares })
    }
}

/// Receipt for a completed trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub symbol: String,
    pub shares: i64,
    pub price: Decimal,
    pub total: Decimal,
}

/// Execute a buy: look up the live price, then atomically check cash, append the
/// ledger row, and debit cash. The cash check lives inside the store transaction so
/// concurrent buys cannot jointly overdraw.
pub async fn execute_buy(
    store: &dyn StorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
    order: &Order,
) -> Result<Execution, PapertradeError> {
    let quote = quotes
        .lookup(&order.symbol)
        .await?
        .ok_or_else(|| PapertradeError::UnknownSymbol {
            symbol: order.symbol.clone(),
        })?;

    let total = quote.price * Decimal::from(order.shares);
    store.record_buy(
        user_id,
        &order.symbol,
        order.shares,
        quote.price,
        Utc::now().naive_utc(),
    )?;

    tracing::info!(user_id, symbol = %order.symbol, shares = order.shares, %total, "buy executed");

    Ok(Execution {
        symbol: order.symbol.clone(),
        shares: order.shares,
        price: quote.price,
        total,
    })
}

/// Execute a sell: look up the live price, then atomically check net holdings,
/// append a negated ledger row, and credit cash.
pub async fn execute_sell(
    store: &dyn StorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
    order: &Order,
) -> Result<Execution, PapertradeError> {
    let quote = quotes
        .lookup(&order.symbol)
        .await?
        .ok_or_else(|| PapertradeError::UnknownSymbol {
            symbol: order.symbol.clone(),
        })?;

    let total = quote.price * Decimal::from(order.shares);
    store.record_sell(
        user_id,
        &order.symbol,
        order.shares,
        quote.price,
        Utc::now().naive_utc(),
    )?;

    tracing::info!(user_id, symbol = %order.symbol, shares = order.shares, %total, "sell executed");

    Ok(Execution {
        symbol: order.symbol.clone(),
        shares: order.shares,
        price: quote.price,
        total,
    })
}
