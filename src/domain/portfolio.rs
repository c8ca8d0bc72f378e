//! Portfolio aggregation: derived holdings joined with live quotes.

use rust_decimal::Decimal;

use crate::domain::error::PapertradeError;
use crate::ports::quote_port::QuotePort;
use crate::ports::store_port::StorePort;

/// One currently-held position with its live valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Decimal,
    /// price * shares
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
    pub cash: Decimal,
    /// cash plus the sum of all position values.
    pub grand_total: Decimal,
}

/// Derive the user's portfolio: net positions from the ledger, one live quote per
/// held symbol, position value = price * shares. Quotes are fetched fresh on every
/// call; a symbol the provider no longer knows surfaces as an error for the whole
/// aggregation.
pub async fn aggregate(
    store: &dyn StorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
) -> Result<Portfolio, PapertradeError> {
    let cash = store.cash(user_id)?;
    let positions = store.net_positions(user_id)?;

    let mut holdings = Vec::with_capacity(positions.len());
    let mut grand_total = cash;
    for position in positions {
        let quote = quotes
            .lookup(&position.symbol)
            .await?
            .ok_or_else(|| PapertradeError::UnknownSymbol {
                symbol: position.symbol.clone(),
            })?;
        let value = quote.price * Decimal::from(position.shares);
        grand_total += value;
        holdings.push(Holding {
            symbol: position.symbol,
            name: quote.name,
            shares: position.shares,
            price: quote.price,
            value,
        });
    }

    Ok(Portfolio {
        holdings,
        cash,
        grand_total,
    })
}
