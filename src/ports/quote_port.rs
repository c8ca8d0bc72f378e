//! Live stock quote port.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::error::PapertradeError;

/// Externally supplied current name and price for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub name: String,
    pub price: Decimal,
}

#[async_trait]
pub trait QuotePort: Send + Sync {
    /// Look up the current quote for a symbol. `Ok(None)` means the symbol is
    /// unknown; quotes are never cached, every call hits the provider.
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, PapertradeError>;
}
