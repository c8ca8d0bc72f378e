//! IEX Cloud quote adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::{Quote, QuotePort};

const DEFAULT_BASE_URL: &str = "https://cloud.iexapis.com";

pub struct IexQuoteAdapter {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "companyName")]
    company_name: String,
    #[serde(rename = "latestPrice")]
    latest_price: Decimal,
}

impl IexQuoteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertradeError> {
        let token =
            config
                .get_string("quote", "token")
                .ok_or_else(|| PapertradeError::ConfigMissing {
                    section: "quote".into(),
                    key: "token".into(),
                })?;
        let base_url = config
            .get_string("quote", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(base_url, token))
    }

    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

fn unavailable(reason: impl ToString) -> PapertradeError {
    PapertradeError::ServiceUnavailable {
        service: "quote",
        reason: reason.to_string(),
    }
}

#[async_trait]
impl QuotePort for IexQuoteAdapter {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, PapertradeError> {
        let url = format!("{}/stable/stock/{}/quote", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(unavailable)?;

        // IEX answers 404 for symbols it does not know.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(unavailable(format!(
                "quote lookup for {symbol} returned {}",
                response.status()
            )));
        }

        let body: QuoteResponse = response.json().await.map_err(unavailable)?;
        Ok(Some(Quote {
            name: body.company_name,
            price: body.latest_price,
        }))
    }
}
