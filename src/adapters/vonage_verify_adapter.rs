//! Vonage Verify adapter for phone one-time codes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;
use crate::ports::sms_port::SmsPort;

const DEFAULT_BASE_URL: &str = "https://api.nexmo.com";
const CODE_LENGTH: &str = "6";

// Vonage verify statuses: "0" success, "16" wrong code, "17" too many wrong
// attempts for this request.
const STATUS_OK: &str = "0";
const STATUS_WRONG_CODE: &str = "16";
const STATUS_TOO_MANY_ATTEMPTS: &str = "17";

pub struct VonageVerifyAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    brand: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    status: String,
    request_id: Option<String>,
    error_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    status: String,
    error_text: Option<String>,
}

impl VonageVerifyAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertradeError> {
        let missing = |key: &str| PapertradeError::ConfigMissing {
            section: "sms".into(),
            key: key.into(),
        };
        Ok(Self::new(
            config
                .get_string("sms", "base_url")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            config.get_string("sms", "api_key").ok_or_else(|| missing("api_key"))?,
            config
                .get_string("sms", "api_secret")
                .ok_or_else(|| missing("api_secret"))?,
            config
                .get_string("sms", "brand")
                .unwrap_or_else(|| "Papertrade".to_string()),
        ))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            brand: brand.into(),
        }
    }
}

fn unavailable(reason: impl ToString) -> PapertradeError {
    PapertradeError::ServiceUnavailable {
        service: "sms",
        reason: reason.to_string(),
    }
}

#[async_trait]
impl SmsPort for VonageVerifyAdapter {
    async fn start_verification(&self, number: &str) -> Result<String, PapertradeError> {
        let url = format!("{}/verify/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("api_secret", self.api_secret.as_str()),
                ("number", number),
                ("brand", self.brand.as_str()),
                ("code_length", CODE_LENGTH),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "verify start returned {}",
                response.status()
            )));
        }

        let body: StartResponse = response.json().await.map_err(unavailable)?;
        if body.status != STATUS_OK {
            return Err(unavailable(
                body.error_text
                    .unwrap_or_else(|| format!("verify start status {}", body.status)),
            ));
        }

        body.request_id
            .ok_or_else(|| unavailable("verify start returned no request_id"))
    }

    async fn check(&self, request_id: &str, code: &str) -> Result<bool, PapertradeError> {
        let url = format!("{}/verify/check/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("api_secret", self.api_secret.as_str()),
                ("request_id", request_id),
                ("code", code),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "verify check returned {}",
                response.status()
            )));
        }

        let body: CheckResponse = response.json().await.map_err(unavailable)?;
        match body.status.as_str() {
            STATUS_OK => Ok(true),
            STATUS_WRONG_CODE | STATUS_TOO_MANY_ATTEMPTS => Ok(false),
            other => Err(unavailable(
                body.error_text
                    .unwrap_or_else(|| format!("verify check status {other}")),
            )),
        }
    }
}
