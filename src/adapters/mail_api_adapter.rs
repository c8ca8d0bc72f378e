//! Outbound mail via a transactional mail HTTP API.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;
use crate::ports::mail_port::MailPort;

pub struct MailApiAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl MailApiAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertradeError> {
        let missing = |key: &str| PapertradeError::ConfigMissing {
            section: "mail".into(),
            key: key.into(),
        };
        Ok(Self::new(
            config
                .get_string("mail", "endpoint")
                .ok_or_else(|| missing("endpoint"))?,
            config
                .get_string("mail", "api_key")
                .ok_or_else(|| missing("api_key"))?,
            config
                .get_string("mail", "sender")
                .ok_or_else(|| missing("sender"))?,
        ))
    }

    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }
}

fn unavailable(reason: impl ToString) -> PapertradeError {
    PapertradeError::ServiceUnavailable {
        service: "mail",
        reason: reason.to_string(),
    }
}

#[async_trait]
impl MailPort for MailApiAdapter {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), PapertradeError> {
        let message = OutboundMessage {
            from: &self.sender,
            to: recipient,
            subject,
            html: html_body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(unavailable(format!("mail send returned {}", response.status())));
        }

        Ok(())
    }
}
