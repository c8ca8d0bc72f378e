//! Outbound email port.

use async_trait::async_trait;

use crate::domain::error::PapertradeError;

#[async_trait]
pub trait MailPort: Send + Sync {
    /// Send a single HTML email. Fire-and-forget from the caller's perspective;
    /// an error only fails the current request.
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), PapertradeError>;
}
