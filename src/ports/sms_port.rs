//! Phone one-time-code verification port.

use async_trait::async_trait;

use crate::domain::error::PapertradeError;

#[async_trait]
pub trait SmsPort: Send + Sync {
    /// Start a verification against `number`, returning the provider's request id.
    /// The caller carries the id until the user submits the code.
    async fn start_verification(&self, number: &str) -> Result<String, PapertradeError>;

    /// Check a submitted code against an outstanding request. `Ok(false)` is a
    /// wrong code; errors are provider failures.
    async fn check(&self, request_id: &str, code: &str) -> Result<bool, PapertradeError>;
}
