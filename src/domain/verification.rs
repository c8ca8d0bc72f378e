//! Server-held one-time codes for password reset.
//!
//! The code is generated here, delivered by email, and never leaves the server in
//! any response body. Codes are single-use, expire after [`CODE_TTL_MINUTES`], and
//! allow at most [`MAX_ATTEMPTS`] guesses before being discarded.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::error::PapertradeError;

pub const CODE_TTL_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: u32 = 3;

fn code_ttl() -> Duration {
    Duration::minutes(CODE_TTL_MINUTES)
}

#[derive(Debug)]
struct PendingCode {
    code: String,
    issued_at: DateTime<Utc>,
    attempts: u32,
}

/// In-process store of outstanding reset codes keyed by user id. At most one code
/// per user; issuing a new one replaces any outstanding code.
#[derive(Debug, Default)]
pub struct ResetCodeStore {
    pending: Mutex<HashMap<i64, PendingCode>>,
}

impl ResetCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh six-digit code for the user, replacing any outstanding one.
    pub fn issue(&self, user_id: i64) -> String {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: i64, now: DateTime<Utc>) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let mut pending = self.lock();
        pending.insert(
            user_id,
            PendingCode {
                code: code.clone(),
                issued_at: now,
                attempts: 0,
            },
        );
        code
    }

    /// Verify a submitted code. A match consumes the code; a mismatch burns an
    /// attempt and discards the code once [`MAX_ATTEMPTS`] is reached. All failure
    /// modes report the same [`PapertradeError::InvalidCode`].
    pub fn verify(&self, user_id: i64, code: &str) -> Result<(), PapertradeError> {
        self.verify_at(user_id, code, Utc::now())
    }

    pub fn verify_at(
        &self,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PapertradeError> {
        let mut pending = self.lock();

        let Some(entry) = pending.get_mut(&user_id) else {
            return Err(PapertradeError::InvalidCode);
        };

        if now - entry.issued_at > code_ttl() {
            pending.remove(&user_id);
            return Err(PapertradeError::InvalidCode);
        }

        if entry.code != code.trim() {
            entry.attempts += 1;
            if entry.attempts >= MAX_ATTEMPTS {
                pending.remove(&user_id);
            }
            return Err(PapertradeError::InvalidCode);
        }

        pending.remove(&user_id);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, PendingCode>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
