//! Authentication backend for axum-login.
//!
//! Login is two-step: the password is checked first, then a phone one-time code
//! completes authentication. No session exists until the code is confirmed, so the
//! axum-login credential type is the code check, not the password.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use axum_login::{AuthUser, AuthnBackend, UserId};
use std::sync::Arc;

use crate::domain::error::PapertradeError;
use crate::ports::sms_port::SmsPort;
use crate::ports::store_port::{StorePort, UserRecord};

/// Authenticated user as held in the session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Hash bytes used by axum-login to invalidate sessions on password change.
    pw_hash_bytes: Vec<u8>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            pw_hash_bytes: record.password_hash.into_bytes(),
        }
    }
}

impl AuthUser for User {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.pw_hash_bytes
    }
}

/// Second-factor credential: confirming the phone code promotes the session.
#[derive(Clone)]
pub struct PhoneCodeCredentials {
    pub username: String,
    pub request_id: String,
    pub code: String,
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn StorePort>,
    sms: Arc<dyn SmsPort>,
}

impl Backend {
    pub fn new(store: Arc<dyn StorePort>, sms: Arc<dyn SmsPort>) -> Self {
        Self { store, sms }
    }

    /// First factor: check username and password against the stored hash. Returns
    /// the user record so the caller can start the phone verification against the
    /// user's registered number.
    pub fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, PapertradeError> {
        let Some(user) = self.store.user_by_name(username)? else {
            return Ok(None);
        };

        if password_matches(&user.password_hash, password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

impl AuthnBackend for Backend {
    type User = User;
    type Credentials = PhoneCodeCredentials;
    type Error = PapertradeError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        if !self.sms.check(&creds.request_id, &creds.code).await? {
            return Ok(None);
        }
        Ok(self.store.user_by_name(&creds.username)?.map(User::from))
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.store.user_by_id(*user_id)?.map(User::from))
    }
}

/// Hash a password with argon2id in PHC string format.
pub fn hash_password(password: &str) -> Result<String, PapertradeError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PapertradeError::InvalidField {
            field: "password",
            reason: e.to_string(),
        })
}

pub fn password_matches(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
