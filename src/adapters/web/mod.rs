//! Web server adapter.
//!
//! Axum application serving the portfolio UI: registration, two-step login,
//! password reset, quotes, buy/sell, history, and account deletion.

pub mod auth;
mod error;
mod handlers;
mod templates;

pub use auth::Backend;
pub use error::WebError;
pub use handlers::*;
pub use templates::*;

use axum::{
    Router,
    routing::{get, post},
};
use axum_login::{AuthManagerLayerBuilder, login_required};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use crate::domain::error::PapertradeError;
use crate::domain::verification::ResetCodeStore;
use crate::ports::config_port::ConfigPort;
use crate::ports::mail_port::MailPort;
use crate::ports::quote_port::QuotePort;
use crate::ports::sms_port::SmsPort;
use crate::ports::store_port::StorePort;

pub struct AppState {
    pub store: Arc<dyn StorePort>,
    pub quotes: Arc<dyn QuotePort>,
    pub sms: Arc<dyn SmsPort>,
    pub mail: Arc<dyn MailPort>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
    pub reset_codes: Arc<ResetCodeStore>,
}

fn signing_key(config: &dyn ConfigPort) -> Result<Key, PapertradeError> {
    let secret =
        config
            .get_string("web", "session_secret")
            .ok_or_else(|| PapertradeError::ConfigMissing {
                section: "web".into(),
                key: "session_secret".into(),
            })?;
    let bytes = hex::decode(&secret).map_err(|e| PapertradeError::ConfigInvalid {
        section: "web".into(),
        key: "session_secret".into(),
        reason: e.to_string(),
    })?;
    Key::try_from(&bytes[..]).map_err(|e| PapertradeError::ConfigInvalid {
        section: "web".into(),
        key: "session_secret".into(),
        reason: e.to_string(),
    })
}

pub fn build_router(state: AppState) -> Result<Router, PapertradeError> {
    let key = signing_key(&*state.config)?;
    let lifetime = state.config.get_int("web", "session_lifetime", 86_400);

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(lifetime)))
        .with_signed(key);

    let backend = Backend::new(state.store.clone(), state.sms.clone());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/quote", get(handlers::quote_form).post(handlers::quote))
        .route("/buy", get(handlers::buy_form).post(handlers::buy))
        .route("/sell", get(handlers::sell_form).post(handlers::sell))
        .route("/history", get(handlers::history))
        .route(
            "/delete",
            get(handlers::delete_form).post(handlers::delete_account),
        )
        .route_layer(login_required!(Backend, login_url = "/login"))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/loggedin", post(handlers::confirm_login))
        .route("/logout", post(handlers::logout))
        .route("/reset", get(handlers::reset_form).post(handlers::reset))
        .route("/reseted", post(handlers::confirm_reset))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(handlers::not_found)
        .layer(auth_layer)
        .with_state(Arc::new(state));

    Ok(router)
}
