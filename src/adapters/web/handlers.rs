//! HTTP request handlers.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::error::PapertradeError;
use crate::domain::money::usd;
use crate::domain::{portfolio, trading};

use super::auth::{Backend, PhoneCodeCredentials, User};
use super::templates;
use super::{AppState, WebError};

pub type AuthSession = axum_login::AuthSession<Backend>;

fn auth_error(err: axum_login::Error<Backend>) -> WebError {
    match err {
        axum_login::Error::Backend(e) => WebError::from(e),
        axum_login::Error::Session(e) => {
            tracing::error!(error = %e, "session error");
            WebError::internal()
        }
    }
}

/// The auth layer guards every caller of this, so a missing user is a wiring bug.
fn require_user(auth: &AuthSession) -> Result<User, WebError> {
    auth.user
        .clone()
        .ok_or_else(|| WebError::new(StatusCode::UNAUTHORIZED, "not logged in"))
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, WebError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PapertradeError::MissingField { field }.into())
    } else {
        Ok(value)
    }
}

fn render_page<T: Template>(template: T) -> Result<Response, WebError> {
    let html = template.render().map_err(|e| {
        tracing::error!(error = %e, "template render failed");
        WebError::internal()
    })?;
    Ok(Html(html).into_response())
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

pub async fn index(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    let portfolio = portfolio::aggregate(&*state.store, &*state.quotes, user.id).await?;

    let holdings = portfolio
        .holdings
        .into_iter()
        .map(|h| templates::HoldingRow {
            symbol: h.symbol,
            name: h.name,
            shares: h.shares,
            price: usd(h.price),
            value: usd(h.value),
        })
        .collect();

    render_page(templates::IndexTemplate {
        holdings,
        cash: usd(portfolio.cash),
        grand_total: usd(portfolio.grand_total),
    })
}

// ---------------------------------------------------------------------------
// Registration and login
// ---------------------------------------------------------------------------

pub async fn register_form() -> Result<Response, WebError> {
    render_page(templates::RegisterTemplate)
}

#[derive(Debug, serde::Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub phone: String,
}

pub async fn register(
    mut auth: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let username = required(&form.username, "username")?;
    required(&form.password, "password")?;
    let phone = required(&form.phone, "phone")?;

    let hash = super::auth::hash_password(&form.password)?;
    let record = state.store.create_user(username, &hash, phone)?;
    tracing::info!(username, user_id = record.id, "user registered");

    let user = User::from(record);
    auth.login(&user).await.map_err(auth_error)?;
    Ok(Redirect::to("/").into_response())
}

pub async fn login_form() -> Result<Response, WebError> {
    render_page(templates::LoginTemplate)
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// First login step: on a password match, start a phone verification against the
/// user's registered number and hand the request id to the verify form. Nothing is
/// stored server-side until the code is confirmed.
pub async fn login(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let username = required(&form.username, "username")?;
    required(&form.password, "password")?;

    let Some(user) = auth.backend.verify_password(username, &form.password)? else {
        return Err(PapertradeError::BadCredentials.into());
    };

    let request_id = state.sms.start_verification(&user.phone).await?;
    tracing::info!(username, "phone verification started");

    render_page(templates::PhoneVerifyTemplate {
        request_id,
        username: user.username,
    })
}

#[derive(Debug, serde::Deserialize)]
pub struct ConfirmLoginForm {
    pub user_code: String,
    pub response_id: String,
    pub username: String,
}

/// Second login step: check the phone code and promote the session.
pub async fn confirm_login(
    mut auth: AuthSession,
    Form(form): Form<ConfirmLoginForm>,
) -> Result<Response, WebError> {
    required(&form.user_code, "verification code")?;

    let creds = PhoneCodeCredentials {
        username: form.username.trim().to_string(),
        request_id: form.response_id,
        code: form.user_code.trim().to_string(),
    };

    let Some(user) = auth.authenticate(creds).await.map_err(auth_error)? else {
        return Err(PapertradeError::InvalidCode.into());
    };

    auth.login(&user).await.map_err(auth_error)?;
    tracing::info!(username = user.username, "login complete");
    Ok(Redirect::to("/").into_response())
}

pub async fn logout(mut auth: AuthSession) -> Result<Response, WebError> {
    auth.logout().await.map_err(auth_error)?;
    Ok(Redirect::to("/login").into_response())
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

pub async fn reset_form() -> Result<Response, WebError> {
    render_page(templates::ResetTemplate)
}

#[derive(Debug, serde::Deserialize)]
pub struct ResetForm {
    pub email: String,
}

/// Issue a server-held one-time code and email it. The response page never
/// contains the code.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ResetForm>,
) -> Result<Response, WebError> {
    let email = required(&form.email, "email address")?;

    let Some(user) = state.store.user_by_name(email)? else {
        return Err(PapertradeError::UnknownUser.into());
    };

    let code = state.reset_codes.issue(user.id);
    state
        .mail
        .send(
            &user.username,
            "Papertrade: Password Reset",
            &format!("<p><b>{code}</b></p>"),
        )
        .await?;
    tracing::info!(username = user.username, "reset code emailed");

    render_page(templates::ResetVerifyTemplate {
        username: user.username,
    })
}

#[derive(Debug, serde::Deserialize)]
pub struct ConfirmResetForm {
    pub email: String,
    pub user_code: String,
    pub new_password: String,
}

pub async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ConfirmResetForm>,
) -> Result<Response, WebError> {
    let email = required(&form.email, "email address")?;
    let code = required(&form.user_code, "verification code")?;
    required(&form.new_password, "new password")?;

    let Some(user) = state.store.user_by_name(email)? else {
        return Err(PapertradeError::UnknownUser.into());
    };

    state.reset_codes.verify(user.id, code)?;

    if super::auth::password_matches(&user.password_hash, &form.new_password) {
        return Err(PapertradeError::PasswordUnchanged.into());
    }

    let hash = super::auth::hash_password(&form.new_password)?;
    state.store.update_password(user.id, &hash)?;
    tracing::info!(username = user.username, "password reset");

    Ok(Redirect::to("/login").into_response())
}

// ---------------------------------------------------------------------------
// Quotes and trading
// ---------------------------------------------------------------------------

pub async fn quote_form() -> Result<Response, WebError> {
    render_page(templates::QuoteTemplate)
}

#[derive(Debug, serde::Deserialize)]
pub struct QuoteForm {
    pub symbol: String,
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    Form(form): Form<QuoteForm>,
) -> Result<Response, WebError> {
    let symbol = required(&form.symbol, "symbol")?.to_uppercase();

    let Some(quote) = state.quotes.lookup(&symbol).await? else {
        return Err(PapertradeError::UnknownSymbol { symbol }.into());
    };

    render_page(templates::QuotedTemplate {
        symbol,
        name: quote.name,
        price: usd(quote.price),
        raw_price: quote.price.to_string(),
    })
}

#[derive(Debug, serde::Deserialize)]
pub struct BuyQuery {
    pub symbol: Option<String>,
    pub price: Option<String>,
}

/// Buy form; when arriving from the quote page with symbol and price, show how
/// many shares the user's cash covers.
pub async fn buy_form(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
    Query(query): Query<BuyQuery>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;

    let quoted = match (query.symbol, query.price) {
        (Some(symbol), Some(price)) => {
            Decimal::from_str(price.trim()).ok().map(|p| (symbol, p))
        }
        _ => None,
    };

    let template = match quoted {
        Some((symbol, price)) if price > Decimal::ZERO => {
            let cash = state.store.cash(user.id)?;
            templates::BuyTemplate {
                has_quote: true,
                symbol: symbol.to_uppercase(),
                max_shares: (cash / price).floor().to_i64().unwrap_or(0),
            }
        }
        _ => templates::BuyTemplate {
            has_quote: false,
            symbol: String::new(),
            max_shares: 0,
        },
    };
    render_page(template)
}

#[derive(Debug, serde::Deserialize)]
pub struct TradeForm {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub shares: String,
}

pub async fn buy(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<TradeForm>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    let order = trading::Order::parse(&form.symbol, &form.shares)?;
    trading::execute_buy(&*state.store, &*state.quotes, user.id, &order).await?;
    Ok(Redirect::to("/").into_response())
}

pub async fn sell_form(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    let symbols = state
        .store
        .net_positions(user.id)?
        .into_iter()
        .map(|p| p.symbol)
        .collect();
    render_page(templates::SellTemplate { symbols })
}

pub async fn sell(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<TradeForm>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    let order = trading::Order::parse(&form.symbol, &form.shares)?;
    trading::execute_sell(&*state.store, &*state.quotes, user.id, &order).await?;
    Ok(Redirect::to("/").into_response())
}

// ---------------------------------------------------------------------------
// History and account deletion
// ---------------------------------------------------------------------------

pub async fn history(
    auth: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    let rows = state
        .store
        .history(user.id)?
        .into_iter()
        .map(|entry| templates::HistoryRow {
            symbol: entry.symbol,
            shares: entry.shares,
            price: usd(entry.price),
            date: entry.date.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();
    render_page(templates::HistoryTemplate { rows })
}

pub async fn delete_form() -> Result<Response, WebError> {
    render_page(templates::DeleteTemplate)
}

pub async fn delete_account(
    mut auth: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let user = require_user(&auth)?;
    state.store.delete_user(user.id)?;
    auth.logout().await.map_err(auth_error)?;
    tracing::info!(username = user.username, "account deleted");
    Ok(Redirect::to("/register").into_response())
}

pub async fn not_found() -> Response {
    WebError::not_found("page not found").into_response()
}
