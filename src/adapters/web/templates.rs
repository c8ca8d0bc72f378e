//! HTML templates using Askama.

use askama::Template;

/// Portfolio row with pre-formatted currency strings.
pub struct HoldingRow {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: String,
    pub value: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub holdings: Vec<HoldingRow>,
    pub cash: String,
    pub grand_total: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate;

#[derive(Template)]
#[template(path = "phone_verify.html")]
pub struct PhoneVerifyTemplate {
    pub request_id: String,
    pub username: String,
}

#[derive(Template)]
#[template(path = "reset.html")]
pub struct ResetTemplate;

/// Shown after the reset code has been emailed. Deliberately carries only the
/// username: the code itself stays server-side.
#[derive(Template)]
#[template(path = "reset_verify.html")]
pub struct ResetVerifyTemplate {
    pub username: String,
}

#[derive(Template)]
#[template(path = "quote.html")]
pub struct QuoteTemplate;

#[derive(Template)]
#[template(path = "quoted.html")]
pub struct QuotedTemplate {
    pub symbol: String,
    pub name: String,
    /// Formatted for display, e.g. `$189.25`.
    pub price: String,
    /// Plain decimal carried to the buy form's query string.
    pub raw_price: String,
}

#[derive(Template)]
#[template(path = "buy.html")]
pub struct BuyTemplate {
    pub has_quote: bool,
    pub symbol: String,
    pub max_shares: i64,
}

#[derive(Template)]
#[template(path = "sell.html")]
pub struct SellTemplate {
    pub symbols: Vec<String>,
}

pub struct HistoryRow {
    pub symbol: String,
    pub shares: i64,
    pub price: String,
    pub date: String,
}

#[derive(Template)]
#[template(path = "history.html")]
pub struct HistoryTemplate {
    pub rows: Vec<HistoryRow>,
}

#[derive(Template)]
#[template(path = "delete.html")]
pub struct DeleteTemplate;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub message: &'a str,
    pub status: u16,
}
