#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use papertrade::adapters::sqlite_adapter::SqliteAdapter;
use papertrade::adapters::web::{AppState, build_router};
use papertrade::domain::error::PapertradeError;
use papertrade::domain::verification::ResetCodeStore;
use papertrade::ports::config_port::ConfigPort;
use papertrade::ports::mail_port::MailPort;
use papertrade::ports::quote_port::{Quote, QuotePort};
use papertrade::ports::sms_port::SmsPort;

pub const TEST_REQUEST_ID: &str = "req-0001";
pub const TEST_SMS_CODE: &str = "123456";

#[derive(Default)]
pub struct MockQuotePort {
    quotes: HashMap<String, Quote>,
    failing: bool,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, symbol: &str, name: &str, price: &str) -> Self {
        self.quotes.insert(
            symbol.to_string(),
            Quote {
                name: name.to_string(),
                price: Decimal::from_str(price).unwrap(),
            },
        );
        self
    }

    pub fn failing() -> Self {
        Self {
            quotes: HashMap::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl QuotePort for MockQuotePort {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, PapertradeError> {
        if self.failing {
            return Err(PapertradeError::ServiceUnavailable {
                service: "quote",
                reason: "mock outage".into(),
            });
        }
        Ok(self.quotes.get(symbol).cloned())
    }
}

/// Accepts [`TEST_SMS_CODE`] against [`TEST_REQUEST_ID`] and records the numbers
/// verifications were started for.
#[derive(Default)]
pub struct MockSmsPort {
    pub started: Mutex<Vec<String>>,
}

#[async_trait]
impl SmsPort for MockSmsPort {
    async fn start_verification(&self, number: &str) -> Result<String, PapertradeError> {
        self.started.lock().unwrap().push(number.to_string());
        Ok(TEST_REQUEST_ID.to_string())
    }

    async fn check(&self, request_id: &str, code: &str) -> Result<bool, PapertradeError> {
        Ok(request_id == TEST_REQUEST_ID && code == TEST_SMS_CODE)
    }
}

pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct MockMailPort {
    pub sent: Mutex<Vec<SentMail>>,
}

impl MockMailPort {
    /// Pull the six-digit code out of the last message's HTML body.
    pub fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let mail = sent.last().expect("no mail sent");
        mail.html.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

#[async_trait]
impl MailPort for MockMailPort {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), PapertradeError> {
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

pub struct TestConfigPort;

impl ConfigPort for TestConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match (section, key) {
            ("web", "session_secret") => Some("ab".repeat(64)),
            _ => None,
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match (section, key) {
            ("web", "session_lifetime") => 3600,
            _ => default,
        }
    }

    fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
        default
    }

    fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
        default
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteAdapter>,
    pub sms: Arc<MockSmsPort>,
    pub mail: Arc<MockMailPort>,
}

pub fn build_test_app(quotes: MockQuotePort) -> TestApp {
    let store = Arc::new(SqliteAdapter::in_memory().unwrap());
    store.initialize_schema().unwrap();
    let sms = Arc::new(MockSmsPort::default());
    let mail = Arc::new(MockMailPort::default());

    let state = AppState {
        store: store.clone(),
        quotes: Arc::new(quotes),
        sms: sms.clone(),
        mail: mail.clone(),
        config: Arc::new(TestConfigPort),
        reset_codes: Arc::new(ResetCodeStore::new()),
    };

    TestApp {
        router: build_router(state).unwrap(),
        store,
        sms,
        mail,
    }
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request_with_cookies(uri: &str, body: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn extract_cookies(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|sc| sc.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

/// Register a user through the real handler and return the session cookies.
pub async fn register_user(app: &Router, username: &str, password: &str) -> String {
    use tower::ServiceExt;
    let body = format!("username={username}&password={password}&phone=15550001111");
    let response = app
        .clone()
        .oneshot(form_request("/register", &body))
        .await
        .unwrap();
    assert!(
        response.status().is_redirection(),
        "register failed: {}",
        response.status()
    );
    extract_cookies(&response)
}
