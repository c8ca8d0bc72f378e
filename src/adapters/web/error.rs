//! HTTP error responses for the web adapter.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::domain::error::PapertradeError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        // never leak internal detail to the page
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<PapertradeError> for WebError {
    fn from(err: PapertradeError) -> Self {
        use PapertradeError as E;
        match &err {
            E::MissingField { .. }
            | E::InvalidField { .. }
            | E::UsernameTaken { .. }
            | E::UnknownSymbol { .. }
            | E::InsufficientCash { .. }
            | E::InsufficientShares { .. }
            | E::PasswordUnchanged => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            E::BadCredentials | E::InvalidCode | E::UnknownUser => {
                Self::new(StatusCode::FORBIDDEN, err.to_string())
            }
            E::ServiceUnavailable { service, reason } => {
                tracing::warn!(service, reason, "collaborator failure");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("{service} service is temporarily unavailable"),
                )
            }
            E::Database { .. }
            | E::DatabaseQuery { .. }
            | E::ConfigParse { .. }
            | E::ConfigMissing { .. }
            | E::ConfigInvalid { .. }
            | E::Io(_) => {
                tracing::error!(error = %err, "internal error");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let template = super::templates::ErrorTemplate {
            message: &self.message,
            status: self.status.as_u16(),
        };
        match template.render() {
            Ok(html) => (self.status, Html(html)).into_response(),
            Err(_) => (self.status, self.message).into_response(),
        }
    }
}
