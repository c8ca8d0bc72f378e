//! Domain error types.

use rust_decimal::Decimal;

/// Top-level error type for papertrade.
#[derive(Debug, thiserror::Error)]
pub enum PapertradeError {
    #[error("must provide {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("username is not available")]
    UsernameTaken { username: String },

    #[error("no such user")]
    UnknownUser,

    #[error("invalid username and/or password")]
    BadCredentials,

    #[error("invalid symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("can't afford {shares} shares of {symbol}: cost {cost}, cash {cash}")]
    InsufficientCash {
        symbol: String,
        shares: i64,
        cost: Decimal,
        cash: Decimal,
    },

    #[error("too many shares: holding {held} {symbol}, tried to sell {requested}")]
    InsufficientShares {
        symbol: String,
        requested: i64,
        held: i64,
    },

    #[error("invalid or expired verification code")]
    InvalidCode,

    #[error("new password must differ from the old one")]
    PasswordUnchanged,

    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable { service: &'static str, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PapertradeError> for std::process::ExitCode {
    fn from(err: &PapertradeError) -> Self {
        use PapertradeError as E;
        let code: u8 = match err {
            E::Io(_) => 1,
            E::ConfigParse { .. } | E::ConfigMissing { .. } | E::ConfigInvalid { .. } => 2,
            E::Database { .. } | E::DatabaseQuery { .. } => 3,
            E::ServiceUnavailable { .. } => 4,
            _ => 5,
        };
        std::process::ExitCode::from(code)
    }
}
