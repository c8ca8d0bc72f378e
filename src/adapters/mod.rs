//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod iex_quote_adapter;
pub mod mail_api_adapter;
pub mod sqlite_adapter;
pub mod vonage_verify_adapter;
pub mod web;
