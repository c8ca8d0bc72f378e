//! Port traits separating the domain from its collaborators.

pub mod config_port;
pub mod mail_port;
pub mod quote_port;
pub mod sms_port;
pub mod store_port;
