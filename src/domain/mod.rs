//! Core bookkeeping logic and domain types.

pub mod error;
pub mod ledger;
pub mod money;
pub mod portfolio;
pub mod trading;
pub mod verification;
