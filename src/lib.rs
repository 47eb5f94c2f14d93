//! Stocky Backend Library
//!
//! Stock reward ledger: idempotent reward grants backed by double-entry
//! postings, atomic corporate actions, and read-only portfolio reporting.

pub mod api;
pub mod config;
pub mod corporate_actions;
pub mod error;
pub mod fees;
pub mod middleware;
pub mod models;
pub mod price_sampler;
pub mod reporting;
pub mod rewards;
pub mod store;
pub mod validation;

pub use error::{LedgerError, LedgerResult};
