//! HTTP surface for the reward ledger

pub mod routes;

pub use routes::{create_router, ApiError, AppState};
