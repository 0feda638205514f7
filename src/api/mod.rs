//! HTTP API.
//!
//! `build_router()` returns the complete axum `Router`; handlers receive the
//! shared [`AppState`] through the `State` extractor.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
