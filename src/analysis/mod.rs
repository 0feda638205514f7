//! Feedback analysis pipeline.
//!
//! Aggregation, prompt construction and reply reconciliation are kept
//! independent so the prompt can be built from raw records or from team
//! aggregates; [`service::AnalysisService`] wires them to the model client.

pub mod aggregator;
pub mod prompt;
pub mod reconciler;
pub mod service;

pub use aggregator::{aggregate_teams, distinct_teams};
pub use prompt::{build_prompt, PromptData, PromptSource};
pub use reconciler::{reconcile, LocalFacts, ReconcileError};
pub use service::{AnalysisError, AnalysisService, AnalysisSettings};
