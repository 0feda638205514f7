//! Hosted language-model access.
//!
//! This module provides the completion client used by the analysis
//! pipeline and the retry policy wrapped around it.

pub mod client;
pub mod retry;

pub use client::{CompletionClient, CompletionRequest, LlmError, OpenAiClient, OpenAiConfig};
pub use retry::RetryPolicy;

#[cfg(test)]
pub(crate) mod testing;
