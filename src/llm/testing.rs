//! Scripted completion client for tests.

use super::{CompletionClient, CompletionRequest, LlmError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Replies with a fixed body (or error status) and records every request.
pub struct ScriptedClient {
    reply: Result<String, u16>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Ok(body.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(body) => Ok(body.clone()),
            Err(status) => Err(LlmError::Api {
                status: *status,
                body: "scripted failure".to_string(),
            }),
        }
    }
}
