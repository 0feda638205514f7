//! Analysis pipeline driver.

use crate::analysis::{
    aggregate_teams, build_prompt, distinct_teams, reconcile, LocalFacts, PromptData,
    PromptSource, ReconcileError,
};
use crate::llm::{CompletionClient, CompletionRequest, LlmError};
use crate::models::{AnalysisResult, FeedbackRecord, ReportLanguage};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Pipeline failures. None of them are retried here.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to build prompt: {0}")]
    Prompt(#[from] serde_json::Error),
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Knobs for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub source: PromptSource,
    pub language: ReportLanguage,
    pub max_tokens: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            source: PromptSource::default(),
            language: ReportLanguage::default(),
            max_tokens: 1000,
        }
    }
}

/// Turns feedback records into an [`AnalysisResult`] via the model.
pub struct AnalysisService {
    client: Arc<dyn CompletionClient>,
    settings: AnalysisSettings,
}

impl AnalysisService {
    pub fn new(client: Arc<dyn CompletionClient>, settings: AnalysisSettings) -> Self {
        Self { client, settings }
    }

    /// Run the full pipeline over `records`.
    pub async fn analyze(&self, records: &[FeedbackRecord]) -> Result<AnalysisResult, AnalysisError> {
        let facts = LocalFacts {
            total_feedback_count: records.len(),
            teams_analyzed: distinct_teams(records),
        };

        let prompt = match self.settings.source {
            PromptSource::Raw => build_prompt(PromptData::Raw(records), self.settings.language)?,
            PromptSource::Aggregated => {
                let teams = aggregate_teams(records);
                debug!("Aggregated {} teams", teams.len());
                build_prompt(PromptData::Aggregated(&teams), self.settings.language)?
            }
        };

        info!(
            "Analyzing {} feedback records from {} teams with {} ({:?} prompt, {} chars)",
            facts.total_feedback_count,
            facts.teams_analyzed,
            self.client.model_name(),
            self.settings.source,
            prompt.user.chars().count()
        );

        let start = Instant::now();
        let request = CompletionRequest::new(prompt.system, prompt.user, self.settings.max_tokens);
        let raw = self.client.complete(&request).await?;
        debug!("Model replied in {:.1}s", start.elapsed().as_secs_f64());

        let result = reconcile(&raw, facts, Utc::now())?;
        info!(
            "Analysis complete: {} best teams, {} needing improvement, {} insights",
            result.analysis.team_rankings.best_teams.len(),
            result.analysis.team_rankings.teams_needing_improvement.len(),
            result.key_insights.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::models::fixtures::{answers, record};

    const REPLY: &str = r#"{
        "analysis": {
            "overall_summary": "summary",
            "team_rankings": {
                "best_teams": [{"team_id": 1, "score": 5, "strengths": ["fast"]}],
                "teams_needing_improvement": [{"team_id": 2, "score": 2}]
            }
        },
        "key_insights": ["insight"],
        "recommendations": ["do more"]
    }"#;

    fn records() -> Vec<FeedbackRecord> {
        vec![
            record(1, answers(5, 5)),
            record(2, answers(2, 2)),
            record(1, answers(5, 4)),
        ]
    }

    #[tokio::test]
    async fn test_analyze_merges_counts_with_reply() {
        let client = Arc::new(ScriptedClient::replying(REPLY));
        let service = AnalysisService::new(client.clone(), AnalysisSettings::default());

        let result = service.analyze(&records()).await.unwrap();

        assert_eq!(result.total_feedback_count, 3);
        assert_eq!(result.teams_analyzed, 2);
        assert_eq!(result.analysis.overall_summary, "summary");
        assert!(result.analysis.team_rankings.teams_needing_improvement[0]
            .issues
            .is_empty());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_uses_settings() {
        let client = Arc::new(ScriptedClient::replying(REPLY));
        let settings = AnalysisSettings {
            source: PromptSource::Aggregated,
            language: ReportLanguage::English,
            max_tokens: 1500,
        };
        let service = AnalysisService::new(client.clone(), settings);

        service.analyze(&records()).await.unwrap();

        let request = client.last_request().unwrap();
        assert_eq!(request.max_tokens, 1500);
        assert_eq!(request.temperature, 0.3);
        assert!(request.prompt.contains("\"overall_score\""));
        assert!(request.prompt.contains("in English"));
    }

    #[tokio::test]
    async fn test_raw_source_sends_answers() {
        let client = Arc::new(ScriptedClient::replying(REPLY));
        let settings = AnalysisSettings {
            source: PromptSource::Raw,
            ..AnalysisSettings::default()
        };
        let service = AnalysisService::new(client.clone(), settings);

        service.analyze(&records()).await.unwrap();

        let request = client.last_request().unwrap();
        assert!(request.prompt.contains("\"installation_rating\""));
        assert!(!request.prompt.contains("\"overall_score\""));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let client = Arc::new(ScriptedClient::failing(502));
        let service = AnalysisService::new(client, AnalysisSettings::default());

        let err = service.analyze(&records()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Llm(LlmError::Api { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_reconcile_error() {
        let client = Arc::new(ScriptedClient::replying("Sorry, I cannot help."));
        let service = AnalysisService::new(client, AnalysisSettings::default());

        let err = service.analyze(&records()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Reconcile(ReconcileError::InvalidJson(_))
        ));
    }
}
