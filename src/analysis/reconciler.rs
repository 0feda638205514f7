//! Reconcile the model's reply with locally computed facts.
//!
//! The reply is parsed strictly as JSON into typed structures whose fields
//! all carry defaults, so a reply that omits parts of the schema still
//! produces a complete [`AnalysisResult`].

use crate::models::{AnalysisResult, TeamAnalysis, TeamRanking, TeamRankings};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Why a model reply could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("model reply is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("model reply is JSON but not an object")]
    NotAnObject,
    #[error("model reply does not match the report schema: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Counts known before the model was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFacts {
    pub total_feedback_count: usize,
    pub teams_analyzed: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelReply {
    #[serde(deserialize_with = "null_default")]
    analysis: ModelAnalysis,
    #[serde(deserialize_with = "null_default")]
    key_insights: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    recommendations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelAnalysis {
    #[serde(deserialize_with = "null_default")]
    overall_summary: String,
    #[serde(deserialize_with = "null_default")]
    team_rankings: ModelRankings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelRankings {
    #[serde(deserialize_with = "null_default")]
    best_teams: Vec<ModelTeam>,
    #[serde(deserialize_with = "null_default")]
    teams_needing_improvement: Vec<ModelTeam>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelTeam {
    #[serde(deserialize_with = "lenient_team_id")]
    team_id: u32,
    #[serde(deserialize_with = "lenient_score")]
    score: f64,
    #[serde(deserialize_with = "null_default")]
    strengths: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    issues: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    improvement_suggestions: Vec<String>,
}

impl From<ModelTeam> for TeamRanking {
    fn from(team: ModelTeam) -> Self {
        TeamRanking {
            team_id: team.team_id,
            score: team.score,
            strengths: team.strengths,
            issues: team.issues,
            improvement_suggestions: team.improvement_suggestions,
        }
    }
}

/// Parse `raw` and merge it with `facts`, stamping the result with `now`.
pub fn reconcile(
    raw: &str,
    facts: LocalFacts,
    now: DateTime<Utc>,
) -> Result<AnalysisResult, ReconcileError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(ReconcileError::InvalidJson)?;
    if !value.is_object() {
        return Err(ReconcileError::NotAnObject);
    }

    let reply: ModelReply = serde_json::from_value(value).map_err(ReconcileError::Schema)?;
    let rankings = reply.analysis.team_rankings;

    Ok(AnalysisResult {
        total_feedback_count: facts.total_feedback_count,
        teams_analyzed: facts.teams_analyzed,
        analysis: TeamAnalysis {
            overall_summary: reply.analysis.overall_summary,
            team_rankings: TeamRankings {
                best_teams: rankings.best_teams.into_iter().map(Into::into).collect(),
                teams_needing_improvement: rankings
                    .teams_needing_improvement
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            },
        },
        key_insights: reply.key_insights,
        recommendations: reply.recommendations,
        analyzed_at: now,
    })
}

/// `null` is treated like a missing field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Scores may arrive as numbers or numeric strings.
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("score is not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("score {:?} is not a number", s))),
        other => Err(de::Error::custom(format!(
            "score must be a number, got {}",
            other
        ))),
    }
}

/// Team ids may arrive as numbers or numeric strings.
fn lenient_team_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| de::Error::custom(format!("team_id {} is out of range", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("team_id {:?} is not a number", s))),
        other => Err(de::Error::custom(format!(
            "team_id must be a number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTS: LocalFacts = LocalFacts {
        total_feedback_count: 12,
        teams_analyzed: 3,
    };

    const FULL_REPLY: &str = r#"{
        "analysis": {
            "overall_summary": "أداء جيد بشكل عام",
            "team_rankings": {
                "best_teams": [
                    {"team_id": 2, "score": 4.8, "strengths": ["الالتزام بالمواعيد"]}
                ],
                "teams_needing_improvement": [
                    {"team_id": 5, "score": 2.1, "issues": ["التأخير"], "improvement_suggestions": ["جدولة أفضل"]}
                ]
            }
        },
        "key_insights": ["a", "b"],
        "recommendations": ["r1"]
    }"#;

    #[test]
    fn test_full_reply_is_merged_with_local_facts() {
        let now = Utc::now();
        let result = reconcile(FULL_REPLY, FACTS, now).unwrap();

        assert_eq!(result.total_feedback_count, 12);
        assert_eq!(result.teams_analyzed, 3);
        assert_eq!(result.analyzed_at, now);
        assert_eq!(result.analysis.overall_summary, "أداء جيد بشكل عام");

        let best = &result.analysis.team_rankings.best_teams[0];
        assert_eq!(best.team_id, 2);
        assert_eq!(best.score, 4.8);
        assert_eq!(best.strengths, vec!["الالتزام بالمواعيد"]);
        // Omitted qualitative fields default to empty.
        assert!(best.issues.is_empty());
        assert!(best.improvement_suggestions.is_empty());

        let weak = &result.analysis.team_rankings.teams_needing_improvement[0];
        assert_eq!(weak.issues, vec!["التأخير"]);
        assert!(weak.strengths.is_empty());
        assert_eq!(result.key_insights, vec!["a", "b"]);
        assert_eq!(result.recommendations, vec!["r1"]);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let result = reconcile("{}", FACTS, Utc::now()).unwrap();

        assert_eq!(result.analysis.overall_summary, "");
        assert!(result.analysis.team_rankings.best_teams.is_empty());
        assert!(result.key_insights.is_empty());
        assert!(result.recommendations.is_empty());
        assert_eq!(result.total_feedback_count, 12);
    }

    #[test]
    fn test_null_fields_default_to_empty() {
        let raw = r#"{"analysis": null, "key_insights": null,
            "recommendations": ["x"]}"#;
        let result = reconcile(raw, FACTS, Utc::now()).unwrap();

        assert_eq!(result.analysis, TeamAnalysis::default());
        assert!(result.key_insights.is_empty());
        assert_eq!(result.recommendations, vec!["x"]);
    }

    #[test]
    fn test_lenient_scores_and_ids() {
        let raw = r#"{"analysis": {"team_rankings": {"best_teams": [
            {"team_id": "7", "score": "4.25"},
            {"team_id": 3, "score": null},
            {"score": 5}
        ]}}}"#;
        let result = reconcile(raw, FACTS, Utc::now()).unwrap();
        let best = &result.analysis.team_rankings.best_teams;

        assert_eq!((best[0].team_id, best[0].score), (7, 4.25));
        assert_eq!((best[1].team_id, best[1].score), (3, 0.0));
        assert_eq!((best[2].team_id, best[2].score), (0, 5.0));
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = reconcile("Here is your analysis: {", FACTS, Utc::now()).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidJson(_)));
    }

    #[test]
    fn test_non_object_reply_is_rejected() {
        let err = reconcile("[1, 2, 3]", FACTS, Utc::now()).unwrap_err();
        assert!(matches!(err, ReconcileError::NotAnObject));
    }

    #[test]
    fn test_wrong_field_type_is_a_schema_error() {
        let err = reconcile(r#"{"key_insights": "one string"}"#, FACTS, Utc::now()).unwrap_err();
        assert!(matches!(err, ReconcileError::Schema(_)));

        let err = reconcile(
            r#"{"analysis": {"team_rankings": {"best_teams": [{"score": "high"}]}}}"#,
            FACTS,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Schema(_)));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let raw = format!("\n\n  {}  \n", FULL_REPLY);
        assert!(reconcile(&raw, FACTS, Utc::now()).is_ok());
    }
}
