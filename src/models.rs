//! Data models for the feedback service.
//!
//! This module contains the feedback records accepted and stored by the
//! service, the per-team aggregates derived from them, and the analysis
//! result returned by the report endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length, in characters, of any free-text answer.
pub const MAX_TEXT_LEN: usize = 1000;

/// Inclusive bounds of a rating answer.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// A customer's answers to the installation questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    /// The team arrived at the agreed time.
    pub on_time: bool,
    /// The team was polite and professional.
    pub polite_professional: bool,
    /// The team explained the service.
    pub explained_service: bool,
    /// The site was left clean.
    pub left_clean: bool,
    /// Measured internet speed matched the plan.
    pub internet_speed_ok: bool,
    /// Installation quality, 1-5.
    pub installation_rating: u8,
    /// Team helpfulness, 1-5.
    pub helpfulness_rating: u8,
    /// Would recommend the team.
    pub recommend: bool,
    /// What the customer liked most.
    pub like_most: String,
    /// What the team should improve.
    pub improve: String,
    /// Free-form remarks.
    #[serde(default)]
    pub additional_comments: Option<String>,
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCreate {
    pub team_id: u32,
    pub answers: Answers,
}

/// A stored feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub team_id: u32,
    pub answers: Answers,
    pub created_at: DateTime<Utc>,
}

/// An input that violates the feedback invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("team_id must be at least 1")]
    TeamId,
    #[error("{field} must be between 1 and 5, got {value}")]
    RatingOutOfRange { field: &'static str, value: u8 },
    #[error("{field} must not be empty")]
    EmptyText { field: &'static str },
    #[error("{field} must be at most {max} characters, got {len}")]
    TextTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("limit must be between 1 and {max}, got {value}")]
    Limit { value: u32, max: u32 },
}

impl FeedbackCreate {
    /// Check every invariant a stored record must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.team_id < 1 {
            return Err(ValidationError::TeamId);
        }
        self.answers.validate()
    }
}

impl Answers {
    /// Check rating bounds and text lengths.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_rating("installation_rating", self.installation_rating)?;
        check_rating("helpfulness_rating", self.helpfulness_rating)?;
        check_required_text("like_most", &self.like_most)?;
        check_required_text("improve", &self.improve)?;
        if let Some(ref comments) = self.additional_comments {
            check_text_len("additional_comments", comments)?;
        }
        Ok(())
    }
}

fn check_rating(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if RATING_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange { field, value })
    }
}

fn check_required_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyText { field });
    }
    check_text_len(field, value)
}

fn check_text_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > MAX_TEXT_LEN {
        Err(ValidationError::TextTooLong {
            field,
            len,
            max: MAX_TEXT_LEN,
        })
    } else {
        Ok(())
    }
}

/// Per-team statistics derived from feedback records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAggregate {
    pub team_id: u32,
    pub feedback_count: usize,
    pub on_time_count: usize,
    pub on_time_percentage: f64,
    pub recommend_count: usize,
    pub recommend_percentage: f64,
    pub polite_professional_percentage: f64,
    pub explained_service_percentage: f64,
    pub left_clean_percentage: f64,
    pub internet_speed_ok_percentage: f64,
    pub avg_installation_rating: f64,
    pub avg_helpfulness_rating: f64,
    /// Mean of the two rating means.
    pub overall_score: f64,
    pub like_most_samples: Vec<String>,
    pub improve_samples: Vec<String>,
}

/// Language the report narrative is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportLanguage {
    #[default]
    Arabic,
    English,
}

impl fmt::Display for ReportLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLanguage::Arabic => write!(f, "Arabic"),
            ReportLanguage::English => write!(f, "English"),
        }
    }
}

/// A ranked team entry in the analysis report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRanking {
    pub team_id: u32,
    pub score: f64,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub improvement_suggestions: Vec<String>,
}

/// Best and weakest teams, as ranked by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRankings {
    pub best_teams: Vec<TeamRanking>,
    pub teams_needing_improvement: Vec<TeamRanking>,
}

/// Narrative part of the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamAnalysis {
    pub overall_summary: String,
    pub team_rankings: TeamRankings,
}

/// The complete performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_feedback_count: usize,
    pub teams_analyzed: usize,
    pub analysis: TeamAnalysis,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}
