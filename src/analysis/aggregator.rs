//! Per-team aggregation and statistics.
//!
//! This module groups feedback records by team and computes the summary
//! statistics that feed the analysis prompt.

use crate::models::{FeedbackRecord, TeamAggregate, RATING_RANGE};
use std::collections::{BTreeMap, HashSet};

/// Free-text answers kept per team and question.
pub const SNIPPET_LIMIT: usize = 3;

/// Group records by team id, preserving record order within each team.
pub fn group_by_team(records: &[FeedbackRecord]) -> BTreeMap<u32, Vec<&FeedbackRecord>> {
    let mut grouped: BTreeMap<u32, Vec<&FeedbackRecord>> = BTreeMap::new();

    for record in records {
        grouped.entry(record.team_id).or_default().push(record);
    }

    grouped
}

/// Number of distinct teams in the records.
pub fn distinct_teams(records: &[FeedbackRecord]) -> usize {
    records
        .iter()
        .map(|r| r.team_id)
        .collect::<HashSet<_>>()
        .len()
}

/// Compute aggregates for every team, best `overall_score` first.
pub fn aggregate_teams(records: &[FeedbackRecord]) -> Vec<TeamAggregate> {
    let mut teams: Vec<TeamAggregate> = group_by_team(records)
        .into_iter()
        .map(|(team_id, team_records)| aggregate_team(team_id, &team_records))
        .collect();

    sort_by_score(&mut teams);
    teams
}

/// Sort aggregates by score (highest first), then by team id.
pub fn sort_by_score(teams: &mut [TeamAggregate]) {
    teams.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.team_id.cmp(&b.team_id))
    });
}

fn aggregate_team(team_id: u32, records: &[&FeedbackRecord]) -> TeamAggregate {
    let total = records.len();
    let count = |pred: fn(&FeedbackRecord) -> bool| records.iter().filter(|r| pred(r)).count();

    let on_time_count = count(|r| r.answers.on_time);
    let recommend_count = count(|r| r.answers.recommend);

    let avg_installation_rating =
        mean_rating(records.iter().map(|r| r.answers.installation_rating));
    let avg_helpfulness_rating = mean_rating(records.iter().map(|r| r.answers.helpfulness_rating));

    TeamAggregate {
        team_id,
        feedback_count: total,
        on_time_count,
        on_time_percentage: percentage(on_time_count, total),
        recommend_count,
        recommend_percentage: percentage(recommend_count, total),
        polite_professional_percentage: percentage(
            count(|r| r.answers.polite_professional),
            total,
        ),
        explained_service_percentage: percentage(count(|r| r.answers.explained_service), total),
        left_clean_percentage: percentage(count(|r| r.answers.left_clean), total),
        internet_speed_ok_percentage: percentage(count(|r| r.answers.internet_speed_ok), total),
        avg_installation_rating,
        avg_helpfulness_rating,
        overall_score: round2((avg_installation_rating + avg_helpfulness_rating) / 2.0),
        like_most_samples: sample_texts(records.iter().map(|r| r.answers.like_most.as_str())),
        improve_samples: sample_texts(records.iter().map(|r| r.answers.improve.as_str())),
    }
}

/// Mean of the in-range ratings; 0 when there are none.
fn mean_rating(ratings: impl Iterator<Item = u8>) -> f64 {
    let (sum, n) = ratings
        .filter(|r| RATING_RANGE.contains(r))
        .fold((0u64, 0u64), |(sum, n), r| (sum + u64::from(r), n + 1));

    if n == 0 {
        0.0
    } else {
        round2(sum as f64 / n as f64)
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

fn sample_texts<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<String> {
    texts
        .filter(|t| !t.trim().is_empty())
        .take(SNIPPET_LIMIT)
        .map(String::from)
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
