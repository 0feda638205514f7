//! Analysis prompt construction.
//!
//! Renders feedback data into the instruction block sent to the model. The
//! data is embedded verbatim as pretty-printed JSON; nothing is truncated.

use crate::models::{Answers, FeedbackRecord, ReportLanguage, TeamAggregate};
use serde::{Deserialize, Serialize};

/// Where the prompt's data payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// Every feedback record, as stored.
    Raw,
    /// Per-team statistics from the aggregator.
    #[default]
    Aggregated,
}

/// Data handed to [`build_prompt`].
#[derive(Debug, Clone, Copy)]
pub enum PromptData<'a> {
    Raw(&'a [FeedbackRecord]),
    Aggregated(&'a [TeamAggregate]),
}

/// A system instruction and user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Serialize)]
struct RawItem<'a> {
    team_id: u32,
    answers: &'a Answers,
}

/// Build the analysis prompt for `data` in `language`.
pub fn build_prompt(data: PromptData<'_>, language: ReportLanguage) -> serde_json::Result<Prompt> {
    let (payload, count) = match data {
        PromptData::Raw(records) => {
            let items: Vec<RawItem<'_>> = records
                .iter()
                .map(|r| RawItem {
                    team_id: r.team_id,
                    answers: &r.answers,
                })
                .collect();
            (serde_json::to_string_pretty(&items)?, records.len())
        }
        PromptData::Aggregated(teams) => (serde_json::to_string_pretty(teams)?, teams.len()),
    };

    let template = Template::for_language(language);
    let data_heading = match data {
        PromptData::Raw(_) => template.raw_heading,
        PromptData::Aggregated(_) => template.aggregated_heading,
    };

    let mut user = String::new();
    user.push_str(template.persona);
    user.push_str("\n\n");
    user.push_str(&format!("{} ({}):\n", data_heading, count));
    user.push_str(&payload);
    user.push_str("\n\n");
    user.push_str(template.format_intro);
    user.push('\n');
    user.push_str(template.schema);
    user.push_str("\n\n");
    user.push_str(template.closing);

    Ok(Prompt {
        system: template.system.to_string(),
        user,
    })
}

struct Template {
    system: &'static str,
    persona: &'static str,
    raw_heading: &'static str,
    aggregated_heading: &'static str,
    format_intro: &'static str,
    schema: &'static str,
    closing: &'static str,
}

impl Template {
    fn for_language(language: ReportLanguage) -> &'static Template {
        match language {
            ReportLanguage::Arabic => &ARABIC,
            ReportLanguage::English => &ENGLISH,
        }
    }
}

const ARABIC: Template = Template {
    system: "أنت محلل بيانات خبير في تقييم فرق التركيب. تكتب تحليلات دقيقة باللغة العربية وترد بكائن JSON صالح فقط.",
    persona: "أنت محلل بيانات متخصص في أداء فرق تركيب الإنترنت. حلّل تقييمات العملاء التالية واكتب تقريرًا شاملاً باللغة العربية.",
    raw_heading: "تقييمات العملاء (عدد التقييمات)",
    aggregated_heading: "إحصاءات الفرق المجمعة (عدد الفرق)",
    format_intro: "أعد التحليل بصيغة JSON التالية بالضبط:",
    schema: ARABIC_SCHEMA,
    closing: "يجب أن تكون جميع النصوص باللغة العربية. أعد كائن JSON فقط دون أي نص إضافي.",
};

const ARABIC_SCHEMA: &str = r#"{
  "analysis": {
    "overall_summary": "ملخص شامل لأداء جميع الفرق",
    "team_rankings": {
      "best_teams": [
        {
          "team_id": 1,
          "score": 4.5,
          "strengths": ["نقطة قوة", "نقطة قوة"]
        }
      ],
      "teams_needing_improvement": [
        {
          "team_id": 2,
          "score": 2.5,
          "issues": ["مشكلة", "مشكلة"],
          "improvement_suggestions": ["اقتراح", "اقتراح"]
        }
      ]
    }
  },
  "key_insights": ["رؤية", "رؤية", "رؤية"],
  "recommendations": ["توصية", "توصية", "توصية", "توصية", "توصية"]
}"#;

const ENGLISH: Template = Template {
    system: "You are an expert data analyst evaluating installation teams. You write precise analyses in English and reply with a single valid JSON object only.",
    persona: "You are a data analyst specialising in internet installation team performance. Analyse the customer feedback below and write a comprehensive report in English.",
    raw_heading: "Customer feedback (number of records)",
    aggregated_heading: "Aggregated team statistics (number of teams)",
    format_intro: "Return the analysis in exactly this JSON format:",
    schema: ENGLISH_SCHEMA,
    closing: "All text must be in English. Return the JSON object only, with no other text.",
};

const ENGLISH_SCHEMA: &str = r#"{
  "analysis": {
    "overall_summary": "Overall summary of every team's performance",
    "team_rankings": {
      "best_teams": [
        {
          "team_id": 1,
          "score": 4.5,
          "strengths": ["strength", "strength"]
        }
      ],
      "teams_needing_improvement": [
        {
          "team_id": 2,
          "score": 2.5,
          "issues": ["issue", "issue"],
          "improvement_suggestions": ["suggestion", "suggestion"]
        }
      ]
    }
  },
  "key_insights": ["insight", "insight", "insight"],
  "recommendations": ["recommendation", "recommendation", "recommendation", "recommendation", "recommendation"]
}"#;
