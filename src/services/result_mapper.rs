use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::llm_provider::ChatResponse;

pub const ADAPTIVE_HINT: &str = "Review the fundamental concepts and try again.";
pub const SUGGESTED_NEXT_TOPIC: &str = "Consider exploring related topics.";

const CLARITY_SECTION_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("completion returned no choices")]
    EmptyChoices,
    #[error("completion returned no tool call")]
    MissingToolCall,
    #[error("tool arguments did not match the schema: {0}")]
    InvalidArguments(#[from] serde_json::Error),
}

/// Structured output of the `create_learning_path` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathDraft {
    pub skill_level: i32,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub next_milestone: String,
}

/// Stored halves of a free-text analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSections {
    pub clarity: String,
    pub conceptual: String,
}

pub fn feedback_text(response: &ChatResponse) -> Result<String, MapError> {
    let choice = response.choices.first().ok_or(MapError::EmptyChoices)?;
    Ok(choice.message.content.clone().unwrap_or_default())
}

pub fn learning_path_from_tool_call(response: &ChatResponse) -> Result<LearningPathDraft, MapError> {
    let call = response
        .first_tool_calls()
        .first()
        .ok_or(MapError::MissingToolCall)?;

    // Models sometimes return fractional scores; read loosely, then clamp.
    let raw: RawLearningPath = serde_json::from_str(&call.function.arguments)?;
    Ok(LearningPathDraft {
        skill_level: raw.skill_level.round().clamp(0.0, 100.0) as i32,
        strengths: raw.strengths,
        areas_for_improvement: raw.areas_for_improvement,
        recommended_topics: raw.recommended_topics,
        next_milestone: raw.next_milestone,
    })
}

#[derive(Deserialize)]
struct RawLearningPath {
    skill_level: f64,
    strengths: Vec<String>,
    areas_for_improvement: Vec<String>,
    recommended_topics: Vec<String>,
    next_milestone: String,
}

fn clarity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)clarity.*?(\d+)").expect("static regex"))
}

/// First integer following the word "clarity", clamped to 0..=100.
pub fn extract_clarity_score(text: &str) -> Option<i32> {
    let digits = clarity_pattern().captures(text)?.get(1)?.as_str();
    // Anything too long to parse is far above the ceiling.
    let score = digits.parse::<u64>().unwrap_or(u64::MAX).min(100);
    Some(score as i32)
}

pub fn split_analysis(text: &str) -> AnalysisSections {
    let mut chars = text.chars();
    let clarity: String = chars.by_ref().take(CLARITY_SECTION_CHARS).collect();
    let conceptual: String = chars.take(CLARITY_SECTION_CHARS).collect();
    AnalysisSections { clarity, conceptual }
}
