use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{InputKind, NewAnalysis, NewInteraction};
use crate::db::store::{Store, StoreError};
use crate::services::llm_provider::{CompletionError, CompletionRequest, CompletionService};
use crate::services::prompt::{analysis_prompt, demo_prompt};
use crate::services::result_mapper::{
    extract_clarity_score, feedback_text, split_analysis, MapError, ADAPTIVE_HINT,
    SUGGESTED_NEXT_TOPIC,
};

/// Stored when the model's prose carries no recognisable clarity figure.
pub const DEFAULT_CLARITY_SCORE: i32 = 75;
const ANALYSIS_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    pub input_type: InputKind,
    pub input_content: String,
    #[serde(default)]
    pub programming_language: Option<String>,
}

impl SubmissionInput {
    fn language(&self) -> Option<&str> {
        self.programming_language.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoFeedback {
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub interaction_id: String,
    pub feedback: String,
    pub clarity_score: i32,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("input content is empty")]
    EmptyInput,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Mapping(#[from] MapError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn ensure_content(input: &SubmissionInput) -> Result<(), AnalysisError> {
    if input.input_content.trim().is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(())
}

/// Free-text feedback with nothing persisted.
pub async fn run_demo(
    completion: &dyn CompletionService,
    input: &SubmissionInput,
) -> Result<DemoFeedback, AnalysisError> {
    ensure_content(input)?;

    let preview: String = input.input_content.chars().take(100).collect();
    tracing::info!(input_type = input.input_type.as_str(), preview = %preview, "demo analysis request");

    let prompt = demo_prompt(input.input_type, &input.input_content, input.language());
    let response = completion
        .complete(CompletionRequest::new(prompt.system, prompt.user))
        .await?;
    let feedback = feedback_text(&response)?;

    tracing::info!("demo analysis completed");
    Ok(DemoFeedback { feedback })
}

/// Stores the submission, asks for feedback and stores the derived analysis.
///
/// The two rows are written separately; a failure after the first leaves the
/// submission without an analysis.
pub async fn run_authenticated(
    store: &dyn Store,
    completion: &dyn CompletionService,
    user_id: &str,
    input: &SubmissionInput,
) -> Result<AnalysisOutcome, AnalysisError> {
    ensure_content(input)?;
    tracing::info!(user_id = %user_id, "analyzing input");

    let interaction = store
        .insert_interaction(NewInteraction {
            user_id: user_id.to_string(),
            input_type: input.input_type,
            input_content: input.input_content.clone(),
            programming_language: input.programming_language.clone(),
        })
        .await?;

    let prompt = analysis_prompt(input.input_type, &input.input_content, input.language());
    let request =
        CompletionRequest::new(prompt.system, prompt.user).with_temperature(ANALYSIS_TEMPERATURE);
    let response = completion.complete(request).await?;
    let feedback = feedback_text(&response)?;

    let clarity_score = extract_clarity_score(&feedback).unwrap_or(DEFAULT_CLARITY_SCORE);
    let sections = split_analysis(&feedback);

    store
        .insert_analysis(NewAnalysis {
            interaction_id: interaction.id.clone(),
            user_id: user_id.to_string(),
            clarity_score,
            clarity_analysis: sections.clarity,
            conceptual_understanding: sections.conceptual,
            code_best_practices: None,
            misconceptions: Vec::new(),
            adaptive_hint: ADAPTIVE_HINT.to_string(),
            suggested_next_topic: SUGGESTED_NEXT_TOPIC.to_string(),
        })
        .await
        .map_err(|err| {
            tracing::error!(interaction_id = %interaction.id, error = %err, "failed to store analysis");
            err
        })?;

    Ok(AnalysisOutcome {
        interaction_id: interaction.id,
        feedback,
        clarity_score,
    })
}
