use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::db::models::LearningPathUpsert;
use crate::db::store::{Store, StoreError};
use crate::services::llm_provider::{
    CompletionError, CompletionRequest, CompletionService, ToolSpec,
};
use crate::services::prompt::learning_path_prompt;
use crate::services::result_mapper::{learning_path_from_tool_call, LearningPathDraft, MapError};

pub const RECENT_SUBMISSION_LIMIT: i64 = 10;
pub const LEARNING_PATH_TOOL: &str = "create_learning_path";

#[derive(Debug, Error)]
pub enum LearningPathError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Mapping(#[from] MapError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn learning_path_tool() -> ToolSpec {
    let string_list = |description: &str| {
        serde_json::json!({
            "type": "array",
            "items": { "type": "string" },
            "description": description
        })
    };

    ToolSpec {
        name: LEARNING_PATH_TOOL,
        description: "Create a structured learning path for the student",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "skill_level": {
                    "type": "number",
                    "description": "Assessed skill level from 0-100"
                },
                "strengths": string_list("List of student strengths"),
                "areas_for_improvement": string_list("Areas where student needs improvement"),
                "recommended_topics": string_list("Next topics to study in priority order"),
                "next_milestone": {
                    "type": "string",
                    "description": "Clear next goal to achieve"
                }
            },
            "required": [
                "skill_level",
                "strengths",
                "areas_for_improvement",
                "recommended_topics",
                "next_milestone"
            ],
            "additionalProperties": false
        }),
    }
}

/// Builds a path from the student's recent answers and stores it, replacing
/// any earlier path for the same topic.
pub async fn generate(
    store: &dyn Store,
    completion: &dyn CompletionService,
    student_id: &str,
    topic: &str,
) -> Result<LearningPathDraft, LearningPathError> {
    let recent = store
        .recent_test_submissions(student_id, RECENT_SUBMISSION_LIMIT)
        .await?;
    let skill_level = store
        .find_progress(student_id, topic)
        .await?
        .map(|progress| progress.skill_level)
        .unwrap_or(0);

    let prompt = learning_path_prompt(topic, skill_level, &recent);
    let request =
        CompletionRequest::new(prompt.system, prompt.user).with_tool(learning_path_tool());
    let response = completion.complete(request).await?;
    let draft = learning_path_from_tool_call(&response)?;

    store
        .upsert_learning_path(LearningPathUpsert {
            student_id: student_id.to_string(),
            topic: topic.to_string(),
            skill_level: draft.skill_level,
            strengths: draft.strengths.clone(),
            areas_for_improvement: draft.areas_for_improvement.clone(),
            recommended_topics: draft.recommended_topics.clone(),
            next_milestone: draft.next_milestone.clone(),
        })
        .await?;

    tracing::info!(student_id = %student_id, topic = %topic, skill_level = draft.skill_level, "learning path updated");
    Ok(draft)
}

/// Regenerates a path in the background. The caller never observes the
/// outcome; failures are logged and dropped.
pub fn spawn_refresh(
    store: Arc<dyn Store>,
    completion: Arc<dyn CompletionService>,
    student_id: String,
    topic: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = generate(store.as_ref(), completion.as_ref(), &student_id, &topic).await {
            tracing::warn!(
                student_id = %student_id,
                topic = %topic,
                error = %err,
                "background learning path refresh failed"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_schema_requires_every_field() {
        let tool = learning_path_tool();
        let required = tool.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(tool.parameters["additionalProperties"], false);
        assert_eq!(
            tool.parameters["properties"]["recommended_topics"]["items"]["type"],
            "string"
        );
    }
}
