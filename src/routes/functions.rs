use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::middleware::auth::authenticate;
use crate::response::AppError;
use crate::services::analysis::{self, SubmissionInput};
use crate::services::learning_path;
use crate::state::AppState;

use super::json_body;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze-demo", post(analyze_demo))
        .route("/analyze-input", post(analyze_input))
        .route("/generate-learning-path", post(generate_learning_path))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearningPathRequest {
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

async fn analyze_demo(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let completion = state.completion();
    let feedback = analysis::run_demo(completion.as_ref(), &input).await?;
    Ok(Json(feedback))
}

async fn analyze_input(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmissionInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&state, &headers)?;
    let input = json_body(payload)?;

    let store = state.store();
    let completion = state.completion();
    let outcome =
        analysis::run_authenticated(store.as_ref(), completion.as_ref(), &user.id, &input).await?;
    Ok(Json(outcome))
}

async fn generate_learning_path(
    State(state): State<AppState>,
    payload: Result<Json<LearningPathRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(student_id), Some(topic)) = (non_empty(request.student_id), non_empty(request.topic))
    else {
        return Err(AppError::bad_request("Missing required fields"));
    };

    let store = state.store();
    let completion = state.completion();
    let draft =
        learning_path::generate(store.as_ref(), completion.as_ref(), &student_id, &topic).await?;
    Ok(Json(draft))
}
