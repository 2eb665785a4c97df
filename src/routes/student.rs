use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::{
    InputKind, Interaction, NewTestSubmission, Profile, StudentProgress, TestQuestionDetail,
};
use crate::response::AppError;
use crate::services::analysis::{self, SubmissionInput};
use crate::services::learning_path;
use crate::services::result_mapper::extract_clarity_score;
use crate::state::AppState;

use super::json_body;

const RECENT_INTERACTION_LIMIT: i64 = 10;
/// Score recorded for a test answer whose feedback carries no clarity figure.
const DEFAULT_TEST_SCORE: i32 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/assignments", get(assignments))
        .route("/tests/:test_id/questions", get(test_questions))
        .route("/tests/:test_id/submissions", get(test_submissions))
        .route(
            "/tests/:test_id/questions/:question_id/submission",
            post(submit_answer),
        )
        .route("/learning-paths", get(learning_paths))
        .route("/feedback", get(feedback))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    profile: Option<Profile>,
    recent_interactions: Vec<Interaction>,
    progress: Vec<StudentProgress>,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    code: String,
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    let profile = store.find_profile(&user.id).await?;
    let recent_interactions = store
        .recent_interactions(&user.id, RECENT_INTERACTION_LIMIT)
        .await?;
    let progress = store.list_progress(&user.id).await?;

    Ok(Json(DashboardResponse {
        profile,
        recent_interactions,
        progress,
    }))
}

async fn assignments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let assignments = state.store().list_assignments(&user.id).await?;
    Ok(Json(assignments))
}

async fn assigned_questions(
    state: &AppState,
    user: &AuthUser,
    test_id: &str,
) -> Result<Vec<TestQuestionDetail>, AppError> {
    let store = state.store();
    if !store.is_assigned(test_id, &user.id).await? {
        return Err(AppError::not_found("Test not assigned"));
    }
    Ok(store.list_test_questions(test_id).await?)
}

async fn test_questions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let questions = assigned_questions(&state, &user, &test_id).await?;
    Ok(Json(questions))
}

async fn test_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = state
        .store()
        .list_student_submissions(&test_id, &user.id)
        .await?;
    Ok(Json(submissions))
}

/// Grades one answer, stores it, then refreshes the learning path for the
/// question's topic in the background.
async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((test_id, question_id)): Path<(String, String)>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let answer = json_body(payload)?;

    let question = assigned_questions(&state, &user, &test_id)
        .await?
        .into_iter()
        .map(|detail| detail.question)
        .find(|question| question.id == question_id)
        .ok_or_else(|| AppError::not_found("Question not found"))?;

    let input = SubmissionInput {
        input_type: InputKind::Code,
        input_content: answer.code,
        programming_language: Some(question.programming_language.clone()),
    };
    let completion = state.completion();
    let graded = analysis::run_demo(completion.as_ref(), &input).await?;
    let score = extract_clarity_score(&graded.feedback).unwrap_or(DEFAULT_TEST_SCORE);

    let store = state.store();
    let submission = store
        .upsert_test_submission(NewTestSubmission {
            test_id,
            question_id: question.id,
            student_id: user.id.clone(),
            code_submission: input.input_content,
            ai_analysis: serde_json::json!({ "feedback": graded.feedback }),
            score,
        })
        .await?;

    learning_path::spawn_refresh(store, completion, user.id, question.topic);

    Ok((StatusCode::CREATED, Json(submission)))
}

async fn learning_paths(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let paths = state.store().list_learning_paths(&user.id).await?;
    Ok(Json(paths))
}

async fn feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let feedback = state.store().list_feedback_for_student(&user.id).await?;
    Ok(Json(feedback))
}
