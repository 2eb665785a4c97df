use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::{AppRole, NewTeacherFeedback, QuestionDraft, TestDraft};
use crate::middleware::auth::require_role;
use crate::response::AppError;
use crate::state::AppState;

use super::json_body;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/:id", put(update_question).delete(delete_question))
        .route("/tests", get(list_tests).post(create_test))
        .route("/tests/:id", axum::routing::delete(delete_test))
        .route("/tests/:id/assignments", post(assign_test))
        .route("/submissions", get(list_submissions))
        .route("/feedback", post(create_feedback))
        .route("/students", get(list_students))
}

pub async fn require_teacher(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = req.extensions().get::<AuthUser>().cloned() else {
        return AppError::unauthorized("Unauthorized").into_response();
    };

    match require_role(&state, &user, &[AppRole::Teacher, AppRole::Admin]).await {
        Ok(_) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    student_ids: Vec<String>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest {
    submission_id: String,
    feedback_text: String,
    #[serde(default)]
    rating: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentPerformance {
    user_id: String,
    full_name: Option<String>,
    student_number: Option<String>,
    submission_count: usize,
    average_score: i64,
    average_skill_level: i64,
}

fn validate_question(draft: &QuestionDraft) -> Result<(), AppError> {
    let required = [
        ("title", &draft.title),
        ("description", &draft.description),
        ("topic", &draft.topic),
        ("difficulty", &draft.difficulty),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Rounded mean; an empty set averages to zero.
fn rounded_average(values: impl IntoIterator<Item = i32>) -> i64 {
    let (sum, count) = values
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), value| (sum + value as i64, count + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as i64
}

async fn list_questions(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let questions = state.store().list_questions().await?;
    Ok(Json(questions))
}

async fn create_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<QuestionDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let draft = json_body(payload)?;
    validate_question(&draft)?;
    let question = state.store().create_question(&user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<QuestionDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let draft = json_body(payload)?;
    validate_question(&draft)?;
    let question = state.store().update_question(&id, &user.id, draft).await?;
    Ok(Json(question))
}

async fn delete_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store().delete_question(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tests(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tests = state.store().list_tests().await?;
    Ok(Json(tests))
}

async fn create_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<TestDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let draft = json_body(payload)?;
    if draft.title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    let test = state.store().create_test(&user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn delete_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store().delete_test(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    if request.student_ids.is_empty() {
        return Err(AppError::validation("studentIds must not be empty"));
    }

    let store = state.store();
    let owned = store
        .find_test(&id)
        .await?
        .is_some_and(|test| test.teacher_id == user.id);
    if !owned {
        return Err(AppError::not_found("test not found"));
    }

    let assignments = store
        .assign_test(&id, &request.student_ids, request.due_date)
        .await?;
    tracing::info!(test_id = %id, count = assignments.len(), "test assigned");
    Ok((StatusCode::CREATED, Json(assignments)))
}

async fn list_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = state.store().list_submissions_for_teacher(&user.id).await?;
    Ok(Json(submissions))
}

async fn create_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    if request.feedback_text.trim().is_empty() {
        return Err(AppError::validation("feedbackText is required"));
    }
    if request.rating.is_some_and(|rating| !(1..=5).contains(&rating)) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }

    let store = state.store();
    let submission = store
        .find_test_submission(&request.submission_id)
        .await?
        .ok_or_else(|| AppError::not_found("submission not found"))?;
    let owns_test = store
        .find_test(&submission.test_id)
        .await?
        .is_some_and(|test| test.teacher_id == user.id);
    if !owns_test {
        return Err(AppError::not_found("submission not found"));
    }

    let feedback = store
        .insert_feedback(NewTeacherFeedback {
            teacher_id: user.id,
            student_id: submission.student_id,
            submission_id: Some(submission.id),
            feedback_text: request.feedback_text,
            rating: request.rating,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn list_students(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    let students = store.list_students().await?;

    let mut performance = Vec::with_capacity(students.len());
    for student in students {
        let scores = store.submission_scores(&student.user_id).await?;
        let progress = store.list_progress(&student.user_id).await?;

        performance.push(StudentPerformance {
            submission_count: scores.len(),
            // Ungraded answers count as zero.
            average_score: rounded_average(scores.into_iter().map(|s| s.unwrap_or(0))),
            average_skill_level: rounded_average(progress.iter().map(|p| p.skill_level)),
            user_id: student.user_id,
            full_name: student.full_name,
            student_number: student.student_number,
        });
    }

    Ok(Json(performance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rounds_and_handles_empty() {
        assert_eq!(rounded_average(Vec::<i32>::new()), 0);
        assert_eq!(rounded_average([80, 85]), 83);
        assert_eq!(rounded_average([50, 0, 0]), 17);
    }

    #[test]
    fn question_validation_names_the_blank_field() {
        let draft = QuestionDraft {
            title: "Loops".to_string(),
            description: " ".to_string(),
            topic: "loops".to_string(),
            difficulty: "easy".to_string(),
            programming_language: None,
            starter_code: None,
            expected_concepts: vec![],
        };
        let err = validate_question(&draft).unwrap_err();
        assert_eq!(err.message, "description is required");
    }
}
