use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::AppRole;
use crate::middleware::auth::require_role;
use crate::response::AppError;
use crate::state::AppState;

use super::json_body;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id/role", put(update_role))
}

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = req.extensions().get::<AuthUser>().cloned() else {
        return AppError::unauthorized("Unauthorized").into_response();
    };

    match require_role(&state, &user, &[AppRole::Admin]).await {
        Ok(_) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: AppRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleResponse {
    user_id: String,
    role: AppRole,
}

async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users = state.store().list_users_with_roles().await?;
    Ok(Json(users))
}

async fn update_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    state.store().replace_role(&user_id, request.role).await?;
    tracing::info!(
        admin_id = %admin.id,
        user_id = %user_id,
        role = request.role.as_str(),
        "user role replaced"
    );
    Ok(Json(RoleResponse {
        user_id,
        role: request.role,
    }))
}
