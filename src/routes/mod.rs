mod admin;
mod functions;
mod health;
mod student;
mod teacher;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::middleware::auth::require_auth;
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let middleware_state = state.clone();

    let mut app = Router::new();

    app = app.nest("/functions/v1", functions::router());
    app = app.nest(
        "/api/student",
        student::router().layer(middleware::from_fn_with_state(
            middleware_state.clone(),
            require_auth,
        )),
    );
    app = app.nest(
        "/api/teacher",
        teacher::router()
            .layer(middleware::from_fn_with_state(
                middleware_state.clone(),
                teacher::require_teacher,
            ))
            .layer(middleware::from_fn_with_state(
                middleware_state.clone(),
                require_auth,
            )),
    );
    app = app.nest(
        "/api/admin",
        admin::router()
            .layer(middleware::from_fn_with_state(
                middleware_state.clone(),
                admin::require_admin,
            ))
            .layer(middleware::from_fn_with_state(middleware_state, require_auth)),
    );
    app = app.nest("/health", health::router());

    app.fallback(fallback_handler).with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found").into_response()
}

/// Unwraps a JSON body, turning any decode failure into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
