use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use super::Payload;
use crate::{
    auth::AuthUser,
    error::{ErrorBody, Result},
    progress::{self, Progress, StatusUpdate},
    server::AppState,
};

#[utoipa::path(
    get,
    path = "/api/progress",
    tag = "progress",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's progress, most recently updated first", body = Vec<Progress>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn get_user_progress(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Progress>>> {
    Ok(Json(progress::user_progress(&state.database, user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/progress/update-status",
    tag = "progress",
    security(("bearer" = [])),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "The upserted record", body = Progress),
        (status = 400, description = "Missing question id or unknown status", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn update_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<StatusUpdate>,
) -> Result<Json<Progress>> {
    Ok(Json(progress::update_status(&state.database, user.id, &req).await?))
}

#[utoipa::path(
    get,
    path = "/api/progress/revision",
    tag = "progress",
    security(("bearer" = [])),
    responses((status = 200, description = "Questions marked for revision", body = Vec<Progress>))
)]
pub async fn get_revision_questions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Progress>>> {
    Ok(Json(progress::revision_questions(&state.database, user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/progress/solved",
    tag = "progress",
    security(("bearer" = [])),
    responses((status = 200, description = "Solved questions", body = Vec<Progress>))
)]
pub async fn get_solved_questions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Progress>>> {
    Ok(Json(progress::solved_questions(&state.database, user.id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", get(get_user_progress))
        .route("/progress/update-status", post(update_status))
        .route("/progress/revision", get(get_revision_questions))
        .route("/progress/solved", get(get_solved_questions))
}
