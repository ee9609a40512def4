use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use super::{Payload, parse_id};
use crate::{
    auth::AdminUser,
    error::{ErrorBody, Result},
    feedback::{self, Feedback, NewFeedback},
    server::AppState,
};

#[utoipa::path(
    post,
    path = "/api/feedback",
    tag = "feedback",
    security(("bearer" = [])),
    request_body = NewFeedback,
    responses(
        (status = 201, description = "Feedback recorded", body = Feedback),
        (status = 400, description = "Missing content or rating outside 1-5", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Student not found", body = ErrorBody)
    )
)]
pub async fn add_feedback(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Payload(req): Payload<NewFeedback>,
) -> Result<(StatusCode, Json<Feedback>)> {
    let feedback = feedback::add_feedback(&state.database, admin.id, &req).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[utoipa::path(
    get,
    path = "/api/feedback/student/{id}",
    tag = "feedback",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Feedback for the student, newest first", body = Vec<Feedback>),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn get_student_feedback(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Feedback>>> {
    let id = parse_id(&id, "student")?;
    Ok(Json(feedback::student_feedback(&state.database, id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(add_feedback))
        .route("/feedback/student/{id}", get(get_student_feedback))
}
