use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use super::parse_id;
use crate::{
    admin::{self, StudentProgress, StudentStats},
    auth::AdminUser,
    error::{ErrorBody, Result},
    server::AppState,
    user::{self, User},
};

#[utoipa::path(
    get,
    path = "/api/admin/students",
    tag = "admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Every non-admin user", body = Vec<User>),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn list_students(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(user::list_students(&state.database).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/students/{id}/progress",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "The student's progress and counters", body = StudentProgress),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Student not found", body = ErrorBody)
    )
)]
pub async fn get_student_progress(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentProgress>> {
    let id = parse_id(&id, "student")?;
    Ok(Json(admin::student_progress(&state.database, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Completion statistics per student", body = Vec<StudentStats>),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn get_overall_stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentStats>>> {
    Ok(Json(admin::overall_stats(&state.database).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/students", get(list_students))
        .route("/admin/students/{id}/progress", get(get_student_progress))
        .route("/admin/stats", get(get_overall_stats))
}
