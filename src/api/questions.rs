use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use super::{MessageBody, Payload, parse_id};
use crate::{
    auth::AdminUser,
    error::{ErrorBody, Result},
    question::{self, NewQuestion, Question, QuestionUpdate, QuestionView},
    server::AppState,
};

#[utoipa::path(
    get,
    path = "/api/questions",
    tag = "questions",
    responses((status = 200, description = "All questions", body = Vec<QuestionView>))
)]
pub async fn list_questions(State(state): State<AppState>) -> Result<Json<Vec<QuestionView>>> {
    Ok(Json(question::list_questions(&state.database).await?))
}

#[utoipa::path(
    get,
    path = "/api/questions/{id}",
    tag = "questions",
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "The question", body = QuestionView),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionView>> {
    let id = parse_id(&id, "question")?;
    Ok(Json(question::get_question_view(&state.database, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/questions",
    tag = "questions",
    security(("bearer" = [])),
    request_body = NewQuestion,
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Invalid question", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn create_question(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Payload(req): Payload<NewQuestion>,
) -> Result<(StatusCode, Json<Question>)> {
    let question = question::create_question(&state.database, admin.id, &req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[utoipa::path(
    put,
    path = "/api/questions/{id}",
    tag = "questions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    request_body = NewQuestion,
    responses(
        (status = 200, description = "Question updated", body = Question),
        (status = 400, description = "Invalid update", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn update_question(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(req): Payload<QuestionUpdate>,
) -> Result<Json<Question>> {
    let id = parse_id(&id, "question")?;
    let question = question::update_question(&state.database, admin.id, id, &req).await?;
    Ok(Json(question))
}

#[utoipa::path(
    delete,
    path = "/api/questions/{id}",
    tag = "questions",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question and its progress records deleted", body = MessageBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn delete_question(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>> {
    let id = parse_id(&id, "question")?;
    question::delete_question(&state.database, id).await?;
    Ok(Json(MessageBody::new("Question deleted successfully")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/{id}",
            get(get_question)
                .put(update_question)
                .delete(delete_question),
        )
}
