use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use super::{Payload, parse_id};
use crate::{
    auth::AuthUser,
    chat::{self, ChatView, DiscussionView, MessageView, NewMessage, UserChatView},
    error::{ErrorBody, Result},
    server::AppState,
};

#[utoipa::path(
    get,
    path = "/api/chats/active-discussions",
    tag = "chats",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Every discussion, most recently updated first", body = Vec<DiscussionView>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn get_active_discussions(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscussionView>>> {
    Ok(Json(chat::active_discussions(&state.database).await?))
}

#[utoipa::path(
    get,
    path = "/api/chats/user",
    tag = "chats",
    security(("bearer" = [])),
    responses((status = 200, description = "The caller's ten most recent discussions", body = Vec<UserChatView>))
)]
pub async fn get_user_chats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserChatView>>> {
    Ok(Json(chat::user_chats(&state.database, user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/chats/question/{id}",
    tag = "chats",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "The question's discussion; the caller joins it", body = ChatView),
        (status = 400, description = "Malformed question id", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn get_question_chat(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatView>> {
    let question_id = parse_id(&id, "question")?;
    Ok(Json(chat::question_chat(&state.database, question_id, user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/chats/question/{id}/message",
    tag = "chats",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    request_body = NewMessage,
    responses(
        (status = 201, description = "The appended message", body = MessageView),
        (status = 400, description = "Empty content or malformed question id", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(req): Payload<NewMessage>,
) -> Result<(StatusCode, Json<MessageView>)> {
    let question_id = parse_id(&id, "question")?;
    let message = chat::send_message(&state.database, question_id, user.id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chats/active-discussions", get(get_active_discussions))
        .route("/chats/user", get(get_user_chats))
        .route("/chats/question/{id}", get(get_question_chat))
        .route("/chats/question/{id}/message", post(send_message))
}
