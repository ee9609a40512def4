use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Payload;
use crate::{
    auth::AuthUser,
    error::{ErrorBody, Result},
    server::AppState,
    user::{self, NewUser, User},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn authenticated(state: &AppState, user: User) -> Result<AuthResponse> {
    let token = state.tokens.issue(user.id)?;
    Ok(AuthResponse { token, user })
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = NewUser,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing fields or email already used", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Payload(req): Payload<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = user::register(&state.database, &req).await?;
    Ok((StatusCode::CREATED, Json(authenticated(&state, user)?)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Payload(req): Payload<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = user::login(&state.database, &req.email, &req.password).await?;
    Ok(Json(authenticated(&state, user)?))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller", body = User),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[utoipa::path(
    post,
    path = "/api/auth/create-first-admin",
    tag = "auth",
    request_body = NewUser,
    responses(
        (status = 201, description = "First admin created", body = AuthResponse),
        (status = 400, description = "An admin already exists or invalid input", body = ErrorBody)
    )
)]
pub async fn create_first_admin(
    State(state): State<AppState>,
    Payload(req): Payload<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = user::create_first_admin(&state.database, &req).await?;
    Ok((StatusCode::CREATED, Json(authenticated(&state, user)?)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/create-first-admin", post(create_first_admin))
}
