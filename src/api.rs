pub mod admin;
pub mod auth;
pub mod chats;
pub mod feedback;
pub mod progress;
pub mod questions;

use axum::{Router, extract::FromRequest};
use serde::Serialize;
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    error::{Error, Result},
    server::AppState,
};

/// JSON request body whose rejections use the API error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Payload<T>(pub T);

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse a path id, rejecting anything that is not a positive integer.
pub fn parse_id(raw: &str, what: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::bad_request(format!("Invalid {what} ID format"))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(questions::router())
        .merge(progress::router())
        .merge(admin::router())
        .merge(feedback::router())
        .merge(chats::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "DSAForge API"),
    paths(
        auth::register,
        auth::login,
        auth::me,
        auth::create_first_admin,
        questions::list_questions,
        questions::get_question,
        questions::create_question,
        questions::update_question,
        questions::delete_question,
        progress::get_user_progress,
        progress::update_status,
        progress::get_revision_questions,
        progress::get_solved_questions,
        admin::list_students,
        admin::get_student_progress,
        admin::get_overall_stats,
        feedback::add_feedback,
        feedback::get_student_feedback,
        chats::get_active_discussions,
        chats::get_user_chats,
        chats::get_question_chat,
        chats::send_message,
    ),
    components(schemas(crate::error::ErrorBody, MessageBody)),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and bootstrap"),
        (name = "questions", description = "Question catalogue"),
        (name = "progress", description = "Per-user question status"),
        (name = "admin", description = "Student statistics"),
        (name = "feedback", description = "Admin feedback for students"),
        (name = "chats", description = "Per-question discussions"),
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> anyhow::Result<String> {
    Ok(ApiDoc::openapi().to_pretty_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("12", "question").unwrap(), 12);
        for raw in ["", "abc", "0", "-3", "65f1c0ffee", "1.5"] {
            let err = parse_id(raw, "question").unwrap_err();
            assert_eq!(err.to_string(), "Invalid question ID format");
        }
    }

    #[test]
    fn openapi_lists_every_route() {
        let json: serde_json::Value = serde_json::from_str(&openapi_json().unwrap()).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for path in [
            "/api/auth/register",
            "/api/questions/{id}",
            "/api/progress/update-status",
            "/api/admin/students",
            "/api/admin/students/{id}/progress",
            "/api/admin/stats",
            "/api/feedback/student/{id}",
            "/api/chats/active-discussions",
            "/api/chats/question/{id}/message",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(json["components"]["securitySchemes"]["bearer"].is_object());
        assert!(paths["/api/questions/{id}"]["delete"]["security"].is_array());
    }
}
