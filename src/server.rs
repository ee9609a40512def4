use std::{sync::Arc, time::Duration};

use axum::{Json, Router, http::StatusCode, routing::get};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::{self, ApiDoc},
    auth::TokenKeys,
    config::ServerArgs,
    db,
    error::expose_details,
};

/// Shared by every handler; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub database: SqlitePool,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(database: SqlitePool, tokens: TokenKeys) -> Self {
        Self {
            database,
            tokens: Arc::new(tokens),
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        message: "Server is running",
    })
}

/// API routes, health check and Swagger UI, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// The full application: routes, optional client bundle, tracing, CORS and timeout.
pub fn app(state: AppState, args: &ServerArgs) -> Router {
    let mut app = router(state);
    if let Some(dir) = &args.static_dir {
        // unknown paths fall through to the client router
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
        info!("serving client from {}", dir.display());
    }
    app.layer(timeout_layer(args.request_timeout()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(args: ServerArgs) -> anyhow::Result<()> {
    expose_details(args.is_development());
    let database = db::connect(&args.database.database_url).await?;
    let tokens = TokenKeys::new(args.jwt_secret.as_bytes(), args.token_ttl());
    let app = app(AppState::new(database, tokens), &args);

    let addr = args.addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("{:?} server listening on http://{}", args.environment, addr);
    info!("Swagger UI available at http://{}/swagger-ui/", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("received Ctrl+C, shutting down");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::db::memory_pool;

    async fn test_app() -> Router {
        let database = memory_pool().await.unwrap();
        let tokens = TokenKeys::new(b"test-secret", time::Duration::days(30));
        router(AppState::new(database, tokens))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, name: &str, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": name, "email": email, "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn first_admin(app: &Router) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/create-first-admin",
            None,
            Some(json!({"name": "Root", "email": "root@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_question(app: &Router, token: &str, title: &str) -> i64 {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/questions",
            Some(token),
            Some(json!({
                "title": title,
                "description": "Find two numbers adding up to a target.",
                "difficulty": "Easy",
                "category": "Arrays",
                "platform_url": "https://leetcode.com/problems/two-sum/"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["_id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let app = test_app().await;
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "message": "Server is running"}));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = test_app().await;
        let (status, body) = call(&app, Method::GET, "/api/progress", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized, no token");

        let (status, body) = call(&app, Method::GET, "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized, token failed");
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = test_app().await;
        let token = register(&app, "Ada", "ada@example.com").await;
        let (status, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert_eq!(me["isAdmin"], false);
        assert!(me.get("passwordHash").is_none());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ADA@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["_id"], me["_id"]);

        let (status, wrong) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, unknown) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "bob@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn first_admin_only_once() {
        let app = test_app().await;
        first_admin(&app).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/create-first-admin",
            None,
            Some(json!({"name": "Second", "email": "second@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Admin user already exists");
    }

    #[tokio::test]
    async fn students_cannot_write_questions_or_read_stats() {
        let app = test_app().await;
        let token = register(&app, "Ada", "ada@example.com").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/questions",
            Some(&token),
            Some(json!({"title": "Two Sum"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized as admin");

        let (status, _) = call(&app, Method::GET, "/api/admin/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/questions",
            Some(&admin),
            Some(json!({
                "title": "Two Sum",
                "description": "d",
                "difficulty": "Extreme",
                "category": "Arrays",
                "platform_url": "https://example.com"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/questions",
            Some(&admin),
            Some(json!({"title": "Two Sum"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "description is required");

        let (status, body) = call(&app, Method::GET, "/api/questions/not-an-id", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid question ID format");
    }

    #[tokio::test]
    async fn repeated_status_updates_keep_one_record() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let question_id = create_question(&app, &admin, "Two Sum").await;
        let student = register(&app, "Ada", "ada@example.com").await;

        for notes in ["first try", "used a hash map"] {
            let (status, body) = call(
                &app,
                Method::POST,
                "/api/progress/update-status",
                Some(&student),
                Some(json!({"questionId": question_id, "status": "Solved", "notes": notes})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "Solved");
        }

        let (status, progress) = call(&app, Method::GET, "/api/progress", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        let records = progress.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["notes"], "used a hash map");
        assert_eq!(records[0]["question"]["title"], "Two Sum");

        let (_, solved) = call(&app, Method::GET, "/api/progress/solved", Some(&student), None).await;
        assert_eq!(solved.as_array().unwrap().len(), 1);
        let (_, revision) =
            call(&app, Method::GET, "/api/progress/revision", Some(&student), None).await;
        assert!(revision.as_array().unwrap().is_empty());

        let (_, stats) = call(&app, Method::GET, "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(stats[0]["stats"]["completionRate"], 100.0);
    }

    #[tokio::test]
    async fn deleting_a_question_removes_progress() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let question_id = create_question(&app, &admin, "Two Sum").await;
        let student = register(&app, "Ada", "ada@example.com").await;
        call(
            &app,
            Method::POST,
            "/api/progress/update-status",
            Some(&student),
            Some(json!({"questionId": question_id, "status": "NeedsRevision"})),
        )
        .await;

        let uri = format!("/api/questions/{question_id}");
        let (status, body) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Question deleted successfully");

        let (status, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, progress) = call(&app, Method::GET, "/api/progress", Some(&student), None).await;
        assert!(progress.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_message_opens_the_discussion() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let question_id = create_question(&app, &admin, "Two Sum").await;
        let student = register(&app, "Ada", "ada@example.com").await;

        let uri = format!("/api/chats/question/{question_id}/message");
        let (status, message) = call(
            &app,
            Method::POST,
            &uri,
            Some(&student),
            Some(json!({"content": "  Anyone tried two pointers?  "})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["content"], "Anyone tried two pointers?");
        assert_eq!(message["sender"]["name"], "Ada");

        let (status, discussions) = call(
            &app,
            Method::GET,
            "/api/chats/active-discussions",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let discussions = discussions.as_array().unwrap();
        assert_eq!(discussions.len(), 1);
        assert_eq!(discussions[0]["messages"].as_array().unwrap().len(), 1);
        assert_eq!(discussions[0]["participants"][0]["name"], "Ada");

        let (_, mine) = call(&app, Method::GET, "/api/chats/user", Some(&student), None).await;
        assert_eq!(mine[0]["question"]["title"], "Two Sum");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/chats/question/999/message",
            Some(&student),
            Some(json!({"content": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn feedback_is_admin_only() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let student = register(&app, "Ada", "ada@example.com").await;
        let (_, me) = call(&app, Method::GET, "/api/auth/me", Some(&student), None).await;
        let student_id = me["_id"].as_i64().unwrap();

        let (status, feedback) = call(
            &app,
            Method::POST,
            "/api/feedback",
            Some(&admin),
            Some(json!({"studentId": student_id, "content": "Solid progress", "rating": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(feedback["givenBy"]["name"], "Root");

        let uri = format!("/api/feedback/student/{student_id}");
        let (status, _) = call(&app, Method::GET, &uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, list) = call(&app, Method::GET, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_requests_time_out() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(timeout_layer(Duration::from_millis(20)));
        let (status, _) = call(&app, Method::GET, "/slow", None, None).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn student_progress_is_admin_only_and_reports_last_active() {
        let app = test_app().await;
        let admin = first_admin(&app).await;
        let question_id = create_question(&app, &admin, "Two Sum").await;
        let student = register(&app, "Ada", "ada@example.com").await;
        call(
            &app,
            Method::POST,
            "/api/progress/update-status",
            Some(&student),
            Some(json!({"questionId": question_id, "status": "Solved"})),
        )
        .await;

        let (_, me) = call(&app, Method::GET, "/api/auth/me", Some(&student), None).await;
        let uri = format!("/api/admin/students/{}/progress", me["_id"]);
        let (status, body) = call(&app, Method::GET, &uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized as admin");

        // the rejected call above still counted as activity
        let (_, me) = call(&app, Method::GET, "/api/auth/me", Some(&student), None).await;
        let (status, detail) = call(&app, Method::GET, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["student"]["_id"], me["_id"]);
        assert_eq!(detail["stats"]["lastActive"], me["lastActive"]);
        assert_eq!(detail["stats"]["totalQuestions"], 1);
        assert_eq!(detail["stats"]["solvedQuestions"], 1);
        assert_eq!(detail["progress"][0]["question"]["title"], "Two Sum");

        let (status, body) =
            call(&app, Method::GET, "/api/admin/students/999/progress", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Student not found");
    }
}
