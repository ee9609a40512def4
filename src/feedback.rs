use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    user::{self, UserRef},
    utils::now,
};

#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedbackRow {
    id: i64,
    student_id: i64,
    given_by: i64,
    content: String,
    rating: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "_id")]
    pub id: i64,
    pub student: Option<UserRef>,
    pub given_by: Option<UserRef>,
    pub content: String,
    pub rating: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub student_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    pub rating: Option<i64>,
}

const FEEDBACK_COLUMNS: &str = "id, student_id, given_by, content, rating, created_at, updated_at";

async fn resolve(database: &SqlitePool, rows: Vec<FeedbackRow>) -> Result<Vec<Feedback>> {
    let mut ids: Vec<i64> = rows.iter().flat_map(|r| [r.student_id, r.given_by]).collect();
    ids.sort_unstable();
    ids.dedup();
    let users = user::user_refs(database, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| Feedback {
            id: row.id,
            student: users.get(&row.student_id).cloned(),
            given_by: users.get(&row.given_by).cloned(),
            content: row.content,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

pub async fn add_feedback(
    database: &SqlitePool,
    admin_id: i64,
    new_feedback: &NewFeedback,
) -> Result<Feedback> {
    let student_id = new_feedback
        .student_id
        .ok_or_else(|| Error::bad_request("studentId is required"))?;
    let content = new_feedback.content.trim();
    if content.is_empty() {
        return Err(Error::bad_request("Feedback content is required"));
    }
    let rating = new_feedback
        .rating
        .ok_or_else(|| Error::bad_request("Rating is required"))?;
    if !(1..=5).contains(&rating) {
        return Err(Error::bad_request("Rating must be between 1 and 5"));
    }
    if user::get_user(database, student_id).await?.is_none() {
        return Err(Error::not_found("Student not found"));
    }
    let now = now();
    let row = sqlx::query_as::<_, FeedbackRow>(&format!(
        "insert into feedback (student_id, given_by, content, rating, created_at, updated_at) \
         values (?, ?, ?, ?, ?, ?) returning {FEEDBACK_COLUMNS}"
    ))
    .bind(student_id)
    .bind(admin_id)
    .bind(content)
    .bind(rating)
    .bind(now)
    .bind(now)
    .fetch_one(database)
    .await?;
    info!("admin {} left feedback {} for student {}", admin_id, row.id, student_id);
    let mut feedback = resolve(database, vec![row]).await?;
    feedback
        .pop()
        .ok_or_else(|| anyhow::anyhow!("inserted feedback vanished").into())
}

/// Newest first.
pub async fn student_feedback(database: &SqlitePool, student_id: i64) -> Result<Vec<Feedback>> {
    let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
        "select {FEEDBACK_COLUMNS} from feedback where student_id = ? \
         order by julianday(created_at) desc, id desc"
    ))
    .bind(student_id)
    .fetch_all(database)
    .await?;
    resolve(database, rows).await
}
