use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    question::{self, Question},
    utils::now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum ProgressStatus {
    Solved,
    Unsolved,
    NeedsRevision,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProgressRow {
    id: i64,
    user_id: i64,
    question_id: i64,
    status: ProgressStatus,
    last_attempted: OffsetDateTime,
    notes: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

/// A progress record with its question resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: i64,
    pub question: Option<Question>,
    pub status: ProgressStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_attempted: OffsetDateTime,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub question_id: Option<i64>,
    /// Defaults to Unsolved for a new record; absent keeps the stored status.
    pub status: Option<ProgressStatus>,
    /// Absent keeps the stored notes.
    pub notes: Option<String>,
}

const PROGRESS_COLUMNS: &str =
    "id, user_id, question_id, status, last_attempted, notes, created_at, updated_at";

async fn fetch(
    database: &SqlitePool,
    user_id: i64,
    status: Option<ProgressStatus>,
) -> Result<Vec<Progress>> {
    let mut rows = sqlx::query_as::<_, ProgressRow>(&format!(
        "select {PROGRESS_COLUMNS} from progress where user_id = ? and (? is null or status = ?)"
    ))
    .bind(user_id)
    .bind(status)
    .bind(status)
    .fetch_all(database)
    .await?;
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    with_questions(database, rows).await
}

async fn with_questions(database: &SqlitePool, rows: Vec<ProgressRow>) -> Result<Vec<Progress>> {
    let mut ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let questions: HashMap<i64, Question> = question::questions_by_id(database, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| Progress {
            id: row.id,
            user: row.user_id,
            question: questions.get(&row.question_id).cloned(),
            status: row.status,
            last_attempted: row.last_attempted,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

pub async fn user_progress(database: &SqlitePool, user_id: i64) -> Result<Vec<Progress>> {
    fetch(database, user_id, None).await
}

pub async fn revision_questions(database: &SqlitePool, user_id: i64) -> Result<Vec<Progress>> {
    fetch(database, user_id, Some(ProgressStatus::NeedsRevision)).await
}

pub async fn solved_questions(database: &SqlitePool, user_id: i64) -> Result<Vec<Progress>> {
    fetch(database, user_id, Some(ProgressStatus::Solved)).await
}

/// Upsert the (user, question) record. Repeating the same call leaves exactly one record.
pub async fn update_status(
    database: &SqlitePool,
    user_id: i64,
    update: &StatusUpdate,
) -> Result<Progress> {
    let question_id = update
        .question_id
        .ok_or_else(|| Error::bad_request("questionId is required"))?;
    if !question::exists(database, question_id).await? {
        return Err(Error::not_found("Question not found"));
    }
    let now = now();
    let row = sqlx::query_as::<_, ProgressRow>(&format!(
        "insert into progress (user_id, question_id, status, last_attempted, notes, created_at, updated_at) \
         values (?, ?, coalesce(?, 'Unsolved'), ?, ?, ?, ?) \
         on conflict (user_id, question_id) do update set \
         status = coalesce(?, status), \
         notes = coalesce(?, notes), \
         last_attempted = excluded.last_attempted, \
         updated_at = excluded.updated_at \
         returning {PROGRESS_COLUMNS}"
    ))
    .bind(user_id)
    .bind(question_id)
    .bind(update.status)
    .bind(now)
    .bind(&update.notes)
    .bind(now)
    .bind(now)
    .bind(update.status)
    .bind(&update.notes)
    .fetch_one(database)
    .await?;
    info!(
        "user {} set question {} to {:?}",
        user_id, question_id, row.status
    );
    let mut progress = with_questions(database, vec![row]).await?;
    progress
        .pop()
        .ok_or_else(|| anyhow::anyhow!("upserted progress vanished").into())
}

/// Per-student counters shared by the admin views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub solved: i64,
    pub needs_revision: i64,
}

pub async fn status_counts(database: &SqlitePool, user_id: i64) -> Result<StatusCounts> {
    let counts = sqlx::query_as::<_, StatusCounts>(
        "select count(*) as total, \
         coalesce(sum(status = 'Solved'), 0) as solved, \
         coalesce(sum(status = 'NeedsRevision'), 0) as needs_revision \
         from progress where user_id = ?",
    )
    .bind(user_id)
    .fetch_one(database)
    .await?;
    Ok(counts)
}

/// Counters for many students at once, keyed by user id; students without records are absent.
pub async fn status_counts_by_user(
    database: &SqlitePool,
    user_ids: &[i64],
) -> Result<HashMap<i64, StatusCounts>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        user_id: i64,
        #[sqlx(flatten)]
        counts: StatusCounts,
    }
    let rows = sqlx::query_as::<_, Row>(
        "select user_id, count(*) as total, \
         coalesce(sum(status = 'Solved'), 0) as solved, \
         coalesce(sum(status = 'NeedsRevision'), 0) as needs_revision \
         from progress where user_id in (select value from json_each(?)) group by user_id",
    )
    .bind(Json(user_ids))
    .fetch_all(database)
    .await?;
    Ok(rows.into_iter().map(|r| (r.user_id, r.counts)).collect())
}
