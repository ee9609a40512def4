use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    utils::now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: String,
    #[serde(rename = "platform_url")]
    pub platform_url: String,
    pub added_by: i64,
    pub last_modified_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Author shown next to a question in listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

/// A question with its author resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: String,
    #[serde(rename = "platform_url")]
    pub platform_url: String,
    pub added_by: Option<Author>,
    pub last_modified_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl QuestionView {
    fn new(question: Question, added_by: Option<Author>) -> Self {
        Self {
            id: question.id,
            title: question.title,
            description: question.description,
            difficulty: question.difficulty,
            category: question.category,
            platform_url: question.platform_url,
            added_by,
            last_modified_by: question.last_modified_by,
            last_modified_at: question.last_modified_at,
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}

/// Projection used by the per-user chat listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct QuestionSummary {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub difficulty: Difficulty,
}

const QUESTION_COLUMNS: &str = "id, title, description, difficulty, category, platform_url, \
     added_by, last_modified_by, last_modified_at, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewQuestion {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub platform_url: Option<String>,
}

/// Partial update; absent fields keep their stored value.
pub type QuestionUpdate = NewQuestion;

fn required(field: &'static str, value: &Option<String>) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::bad_request(format!("{field} is required"))),
    }
}

fn optional(field: &'static str, value: &Option<String>) -> Result<Option<String>> {
    match value {
        Some(_) => required(field, value).map(Some),
        None => Ok(None),
    }
}

pub async fn list_questions(database: &SqlitePool) -> Result<Vec<QuestionView>> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "select {QUESTION_COLUMNS} from question order by id"
    ))
    .fetch_all(database)
    .await?;
    with_authors(database, questions).await
}

pub async fn get_question(database: &SqlitePool, id: i64) -> Result<Option<Question>> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "select {QUESTION_COLUMNS} from question where id = ?"
    ))
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(question)
}

pub async fn get_question_view(database: &SqlitePool, id: i64) -> Result<QuestionView> {
    let question = get_question(database, id)
        .await?
        .ok_or_else(|| Error::not_found("Question not found"))?;
    let mut views = with_authors(database, vec![question]).await?;
    views.pop().ok_or_else(|| Error::not_found("Question not found"))
}

pub async fn questions_by_id(
    database: &SqlitePool,
    ids: &[i64],
) -> Result<HashMap<i64, Question>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let questions = sqlx::query_as::<_, Question>(&format!(
        "select {QUESTION_COLUMNS} from question where id in (select value from json_each(?))"
    ))
    .bind(Json(ids))
    .fetch_all(database)
    .await?;
    Ok(questions.into_iter().map(|q| (q.id, q)).collect())
}

pub async fn exists(database: &SqlitePool, id: i64) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("select exists (select 1 from question where id = ?)")
        .bind(id)
        .fetch_one(database)
        .await?;
    Ok(exists)
}

async fn with_authors(
    database: &SqlitePool,
    questions: Vec<Question>,
) -> Result<Vec<QuestionView>> {
    let mut ids: Vec<i64> = questions.iter().map(|q| q.added_by).collect();
    ids.sort_unstable();
    ids.dedup();
    let authors: HashMap<i64, Author> = sqlx::query_as::<_, Author>(
        "select id, name from user where id in (select value from json_each(?))",
    )
    .bind(Json(&ids))
    .fetch_all(database)
    .await?
    .into_iter()
    .map(|a| (a.id, a))
    .collect();
    Ok(questions
        .into_iter()
        .map(|question| {
            let author = authors.get(&question.added_by).cloned();
            QuestionView::new(question, author)
        })
        .collect())
}

pub async fn create_question(
    database: &SqlitePool,
    admin_id: i64,
    new_question: &NewQuestion,
) -> Result<Question> {
    let title = required("title", &new_question.title)?;
    let description = required("description", &new_question.description)?;
    let difficulty = new_question
        .difficulty
        .ok_or_else(|| Error::bad_request("difficulty is required"))?;
    let category = required("category", &new_question.category)?;
    let platform_url = required("platform_url", &new_question.platform_url)?;
    let now = now();
    let question = sqlx::query_as::<_, Question>(&format!(
        "insert into question (title, description, difficulty, category, platform_url, added_by, \
         last_modified_by, last_modified_at, created_at, updated_at) \
         values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) returning {QUESTION_COLUMNS}"
    ))
    .bind(title)
    .bind(description)
    .bind(difficulty)
    .bind(category)
    .bind(platform_url)
    .bind(admin_id)
    .bind(admin_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(database)
    .await?;
    info!("admin {} created question {} '{}'", admin_id, question.id, question.title);
    Ok(question)
}

pub async fn update_question(
    database: &SqlitePool,
    admin_id: i64,
    id: i64,
    update: &QuestionUpdate,
) -> Result<Question> {
    let title = optional("title", &update.title)?;
    let description = optional("description", &update.description)?;
    let category = optional("category", &update.category)?;
    let platform_url = optional("platform_url", &update.platform_url)?;
    let now = now();
    let question = sqlx::query_as::<_, Question>(&format!(
        "update question set \
         title = coalesce(?, title), \
         description = coalesce(?, description), \
         difficulty = coalesce(?, difficulty), \
         category = coalesce(?, category), \
         platform_url = coalesce(?, platform_url), \
         last_modified_by = ?, last_modified_at = ?, updated_at = ? \
         where id = ? returning {QUESTION_COLUMNS}"
    ))
    .bind(title)
    .bind(description)
    .bind(update.difficulty)
    .bind(category)
    .bind(platform_url)
    .bind(admin_id)
    .bind(now)
    .bind(now)
    .bind(id)
    .fetch_optional(database)
    .await?
    .ok_or_else(|| Error::not_found("Question not found"))?;
    info!("admin {} updated question {}", admin_id, id);
    Ok(question)
}

/// Removes the question and every progress record pointing at it. Its chat is kept.
pub async fn delete_question(database: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = database.begin().await?;
    let progress = sqlx::query("delete from progress where question_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let deleted = sqlx::query("delete from question where id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        tx.rollback().await?;
        return Err(Error::not_found("Question not found"));
    }
    tx.commit().await?;
    info!("deleted question {} and {} progress records", id, progress);
    Ok(())
}
