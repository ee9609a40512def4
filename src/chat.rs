//! Per-question discussion threads.
//!
//! A chat is one document per question: the message log and the participant
//! set are embedded JSON arrays that are read, mutated and written back whole.
//! Two senders racing on the same chat both read the old log and the later
//! write wins.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    question::{self, Question, QuestionSummary},
    user::{self, UserRef},
    utils::now,
};

/// Upper bound on chats returned by [`user_chats`].
pub const RECENT_CHATS_LIMIT: usize = 10;

/// A message as embedded in the chat document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    #[serde(rename = "_id")]
    pub id: i64,
    pub sender: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatDocument {
    pub id: i64,
    pub question_id: i64,
    pub messages: Json<Vec<StoredMessage>>,
    pub participants: Json<Vec<i64>>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ChatDocument {
    /// Returns true if the user was not yet a participant.
    fn join(&mut self, user_id: i64) -> bool {
        if self.participants.contains(&user_id) {
            return false;
        }
        self.participants.push(user_id);
        true
    }

    fn append(&mut self, sender: i64, content: String, created_at: OffsetDateTime) -> &StoredMessage {
        let id = self.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        self.messages.push(StoredMessage {
            id,
            sender,
            content,
            created_at,
        });
        self.updated_at = created_at;
        &self.messages[self.messages.len() - 1]
    }

    fn sender_ids(&self) -> Vec<i64> {
        self.messages
            .iter()
            .map(|m| m.sender)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A message with its sender resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub sender: Option<UserRef>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MessageView {
    fn new(message: &StoredMessage, users: &HashMap<i64, UserRef>) -> Self {
        Self {
            id: message.id,
            sender: users.get(&message.sender).cloned(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// One question's thread with every sender resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub question: i64,
    pub messages: Vec<MessageView>,
    pub participants: Vec<i64>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Discussion directory entry. `question` is null for a chat whose question was deleted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub question: Option<Question>,
    pub messages: Vec<StoredMessage>,
    pub participants: Vec<UserRef>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A chat the caller takes part in, with the question projected to title and difficulty.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserChatView {
    #[serde(rename = "_id")]
    pub id: i64,
    pub question: Option<QuestionSummary>,
    pub messages: Vec<StoredMessage>,
    pub participants: Vec<i64>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMessage {
    #[serde(default)]
    pub content: String,
}

const CHAT_COLUMNS: &str =
    "id, question_id, messages, participants, is_active, created_at, updated_at";

async fn find_chat(database: &SqlitePool, question_id: i64) -> Result<Option<ChatDocument>> {
    let chat = sqlx::query_as::<_, ChatDocument>(&format!(
        "select {CHAT_COLUMNS} from chat where question_id = ?"
    ))
    .bind(question_id)
    .fetch_optional(database)
    .await?;
    Ok(chat)
}

/// Find the question's chat, creating it with the caller as sole participant if absent.
async fn find_or_create(
    database: &SqlitePool,
    question_id: i64,
    user_id: i64,
) -> Result<ChatDocument> {
    if let Some(chat) = find_chat(database, question_id).await? {
        return Ok(chat);
    }
    let now = now();
    let inserted = sqlx::query(
        "insert into chat (question_id, messages, participants, is_active, created_at, updated_at) \
         values (?, '[]', ?, 1, ?, ?) on conflict (question_id) do nothing",
    )
    .bind(question_id)
    .bind(Json(vec![user_id]))
    .bind(now)
    .bind(now)
    .execute(database)
    .await?
    .rows_affected();
    let chat = find_chat(database, question_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("chat for question {} vanished", question_id))?;
    if inserted > 0 {
        debug!("created chat {} for question {}", chat.id, question_id);
    }
    Ok(chat)
}

async fn save(database: &SqlitePool, chat: &ChatDocument) -> Result<()> {
    sqlx::query("update chat set messages = ?, participants = ?, updated_at = ? where id = ?")
        .bind(&chat.messages)
        .bind(&chat.participants)
        .bind(chat.updated_at)
        .bind(chat.id)
        .execute(database)
        .await?;
    Ok(())
}

// Timestamps keep full precision in Rust; SQLite date functions round to milliseconds.
fn most_recent_first(chats: &mut [ChatDocument]) {
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
}

async fn ensure_question(database: &SqlitePool, question_id: i64) -> Result<()> {
    if !question::exists(database, question_id).await? {
        return Err(Error::not_found("Question not found"));
    }
    Ok(())
}

pub async fn question_chat(
    database: &SqlitePool,
    question_id: i64,
    user_id: i64,
) -> Result<ChatView> {
    ensure_question(database, question_id).await?;
    let mut chat = find_or_create(database, question_id, user_id).await?;
    if chat.join(user_id) {
        chat.updated_at = now();
        save(database, &chat).await?;
        debug!("user {} joined chat {}", user_id, chat.id);
    }
    let users = user::user_refs(database, &chat.sender_ids()).await?;
    Ok(ChatView {
        id: chat.id,
        question: chat.question_id,
        messages: chat
            .messages
            .iter()
            .map(|m| MessageView::new(m, &users))
            .collect(),
        participants: chat.participants.0,
        is_active: chat.is_active,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    })
}

pub async fn send_message(
    database: &SqlitePool,
    question_id: i64,
    user_id: i64,
    content: &str,
) -> Result<MessageView> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::bad_request("Message content is required"));
    }
    ensure_question(database, question_id).await?;
    let mut chat = find_or_create(database, question_id, user_id).await?;
    chat.join(user_id);
    let message = chat.append(user_id, content.to_string(), now()).clone();
    save(database, &chat).await?;
    info!(
        "user {} posted message {} in chat {} (question {})",
        user_id, message.id, chat.id, question_id
    );
    let users = user::user_refs(database, &[user_id]).await?;
    Ok(MessageView::new(&message, &users))
}

/// Every chat, most recently updated first.
pub async fn active_discussions(database: &SqlitePool) -> Result<Vec<DiscussionView>> {
    let mut chats = sqlx::query_as::<_, ChatDocument>(&format!("select {CHAT_COLUMNS} from chat"))
        .fetch_all(database)
        .await?;
    most_recent_first(&mut chats);
    let question_ids: Vec<i64> = chats.iter().map(|c| c.question_id).collect();
    let questions = question::questions_by_id(database, &question_ids).await?;
    let mut user_ids: Vec<i64> = chats
        .iter()
        .flat_map(|c| c.participants.iter().copied())
        .collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let users = user::user_refs(database, &user_ids).await?;
    Ok(chats
        .into_iter()
        .map(|chat| DiscussionView {
            id: chat.id,
            question: questions.get(&chat.question_id).cloned(),
            participants: chat
                .participants
                .iter()
                .filter_map(|id| users.get(id).cloned())
                .collect(),
            messages: chat.messages.0,
            is_active: chat.is_active,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        })
        .collect())
}

/// Up to [`RECENT_CHATS_LIMIT`] chats the user takes part in, most recently updated first.
pub async fn user_chats(database: &SqlitePool, user_id: i64) -> Result<Vec<UserChatView>> {
    let mut chats = sqlx::query_as::<_, ChatDocument>(&format!(
        "select {CHAT_COLUMNS} from chat \
         where exists (select 1 from json_each(chat.participants) where value = ?)"
    ))
    .bind(user_id)
    .fetch_all(database)
    .await?;
    most_recent_first(&mut chats);
    chats.truncate(RECENT_CHATS_LIMIT);
    let question_ids: Vec<i64> = chats.iter().map(|c| c.question_id).collect();
    let questions = question::questions_by_id(database, &question_ids).await?;
    Ok(chats
        .into_iter()
        .map(|chat| UserChatView {
            id: chat.id,
            question: questions.get(&chat.question_id).map(|q| QuestionSummary {
                id: q.id,
                title: q.title.clone(),
                difficulty: q.difficulty,
            }),
            messages: chat.messages.0,
            participants: chat.participants.0,
            is_active: chat.is_active,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        })
        .collect())
}
