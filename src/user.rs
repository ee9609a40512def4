use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{hash_password, verify_password},
    error::{Error, Result, is_unique_violation},
    utils::now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Subscription {
    Free,
    Premium,
}

/// A stored account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,
    pub is_admin: bool,
    pub subscription: Subscription,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Identity attached to messages, participants and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, is_admin, subscription, last_active, created_at, updated_at";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl NewUser {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty()
        {
            return Err(Error::bad_request("Please provide all required fields"));
        }
        Ok(())
    }
}

fn duplicate_user() -> Error {
    Error::bad_request("User already exists with this email")
}

pub async fn get_user(database: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("select {USER_COLUMNS} from user where id = ?"))
        .bind(id)
        .fetch_optional(database)
        .await?;
    Ok(user)
}

pub async fn find_by_email(database: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user =
        sqlx::query_as::<_, User>(&format!("select {USER_COLUMNS} from user where email = ?"))
            .bind(normalize_email(email))
            .fetch_optional(database)
            .await?;
    Ok(user)
}

/// Stamp the last-active time and return the fresh record.
pub async fn touch(database: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "update user set last_active = ? where id = ? returning {USER_COLUMNS}"
    ))
    .bind(now())
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(user)
}

async fn insert_user(
    database: &SqlitePool,
    new_user: &NewUser,
    is_admin: bool,
    subscription: Subscription,
) -> Result<User> {
    new_user.validate()?;
    let email = normalize_email(&new_user.email);
    if find_by_email(database, &email).await?.is_some() {
        return Err(duplicate_user());
    }
    let password_hash = hash_password(&new_user.password)?;
    let now = now();
    let user = sqlx::query_as::<_, User>(&format!(
        "insert into user (name, email, password_hash, is_admin, subscription, last_active, created_at, updated_at) \
         values (?, ?, ?, ?, ?, ?, ?, ?) returning {USER_COLUMNS}"
    ))
    .bind(new_user.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(is_admin)
    .bind(subscription)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(database)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate_user()
        } else {
            e.into()
        }
    })?;
    Ok(user)
}

pub async fn register(database: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let user = insert_user(database, new_user, false, Subscription::Free).await?;
    info!("registered user {} <{}>", user.id, user.email);
    Ok(user)
}

/// Same generic error whether the email is unknown or the password is wrong.
pub async fn login(database: &SqlitePool, email: &str, password: &str) -> Result<User> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(Error::bad_request("Please provide email and password"));
    }
    let invalid = || Error::Unauthorized("Invalid email or password".to_string());
    let user = find_by_email(database, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password_hash) {
        return Err(invalid());
    }
    let user = touch(database, user.id).await?.ok_or_else(invalid)?;
    info!("user {} logged in", user.id);
    Ok(user)
}

pub async fn admin_exists(database: &SqlitePool) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("select exists (select 1 from user where is_admin = 1)")
        .fetch_one(database)
        .await?;
    Ok(exists)
}

/// One-time bootstrap: only succeeds while no admin exists.
pub async fn create_first_admin(database: &SqlitePool, new_user: &NewUser) -> Result<User> {
    if admin_exists(database).await? {
        return Err(Error::bad_request("Admin user already exists"));
    }
    let user = insert_user(database, new_user, true, Subscription::Premium).await?;
    info!("created first admin {} <{}>", user.id, user.email);
    Ok(user)
}

/// Create an admin regardless of existing admins, used by the bootstrap binary.
pub async fn create_admin(database: &SqlitePool, new_user: &NewUser) -> Result<User> {
    insert_user(database, new_user, true, Subscription::Premium).await
}

pub async fn list_students(database: &SqlitePool) -> Result<Vec<User>> {
    let students = sqlx::query_as::<_, User>(&format!(
        "select {USER_COLUMNS} from user where is_admin = 0 order by id"
    ))
    .fetch_all(database)
    .await?;
    Ok(students)
}

/// Resolve user ids to identities; ids without a user are absent from the map.
pub async fn user_refs(database: &SqlitePool, ids: &[i64]) -> Result<HashMap<i64, UserRef>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = sqlx::query_as::<_, UserRef>(
        "select id, name, email from user where id in (select value from json_each(?))",
    )
    .bind(Json(ids))
    .fetch_all(database)
    .await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}
