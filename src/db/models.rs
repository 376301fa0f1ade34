/// Row types for the blog database
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

/// Account fields safe to show to any authenticated user
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
}

/// Profile returned by `GET /users/:uname`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            avatar: account.avatar,
            created_at: account.created_at,
        }
    }
}

/// Post record joined with its author's username
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub text: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// Comment record. `post_author_id` is copied from the post at write time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub post_author_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
