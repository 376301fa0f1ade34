/// Account deletion across every table that references the account
///
/// The database teardown runs in a single transaction. Avatar files are
/// removed only after commit, and a failure there is logged, not returned.
use crate::{
    account::AccountManager,
    avatar::AvatarStore,
    credentials,
    error::{BlogError, BlogResult},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Rows removed by an account deletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub posts: u64,
    pub comments: u64,
    pub likes: u64,
    pub follows: u64,
}

/// Cascade deletion coordinator
#[derive(Clone)]
pub struct CascadeCoordinator {
    db: SqlitePool,
    accounts: Arc<AccountManager>,
    avatars: AvatarStore,
}

impl CascadeCoordinator {
    pub fn new(db: SqlitePool, accounts: Arc<AccountManager>, avatars: AvatarStore) -> Self {
        Self {
            db,
            accounts,
            avatars,
        }
    }

    /// Delete `account_id` after re-checking its password
    pub async fn delete_account(
        &self,
        account_id: i64,
        confirm_password: Option<&str>,
    ) -> BlogResult<DeletionReport> {
        let confirm_password = confirm_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| BlogError::Validation("Please confirm your password".to_string()))?;

        let account = self.accounts.get_account(account_id).await?;
        if !credentials::verify_password(&account.password_hash, confirm_password) {
            tracing::debug!(account_id, "account deletion rejected: password mismatch");
            return Err(BlogError::CredentialMismatch("invalid password".to_string()));
        }

        let report = self.delete_rows(account_id).await?;

        if let Err(e) = self.avatars.remove_all(account_id).await {
            tracing::warn!(account_id, "failed to remove avatar files: {}", e);
        }

        tracing::info!(
            account_id,
            posts = report.posts,
            comments = report.comments,
            likes = report.likes,
            follows = report.follows,
            "account deleted"
        );
        Ok(report)
    }

    async fn delete_rows(&self, account_id: i64) -> BlogResult<DeletionReport> {
        let mut tx = self.db.begin().await?;
        let mut report = DeletionReport::default();

        // Keep counters on surviving posts equal to their like rows
        sqlx::query(
            "UPDATE posts SET likes = likes - 1
             WHERE id IN (SELECT post_id FROM likes WHERE user_id = ?1)",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        report.likes = sqlx::query(
            "DELETE FROM likes
             WHERE user_id = ?1 OR post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        report.comments = sqlx::query(
            "DELETE FROM comments
             WHERE author_id = ?1 OR post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        report.posts = sqlx::query("DELETE FROM posts WHERE author_id = ?1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        report.follows = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 OR followed_id = ?1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let removed = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(BlogError::NotFound("user not found".to_string()));
        }

        tx.commit().await?;
        Ok(report)
    }
}
