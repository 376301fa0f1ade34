/// Comments on posts
use crate::{
    db::models::Comment,
    error::{BlogError, BlogResult},
};
use chrono::Utc;
use sqlx::SqlitePool;

const COMMENT_COLUMNS: &str = "id, post_id, post_author_id, author_id, text, created_at";

/// Comment service
#[derive(Clone)]
pub struct CommentService {
    db: SqlitePool,
}

impl CommentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn post_author(&self, post_id: i64) -> BlogResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = ?1")
            .bind(post_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| BlogError::NotFound("post not found".to_string()))
    }

    /// Comment on an existing post
    pub async fn add(&self, author_id: i64, post_id: i64, text: &str) -> BlogResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BlogError::InvalidOperation(
                "Please provide comment text".to_string(),
            ));
        }

        let post_author_id = self.post_author(post_id).await?;
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO comments (post_id, post_author_id, author_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(post_id)
        .bind(post_author_id)
        .bind(author_id)
        .bind(text)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(comment_id = id, post_id, author_id, "comment added");

        Ok(Comment {
            id,
            post_id,
            post_author_id,
            author_id,
            text: text.to_string(),
            created_at: now,
        })
    }

    /// Comments on a post, oldest first
    pub async fn for_post(&self, post_id: i64) -> BlogResult<Vec<Comment>> {
        self.post_author(post_id).await?;

        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at, id",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;

        Ok(comments)
    }

    /// Delete a comment. Allowed for its author and for the post's author.
    pub async fn delete(&self, user_id: i64, post_id: i64, comment_id: i64) -> BlogResult<()> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE id = ?1 AND post_id = ?2",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| BlogError::NotFound("comment not found".to_string()))?;

        if user_id != comment.author_id && user_id != comment.post_author_id {
            return Err(BlogError::Forbidden(
                "You cannot delete this comment".to_string(),
            ));
        }

        sqlx::query("DELETE FROM comments WHERE id = ?1")
            .bind(comment_id)
            .execute(&self.db)
            .await?;

        tracing::info!(comment_id, post_id, user_id, "comment deleted");
        Ok(())
    }
}
