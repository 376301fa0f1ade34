/// Post lifecycle and the like toggle
///
/// `posts.likes` is a denormalized count of `likes` rows for the post. Every
/// path that adds or removes a like row adjusts the counter in the same
/// transaction.
use crate::{
    content::{NewPost, PostPatch, SEARCH_LIMIT},
    db::models::Post,
    error::{BlogError, BlogResult},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use validator::Validate;

const POST_SELECT: &str = "SELECT p.id, p.author_id, a.username AS author_username,
        p.title, p.text, p.likes, p.created_at
     FROM posts p JOIN accounts a ON a.id = p.author_id";

/// Resulting like state for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes: i64,
}

/// Post service
#[derive(Clone)]
pub struct PostService {
    db: SqlitePool,
}

impl PostService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a post authored by `author_id`
    pub async fn create(&self, author_id: i64, post: NewPost) -> BlogResult<Post> {
        let post = NewPost {
            title: post.title.trim().to_string(),
            text: post.text.trim().to_string(),
        };
        post.validate()?;

        let id = sqlx::query(
            "INSERT INTO posts (author_id, title, text, likes, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
        )
        .bind(author_id)
        .bind(&post.title)
        .bind(&post.text)
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(post_id = id, author_id, "post created");
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: i64) -> BlogResult<Post> {
        sqlx::query_as::<_, Post>(&format!("{} WHERE p.id = ?1", POST_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| BlogError::NotFound("post not found".to_string()))
    }

    /// Posts by `author_id`, newest first
    pub async fn author_posts(&self, author_id: i64) -> BlogResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "{} WHERE p.author_id = ?1 ORDER BY p.created_at DESC, p.id DESC",
            POST_SELECT
        ))
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;

        Ok(posts)
    }

    /// Posts liked by `user_id`
    pub async fn liked_by(&self, user_id: i64) -> BlogResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "{} JOIN likes l ON l.post_id = p.id WHERE l.user_id = ?1 ORDER BY p.created_at DESC, p.id DESC",
            POST_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(posts)
    }

    /// Case-insensitive substring match on title or text
    pub async fn search(&self, query: &str) -> BlogResult<Vec<Post>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let posts = sqlx::query_as::<_, Post>(&format!(
            "{} WHERE instr(lower(p.title), lower(?1)) > 0 OR instr(lower(p.text), lower(?1)) > 0
             ORDER BY p.created_at DESC, p.id DESC LIMIT ?2",
            POST_SELECT
        ))
        .bind(query)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(posts)
    }

    async fn owner_of<'e, E>(executor: E, post_id: i64) -> BlogResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = ?1")
            .bind(post_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| BlogError::NotFound("post not found".to_string()))
    }

    /// Apply a partial update. Returns `None` when the patch has no
    /// effective fields, in which case nothing is read or written.
    pub async fn update(&self, user_id: i64, post_id: i64, patch: PostPatch) -> BlogResult<Option<Post>> {
        let patch = patch.effective();
        if patch.is_empty() {
            return Ok(None);
        }
        patch.validate()?;

        let updated = sqlx::query(
            "UPDATE posts SET title = COALESCE(?1, title), text = COALESCE(?2, text)
             WHERE id = ?3 AND author_id = ?4",
        )
        .bind(&patch.title)
        .bind(&patch.text)
        .bind(post_id)
        .bind(user_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if updated == 0 {
            Self::owner_of(&self.db, post_id).await?;
            return Err(BlogError::Forbidden("You can only edit your own posts".to_string()));
        }

        tracing::info!(post_id, user_id, "post updated");
        self.find_by_id(post_id).await.map(Some)
    }

    /// Delete a post with its comments and likes
    pub async fn delete(&self, user_id: i64, post_id: i64) -> BlogResult<()> {
        let mut tx = self.db.begin().await?;

        // Write before any read: a deferred transaction that reads first
        // cannot upgrade once another connection has committed
        let claimed = sqlx::query("UPDATE posts SET likes = 0 WHERE id = ?1 AND author_id = ?2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if claimed == 0 {
            Self::owner_of(&mut *tx, post_id).await?;
            return Err(BlogError::Forbidden("You can only delete your own posts".to_string()));
        }

        sqlx::query("DELETE FROM comments WHERE post_id = ?1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM likes WHERE post_id = ?1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE id = ?1 AND author_id = ?2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(post_id, user_id, "post deleted");
        Ok(())
    }

    /// Like the post if `user_id` has not, otherwise remove the like.
    ///
    /// Row and counter change together or not at all. A duplicate-key error
    /// on insert means an identical request got there first; the post stays
    /// liked and the counter is left as that request set it.
    pub async fn toggle_like(&self, user_id: i64, post_id: i64) -> BlogResult<LikeOutcome> {
        let mut tx = self.db.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = if removed > 0 {
            sqlx::query("UPDATE posts SET likes = likes - 1 WHERE id = ?1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            false
        } else {
            Self::owner_of(&mut *tx, post_id).await?;

            let inserted = sqlx::query("INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await
                .map_err(BlogError::from);

            match inserted {
                Ok(_) => {
                    sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = ?1")
                        .bind(post_id)
                        .execute(&mut *tx)
                        .await?;
                }
                // SQLite rolls back only the failed statement
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!(user_id, post_id, "like raced with an identical request");
                }
                Err(e) => return Err(e),
            }
            true
        };

        let likes: i64 = sqlx::query_scalar("SELECT likes FROM posts WHERE id = ?1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, post_id, liked, likes, "like toggled");
        Ok(LikeOutcome { liked, likes })
    }
}
