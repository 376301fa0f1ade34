/// Follow relationships between accounts
use crate::{
    db::models::PublicProfile,
    error::{BlogError, BlogResult},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// State of the (follower, followed) pair after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

impl FollowOutcome {
    pub fn is_following(self) -> bool {
        matches!(self, FollowOutcome::Followed)
    }
}

/// Follow/unfollow toggling and follower enumeration
#[derive(Clone)]
pub struct SocialGraph {
    db: SqlitePool,
}

impl SocialGraph {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Follow `followed_id` if not already following, otherwise unfollow.
    ///
    /// A duplicate-key error on insert means a concurrent identical request
    /// already created the row; the pair is followed either way.
    pub async fn toggle_follow(&self, follower_id: i64, followed_id: i64) -> BlogResult<FollowOutcome> {
        if follower_id == followed_id {
            return Err(BlogError::InvalidOperation(
                "You cannot follow yourself".to_string(),
            ));
        }

        // Present: the delete is the existence check
        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if removed > 0 {
            tracing::info!(follower_id, followed_id, "unfollowed");
            return Ok(FollowOutcome::Unfollowed);
        }

        let target_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1)")
                .bind(followed_id)
                .fetch_one(&self.db)
                .await?;
        if !target_exists {
            return Err(BlogError::NotFound("user not found".to_string()));
        }

        let inserted = sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES (?1, ?2)")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.db)
            .await
            .map_err(BlogError::from);

        match inserted {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(follower_id, followed_id, "follow raced with an identical request");
            }
            Err(e) => return Err(e),
        }

        tracing::info!(follower_id, followed_id, "followed");
        Ok(FollowOutcome::Followed)
    }

    /// Accounts following `user_id`
    pub async fn followers(&self, user_id: i64) -> BlogResult<Vec<PublicProfile>> {
        let rows = sqlx::query_as::<_, PublicProfile>(
            "SELECT a.id, a.username, a.avatar
             FROM follows f JOIN accounts a ON a.id = f.follower_id
             WHERE f.followed_id = ?1
             ORDER BY a.username",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Accounts `user_id` follows
    pub async fn follows(&self, user_id: i64) -> BlogResult<Vec<PublicProfile>> {
        let rows = sqlx::query_as::<_, PublicProfile>(
            "SELECT a.id, a.username, a.avatar
             FROM follows f JOIN accounts a ON a.id = f.followed_id
             WHERE f.follower_id = ?1
             ORDER BY a.username",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    #[cfg(test)]
    async fn is_following(&self, follower_id: i64, followed_id: i64) -> BlogResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn insert_account(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, created_at)
             VALUES (?1, ?2, 'hash', CURRENT_TIMESTAMP)",
        )
        .bind(username)
        .bind(format!("{}@x.com", username))
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_follow_toggle_alternates() {
        let pool = db::test_pool().await;
        let ann = insert_account(&pool, "ann").await;
        let bob = insert_account(&pool, "bob").await;
        let graph = SocialGraph::new(pool);

        assert_eq!(graph.toggle_follow(ann, bob).await.unwrap(), FollowOutcome::Followed);
        assert!(graph.is_following(ann, bob).await.unwrap());
        assert!(!graph.is_following(bob, ann).await.unwrap());

        assert_eq!(graph.toggle_follow(ann, bob).await.unwrap(), FollowOutcome::Unfollowed);
        assert!(!graph.is_following(ann, bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let pool = db::test_pool().await;
        let ann = insert_account(&pool, "ann").await;
        let graph = SocialGraph::new(pool);

        for id in [ann, 12345] {
            assert!(matches!(
                graph.toggle_follow(id, id).await,
                Err(BlogError::InvalidOperation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_follow_missing_account() {
        let pool = db::test_pool().await;
        let ann = insert_account(&pool, "ann").await;
        let graph = SocialGraph::new(pool);

        assert!(matches!(
            graph.toggle_follow(ann, 999).await,
            Err(BlogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enumeration_returns_public_projection() {
        let pool = db::test_pool().await;
        let ann = insert_account(&pool, "ann").await;
        let bob = insert_account(&pool, "bob").await;
        let cat = insert_account(&pool, "cat").await;
        let graph = SocialGraph::new(pool);

        graph.toggle_follow(bob, ann).await.unwrap();
        graph.toggle_follow(cat, ann).await.unwrap();
        graph.toggle_follow(ann, cat).await.unwrap();

        let followers = graph.followers(ann).await.unwrap();
        let names: Vec<&str> = followers.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "cat"]);

        let follows = graph.follows(ann).await.unwrap();
        assert_eq!(
            follows,
            vec![PublicProfile {
                id: cat,
                username: "cat".to_string(),
                avatar: None
            }]
        );

        let json = serde_json::to_value(&follows[0]).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_follows_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::test_file_pool(dir.path()).await;
        let ann = insert_account(&pool, "ann").await;
        let bob = insert_account(&pool, "bob").await;
        let graph = SocialGraph::new(pool.clone());

        for burst in [2, 5, 8] {
            let tasks: Vec<_> = (0..burst)
                .map(|_| {
                    let graph = graph.clone();
                    tokio::spawn(async move { graph.toggle_follow(ann, bob).await })
                })
                .collect();

            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let rows: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            )
            .bind(ann)
            .bind(bob)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert!(rows <= 1, "duplicate follow rows: {}", rows);
            assert_eq!(graph.is_following(ann, bob).await.unwrap(), rows == 1);
        }
    }
}
