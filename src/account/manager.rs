/// Account directory backed by the `accounts` table
///
/// Username/email uniqueness is enforced by the UNIQUE constraints, not by a
/// prior read, so two concurrent signups cannot both succeed.

use crate::{
    account::{check_avatar_reference, SignupRequest},
    config::ServerConfig,
    credentials,
    db::models::Account,
    error::{BlogError, BlogResult},
};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, avatar, activated, created_at";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new account.
    ///
    /// Returns the account and its activation link id.
    pub async fn create_account(&self, req: SignupRequest) -> BlogResult<(Account, String)> {
        credentials::check_password_policy(&req.password)?;

        let req = SignupRequest {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password: req.password,
        };
        req.validate()?;

        let password_hash = credentials::hash_password(&req.password)?;
        let activation_link = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, activation_link, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&password_hash)
        .bind(&activation_link)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(Self::map_unique_violation)?;

        let id = result.last_insert_rowid();
        tracing::info!(account_id = id, username = %req.username, "account created");

        Ok((
            Account {
                id,
                username: req.username,
                email: req.email,
                password_hash,
                avatar: None,
                activated: false,
                created_at: now,
            },
            activation_link,
        ))
    }

    fn map_unique_violation(e: sqlx::Error) -> BlogError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                let message = db_err.message();
                if message.contains("accounts.username") {
                    return BlogError::Conflict("Username already taken".to_string());
                }
                if message.contains("accounts.email") {
                    return BlogError::Conflict("Email already registered".to_string());
                }
                return BlogError::Conflict("Account already exists".to_string());
            }
        }
        BlogError::Database(e)
    }

    /// Authenticate by username or email
    pub async fn login(&self, identifier: &str, password: &str) -> BlogResult<Account> {
        let invalid = || BlogError::CredentialMismatch("invalid credentials".to_string());

        let account = match self.get_account_by_identifier(identifier).await {
            Ok(account) => account,
            Err(BlogError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };

        if !credentials::verify_password(&account.password_hash, password) {
            tracing::debug!(account_id = account.id, "sign-in rejected: password mismatch");
            return Err(invalid());
        }

        Ok(account)
    }

    /// Get account by id
    pub async fn get_account(&self, id: i64) -> BlogResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| BlogError::NotFound("user not found".to_string()))
    }

    /// Get account by username
    pub async fn get_account_by_username(&self, username: &str) -> BlogResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE username = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| BlogError::NotFound("user not found".to_string()))
    }

    /// Get account by email
    pub async fn get_account_by_email(&self, email: &str) -> BlogResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE email = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| BlogError::NotFound("user not found".to_string()))
    }

    /// Find account by username or email
    pub async fn get_account_by_identifier(&self, identifier: &str) -> BlogResult<Account> {
        // Try username first
        match self.get_account_by_username(identifier).await {
            Err(BlogError::NotFound(_)) => self.get_account_by_email(identifier).await,
            result => result,
        }
    }

    /// Point the account at a new avatar reference
    pub async fn set_avatar(&self, id: i64, avatar: &str) -> BlogResult<()> {
        check_avatar_reference(avatar)?;

        let result = sqlx::query("UPDATE accounts SET avatar = ?1 WHERE id = ?2")
            .bind(avatar)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BlogError::NotFound("user not found".to_string()));
        }

        Ok(())
    }

    /// Activate the account owning `activation_link`
    pub async fn activate(&self, activation_link: &str) -> BlogResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET activated = 1, activation_link = NULL WHERE activation_link = ?1",
        )
        .bind(activation_link)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BlogError::NotFound("user not found".to_string()));
        }

        tracing::info!("account activated");
        Ok(())
    }

    /// Store a fresh reset token for the account registered with `email`.
    ///
    /// Returns `None` when no account uses that email.
    pub async fn generate_password_reset_token(&self, email: &str) -> BlogResult<Option<String>> {
        let token = Self::generate_reset_token();
        let expires_at =
            Utc::now() + Duration::hours(self.config.authentication.reset_token_ttl_hours);

        let result = sqlx::query(
            "UPDATE accounts SET reset_token = ?1, reset_token_expiry = ?2 WHERE email = ?3",
        )
        .bind(&token)
        .bind(expires_at)
        .bind(email)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Replace the password of the account holding `token`
    pub async fn reset_password(&self, token: &str, new_password: &str) -> BlogResult<()> {
        credentials::check_password_policy(new_password)?;

        let row: Option<(i64, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT id, reset_token_expiry FROM accounts WHERE reset_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        let (id, expiry) =
            row.ok_or_else(|| BlogError::NotFound("reset token not found".to_string()))?;

        let expired = expiry.map_or(true, |expires_at| Utc::now() >= expires_at);
        if expired {
            sqlx::query(
                "UPDATE accounts SET reset_token = NULL, reset_token_expiry = NULL WHERE id = ?1",
            )
            .bind(id)
            .execute(&self.db)
            .await?;

            return Err(BlogError::Unauthenticated("token has expired".to_string()));
        }

        let password_hash = credentials::hash_password(new_password)?;
        sqlx::query(
            "UPDATE accounts SET password_hash = ?1, reset_token = NULL, reset_token_expiry = NULL
             WHERE id = ?2",
        )
        .bind(&password_hash)
        .bind(id)
        .execute(&self.db)
        .await?;

        tracing::info!(account_id = id, "password reset");
        Ok(())
    }

    /// 32 random bytes, URL-safe base64
    fn generate_reset_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::path::PathBuf;

    async fn setup_test_manager() -> AccountManager {
        let pool = db::test_pool().await;
        let config = Arc::new(ServerConfig::for_tests(PathBuf::from("./public")));
        AccountManager::new(pool, config)
    }

    fn signup(username: &str, email: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "longenough1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_account() {
        let manager = setup_test_manager().await;

        let (account, link) = manager.create_account(signup("ann", "ann@x.com")).await.unwrap();
        assert_ne!(account.password_hash, "longenough1");
        assert!(!account.activated);
        assert!(!link.is_empty());

        let by_id = manager.get_account(account.id).await.unwrap();
        assert_eq!(by_id.username, "ann");

        let by_name = manager.get_account_by_username("ann").await.unwrap();
        assert_eq!(by_name.id, account.id);

        let by_email = manager.get_account_by_identifier("ann@x.com").await.unwrap();
        assert_eq!(by_email.id, account.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let manager = setup_test_manager().await;
        manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        match manager.create_account(signup("ann", "other@x.com")).await {
            Err(BlogError::Conflict(msg)) => assert!(msg.contains("Username")),
            other => panic!("expected Conflict, got {:?}", other.map(|(a, _)| a.id)),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let manager = setup_test_manager().await;
        manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        match manager.create_account(signup("bob", "ann@x.com")).await {
            Err(BlogError::Conflict(msg)) => assert!(msg.contains("Email")),
            other => panic!("expected Conflict, got {:?}", other.map(|(a, _)| a.id)),
        }
    }

    #[tokio::test]
    async fn test_signup_rejects_whitespace_password() {
        let manager = setup_test_manager().await;
        let mut req = signup("ann", "ann@x.com");
        req.password = "long enough".to_string();

        assert!(matches!(
            manager.create_account(req).await,
            Err(BlogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_find_missing_account() {
        let manager = setup_test_manager().await;
        assert!(matches!(manager.get_account(99).await, Err(BlogError::NotFound(_))));
        assert!(matches!(
            manager.get_account_by_username("nobody").await,
            Err(BlogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_identifier_lookup_surfaces_username_errors() {
        let manager = setup_test_manager().await;
        sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, created_at)
             VALUES ('broken', 'broken@x.com', 'h', 'not a date')",
        )
        .execute(&manager.db)
        .await
        .unwrap();

        // Matches by username but fails to decode
        assert!(matches!(
            manager.get_account_by_identifier("broken").await,
            Err(BlogError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_login() {
        let manager = setup_test_manager().await;
        let (account, _) = manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        assert_eq!(manager.login("ann", "longenough1").await.unwrap().id, account.id);
        assert_eq!(manager.login("ann@x.com", "longenough1").await.unwrap().id, account.id);

        match manager.login("ann", "wrongpassword").await {
            Err(BlogError::CredentialMismatch(msg)) => assert_eq!(msg, "invalid credentials"),
            other => panic!("expected CredentialMismatch, got {:?}", other.map(|a| a.id)),
        }
        assert!(matches!(
            manager.login("nobody", "longenough1").await,
            Err(BlogError::CredentialMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_activation() {
        let manager = setup_test_manager().await;
        let (account, link) = manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        manager.activate(&link).await.unwrap();
        assert!(manager.get_account(account.id).await.unwrap().activated);

        // Link is single-use
        assert!(matches!(manager.activate(&link).await, Err(BlogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_password_reset() {
        let manager = setup_test_manager().await;
        manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        assert!(manager
            .generate_password_reset_token("nobody@x.com")
            .await
            .unwrap()
            .is_none());

        let token = manager
            .generate_password_reset_token("ann@x.com")
            .await
            .unwrap()
            .unwrap();
        manager.reset_password(&token, "brandnewpw").await.unwrap();

        assert!(manager.login("ann", "brandnewpw").await.is_ok());
        assert!(manager.login("ann", "longenough1").await.is_err());
        assert!(matches!(
            manager.reset_password(&token, "anotherpw1").await,
            Err(BlogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_reset_token() {
        let manager = setup_test_manager().await;
        let (account, _) = manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        let token = manager
            .generate_password_reset_token("ann@x.com")
            .await
            .unwrap()
            .unwrap();
        sqlx::query("UPDATE accounts SET reset_token_expiry = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::hours(1))
            .bind(account.id)
            .execute(&manager.db)
            .await
            .unwrap();

        assert!(matches!(
            manager.reset_password(&token, "brandnewpw").await,
            Err(BlogError::Unauthenticated(_))
        ));
        // Expired token was cleared
        assert!(matches!(
            manager.reset_password(&token, "brandnewpw").await,
            Err(BlogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_avatar_length_limit() {
        let manager = setup_test_manager().await;
        let (account, _) = manager.create_account(signup("ann", "ann@x.com")).await.unwrap();

        manager.set_avatar(account.id, "http://localhost:8080/public/avatars/1.png").await.unwrap();
        assert_eq!(
            manager.get_account(account.id).await.unwrap().avatar.as_deref(),
            Some("http://localhost:8080/public/avatars/1.png")
        );

        assert!(matches!(
            manager.set_avatar(account.id, &"x".repeat(101)).await,
            Err(BlogError::Validation(_))
        ));
    }
}
