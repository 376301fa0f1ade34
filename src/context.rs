/// Application context and dependency injection
use crate::{
    account::AccountManager,
    avatar::AvatarStore,
    cascade::CascadeCoordinator,
    config::ServerConfig,
    content::{CommentService, PostService},
    db,
    error::{BlogError, BlogResult},
    mailer::{MailSender, Mailer},
    session::TokenService,
    social::SocialGraph,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub tokens: TokenService,
    pub social: SocialGraph,
    pub posts: PostService,
    pub comments: CommentService,
    pub cascade: CascadeCoordinator,
    pub avatars: AvatarStore,
    // Email
    pub mailer: Arc<dyn MailSender>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> BlogResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self::with_services(Arc::new(config), db, mailer))
    }

    fn with_services(config: Arc<ServerConfig>, db: SqlitePool, mailer: Arc<dyn MailSender>) -> Self {
        let account_manager = Arc::new(AccountManager::new(db.clone(), config.clone()));
        let tokens = TokenService::new(
            &config.authentication.jwt_secret,
            config.authentication.token_ttl_hours,
        );
        let avatars = AvatarStore::new(config.storage.avatar_directory(), &config.service.public_url);
        let cascade = CascadeCoordinator::new(db.clone(), account_manager.clone(), avatars.clone());

        Self {
            social: SocialGraph::new(db.clone()),
            posts: PostService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            account_manager,
            tokens,
            cascade,
            avatars,
            mailer,
            config,
            db,
        }
    }

    /// Replace the mail collaborator
    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> BlogResult<()> {
        let avatar_directory = config.storage.avatar_directory();
        let dirs = [&config.storage.data_directory, &avatar_directory];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    BlogError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Link mailed to confirm a new account
    pub fn activation_url(&self, activation_link: &str) -> String {
        format!(
            "{}/auth/activate/{}",
            self.config.service.public_url.trim_end_matches('/'),
            activation_link
        )
    }

    /// Frontend link mailed for a password reset
    pub fn reset_password_url(&self, token: &str) -> String {
        format!(
            "{}/resetpass/{}",
            self.config.service.client_url.trim_end_matches('/'),
            token
        )
    }
}
