/// Configuration management for Quillpad
use crate::error::{BlogError, BlogResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used for avatar links and activation links
    pub public_url: String,
    /// Frontend URL used for password reset links
    pub client_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Served under `/public`; avatars live in `<public_directory>/avatars`
    pub public_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub cookie_secure: bool,
    /// Accept identity claims from the token without re-reading the account
    pub trust_token_claims: bool,
    pub reset_token_ttl_hours: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl StorageConfig {
    pub fn avatar_directory(&self) -> PathBuf {
        self.public_directory.join("avatars")
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BlogResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("BLOG_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("BLOG_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| BlogError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("BLOG_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));
        let client_url = env::var("BLOG_CLIENT_URL").unwrap_or_else(|_| public_url.clone());

        let data_directory: PathBuf = env::var("BLOG_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("BLOG_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("blog.sqlite"));
        let public_directory = env::var("BLOG_PUBLIC_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public"));

        let jwt_secret = env::var("BLOG_JWT_SECRET")
            .map_err(|_| BlogError::Validation("JWT secret required".to_string()))?;
        let token_ttl_hours = env::var("BLOG_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);
        let cookie_secure = env::var("BLOG_COOKIE_SECURE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let trust_token_claims = env::var("BLOG_TRUST_TOKEN_CLAIMS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let reset_token_ttl_hours = env::var("BLOG_RESET_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "12".to_string())
            .parse()
            .unwrap_or(12);

        let email = if let Ok(smtp_url) = env::var("BLOG_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("BLOG_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@localhost".to_string()),
            })
        } else {
            None
        };

        let log_level = env::var("BLOG_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                client_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                public_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_hours,
                cookie_secure,
                trust_token_claims,
                reset_token_ttl_hours,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> BlogResult<()> {
        if self.service.hostname.is_empty() {
            return Err(BlogError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(BlogError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_hours <= 0 {
            return Err(BlogError::Validation(
                "Token TTL must be a positive number of hours".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests: in-memory database, caller-chosen public directory
    #[doc(hidden)]
    pub fn for_tests(public_directory: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                public_url: "http://localhost:8080".to_string(),
                client_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                data_directory: public_directory.join("data"),
                database: PathBuf::from(":memory:"),
                public_directory,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only".to_string(),
                token_ttl_hours: 24,
                cookie_secure: true,
                trust_token_claims: false,
                reset_token_ttl_hours: 12,
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_tests(PathBuf::from("./public"));
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(BlogError::Validation(_))));
    }

    #[test]
    fn test_avatar_directory() {
        let config = ServerConfig::for_tests(PathBuf::from("/srv/public"));
        assert_eq!(
            config.storage.avatar_directory(),
            PathBuf::from("/srv/public/avatars")
        );
    }
}
