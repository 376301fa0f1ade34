/// Account management system
///
/// Handles signup, sign-in, lookups, activation, password reset and avatars.
/// Account deletion lives in [`crate::cascade`].

mod manager;

pub use manager::AccountManager;

use crate::error::{BlogError, BlogResult};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Longest avatar reference stored on an account
pub const MAX_AVATAR_LEN: usize = 100;

/// Reject avatar references the accounts table cannot hold
pub fn check_avatar_reference(avatar: &str) -> BlogResult<()> {
    if avatar.chars().count() > MAX_AVATAR_LEN {
        return Err(BlogError::Validation(format!(
            "Avatar reference must be at most {} characters",
            MAX_AVATAR_LEN
        )));
    }
    Ok(())
}

/// Static `/users/...` path segments; a profile under one of these names
/// would be unreachable
pub const RESERVED_USERNAMES: &[&str] = &["signup", "login", "logout", "delete", "avatar", "follow"];

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(ValidationError::new("reserved_username"));
    }
    Ok(())
}

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
    pub username: String,
    #[validate(email, length(max = 150))]
    pub email: String,
    pub password: String,
}

/// Sign-in request; either identifier may be used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl SigninRequest {
    /// Username if given, otherwise email
    pub fn identifier(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Account deletion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    pub confirm_password: Option<String>,
}

/// Password reset request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestPasswordReset {
    #[validate(email)]
    pub email: String,
}

/// New password for a reset token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}
