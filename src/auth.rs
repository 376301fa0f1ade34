/// Request identity: session cookie verification and extractors
use crate::{
    context::AppContext,
    db::models::Account,
    error::{BlogError, BlogResult},
    session::SESSION_COOKIE,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};

/// Identity of the caller, available to every protected handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            avatar: account.avatar.clone(),
        }
    }
}

/// Validate `token` and resolve the caller.
///
/// By default the account is re-read so a deleted account cannot keep
/// using an unexpired token. With `trust_token_claims` the embedded display
/// fields are used as-is.
pub async fn resolve_identity(ctx: &AppContext, token: &str) -> BlogResult<Identity> {
    let claims = ctx.tokens.validate(token)?;
    let account_id = claims.subject_id()?;

    if ctx.config.authentication.trust_token_claims {
        return Ok(Identity {
            id: account_id,
            username: claims.extra.username.unwrap_or_default(),
            avatar: claims.extra.avatar,
        });
    }

    match ctx.account_manager.get_account(account_id).await {
        Ok(account) => Ok(Identity::from(&account)),
        Err(BlogError::NotFound(_)) => {
            tracing::debug!(account_id, "token subject no longer exists");
            Err(BlogError::Unauthenticated("User is not authorized".to_string()))
        }
        Err(e) => Err(e),
    }
}

/// Reject requests without a valid session cookie and attach the caller's
/// [`Identity`] to the request extensions
pub async fn require_identity(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, BlogError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| BlogError::Unauthenticated("User is not authorized".to_string()))?;

    let identity = resolve_identity(&ctx, &token).await?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extractor for handlers mounted behind [`require_identity`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = BlogError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| BlogError::Unauthenticated("User is not authorized".to_string()))
    }
}

/// Session cookie carrying `token`
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build()
}

/// Jar with the session cookie removed
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::SignupRequest,
        config::ServerConfig,
        session::{ExtraClaims, TokenService},
    };
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    async fn context(trust_claims: bool) -> (AppContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path().to_path_buf());
        config.authentication.trust_token_claims = trust_claims;
        (AppContext::new(config).await.unwrap(), dir)
    }

    async fn signup(ctx: &AppContext) -> Account {
        ctx.account_manager
            .create_account(SignupRequest {
                username: "ann".to_string(),
                email: "ann@x.com".to_string(),
                password: "longenough1".to_string(),
            })
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_resolves_existing_account() {
        let (ctx, _dir) = context(false).await;
        let account = signup(&ctx).await;
        let token = ctx.tokens.issue(account.id, ExtraClaims::default()).unwrap();

        let identity = resolve_identity(&ctx, &token).await.unwrap();
        assert_eq!(identity, Identity::from(&account));
    }

    #[tokio::test]
    async fn test_deleted_subject_rejected() {
        let (ctx, _dir) = context(false).await;
        let token = ctx.tokens.issue(77, ExtraClaims::default()).unwrap();

        assert!(matches!(
            resolve_identity(&ctx, &token).await,
            Err(BlogError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_trusted_claims_skip_lookup() {
        let (ctx, _dir) = context(true).await;
        let extra = ExtraClaims {
            username: Some("ghost".to_string()),
            avatar: None,
        };
        let token = ctx.tokens.issue(77, extra).unwrap();

        let identity = resolve_identity(&ctx, &token).await.unwrap();
        assert_eq!(identity.id, 77);
        assert_eq!(identity.username, "ghost");
    }

    #[tokio::test]
    async fn test_expired_and_foreign_tokens_rejected() {
        let (ctx, _dir) = context(false).await;
        let account = signup(&ctx).await;

        let expired = ctx
            .tokens
            .issue_at(account.id, ExtraClaims::default(), Utc::now() - Duration::hours(48))
            .unwrap();
        let foreign = TokenService::new("some-other-secret-of-sufficient-size", 24)
            .issue(account.id, ExtraClaims::default())
            .unwrap();

        for token in [expired, foreign] {
            assert!(matches!(
                resolve_identity(&ctx, &token).await,
                Err(BlogError::Unauthenticated(_))
            ));
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
