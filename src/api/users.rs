/// /users endpoints: signup, sign-in, profile, follows, avatar, deletion
use crate::{
    account::{check_avatar_reference, DeleteAccountRequest, SigninRequest, SignupRequest},
    api::{success, success_with, ApiResponse},
    auth::{clear_session, session_cookie, CurrentUser},
    avatar::AvatarStore,
    context::AppContext,
    db::models::{Account, AccountView, PublicProfile},
    error::{BlogError, BlogResult},
    session::ExtraClaims,
};
use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

/// Multipart field carrying the avatar image
const AVATAR_FIELD: &str = "avatar";

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub followed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: String,
}

/// Routes reachable without a session
pub fn public_routes() -> Router<AppContext> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
}

/// Routes behind the identity middleware
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/logout", post(logout))
        .route("/users/delete", delete(delete_account))
        .route("/users/avatar", post(set_avatar))
        .route("/users/follow/:id", post(follow))
        .route("/users/:uname", get(get_user))
        .route("/users/:uname/followers", get(followers))
        .route("/users/:uname/follows", get(follows))
}

fn start_session(ctx: &AppContext, jar: CookieJar, account: &Account) -> BlogResult<CookieJar> {
    let token = ctx.tokens.issue(
        account.id,
        ExtraClaims {
            username: Some(account.username.clone()),
            avatar: account.avatar.clone(),
        },
    )?;

    Ok(jar.add(session_cookie(token, ctx.config.authentication.cookie_secure)))
}

/// Create an account, mail its activation link and sign it in
async fn signup(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> BlogResult<(CookieJar, Json<ApiResponse<()>>)> {
    let (account, activation_link) = ctx.account_manager.create_account(req).await?;

    let link = ctx.activation_url(&activation_link);
    if let Err(e) = ctx
        .mailer
        .send_activation_link(&[account.email.clone()], &link)
        .await
    {
        tracing::warn!(account_id = account.id, "Failed to send activation email: {}", e);
    }

    let jar = start_session(&ctx, jar, &account)?;
    Ok((jar, success()))
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> BlogResult<(CookieJar, Json<ApiResponse<()>>)> {
    let identifier = req
        .identifier()
        .ok_or_else(|| BlogError::Validation("Please provide username or email".to_string()))?;

    let account = ctx.account_manager.login(identifier, &req.password).await?;
    tracing::info!(account_id = account.id, "signed in");

    let jar = start_session(&ctx, jar, &account)?;
    Ok((jar, success()))
}

/// Tokens are not revoked server-side; only the cookie is cleared
async fn logout(jar: CookieJar) -> (CookieJar, Json<ApiResponse<()>>) {
    (clear_session(jar), success())
}

async fn delete_account(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Json(req): Json<DeleteAccountRequest>,
) -> BlogResult<(CookieJar, Json<ApiResponse<()>>)> {
    ctx.cascade
        .delete_account(user.id, req.confirm_password.as_deref())
        .await?;

    Ok((clear_session(jar), success()))
}

async fn get_user(
    State(ctx): State<AppContext>,
    Path(uname): Path<String>,
) -> BlogResult<Json<ApiResponse<AccountView>>> {
    let account = ctx.account_manager.get_account_by_username(&uname).await?;
    Ok(success_with(AccountView::from(account)))
}

async fn followers(
    State(ctx): State<AppContext>,
    Path(uname): Path<String>,
) -> BlogResult<Json<ApiResponse<Vec<PublicProfile>>>> {
    let account = ctx.account_manager.get_account_by_username(&uname).await?;
    Ok(success_with(ctx.social.followers(account.id).await?))
}

async fn follows(
    State(ctx): State<AppContext>,
    Path(uname): Path<String>,
) -> BlogResult<Json<ApiResponse<Vec<PublicProfile>>>> {
    let account = ctx.account_manager.get_account_by_username(&uname).await?;
    Ok(success_with(ctx.social.follows(account.id).await?))
}

async fn follow(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(target): Path<i64>,
) -> BlogResult<Json<ApiResponse<FollowResponse>>> {
    let outcome = ctx.social.toggle_follow(user.id, target).await?;

    Ok(success_with(FollowResponse {
        followed: outcome.is_following(),
    }))
}

/// Store the uploaded `avatar` field and point the account at it
async fn set_avatar(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> BlogResult<Json<ApiResponse<AvatarResponse>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BlogError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| BlogError::Validation("Avatar must be a file".to_string()))?;
        let ext = AvatarStore::extension_for(&file_name)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| BlogError::Validation(format!("Failed to read avatar: {}", e)))?;

        // Checked before the previous file is replaced
        check_avatar_reference(&ctx.avatars.url_for(user.id, &ext))?;

        let url = ctx.avatars.save(user.id, &ext, &data).await?;
        ctx.account_manager.set_avatar(user.id, &url).await?;

        return Ok(success_with(AvatarResponse { avatar: url }));
    }

    Err(BlogError::Validation("Please provide an avatar file".to_string()))
}
