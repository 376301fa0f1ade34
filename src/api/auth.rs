/// /auth endpoints: account activation and password reset
use crate::{
    account::{RequestPasswordReset, ResetPasswordRequest},
    api::{success, ApiResponse},
    context::AppContext,
    error::BlogResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/activate/:link", get(activate))
        .route("/auth/reset-password", post(request_password_reset))
        .route("/auth/reset-password/:token", post(reset_password))
}

async fn activate(
    State(ctx): State<AppContext>,
    Path(link): Path<String>,
) -> BlogResult<Json<ApiResponse<()>>> {
    ctx.account_manager.activate(&link).await?;
    Ok(success())
}

/// Always succeeds for a well-formed email so account existence is not revealed
async fn request_password_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<RequestPasswordReset>,
) -> BlogResult<Json<ApiResponse<()>>> {
    req.validate()?;

    match ctx
        .account_manager
        .generate_password_reset_token(req.email.trim())
        .await?
    {
        Some(token) => {
            let link = ctx.reset_password_url(&token);
            if let Err(e) = ctx
                .mailer
                .send_reset_password_link(&[req.email.trim().to_string()], &link)
                .await
            {
                tracing::warn!("Failed to send password reset email: {}", e);
            }
        }
        None => tracing::debug!("password reset requested for unknown email"),
    }

    Ok(success())
}

async fn reset_password(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> BlogResult<Json<ApiResponse<()>>> {
    ctx.account_manager
        .reset_password(&token, &req.new_password)
        .await?;
    Ok(success())
}
