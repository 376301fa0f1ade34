/// /comments endpoints
use crate::{
    api::{success, success_with, ApiResponse},
    auth::CurrentUser,
    content::NewComment,
    context::AppContext,
    db::models::Comment,
    error::BlogResult,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/comments/add/:post", post(add_comment))
        .route("/comments/:post", get(list_comments))
        .route("/comments/:post/:comment", delete(delete_comment))
}

async fn add_comment(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<NewComment>,
) -> BlogResult<Json<ApiResponse<Comment>>> {
    Ok(success_with(ctx.comments.add(user.id, post_id, &req.text).await?))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    Path(post_id): Path<i64>,
) -> BlogResult<Json<ApiResponse<Vec<Comment>>>> {
    Ok(success_with(ctx.comments.for_post(post_id).await?))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> BlogResult<Json<ApiResponse<()>>> {
    ctx.comments.delete(user.id, post_id, comment_id).await?;
    Ok(success())
}
