/// /posts endpoints
use crate::{
    api::{success, success_with, ApiResponse},
    auth::CurrentUser,
    content::{LikeOutcome, NewPost, PostPatch},
    context::AppContext,
    db::models::Post,
    error::BlogResult,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Build post routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/posts/create", post(create_post))
        .route("/posts/likes", get(liked_posts))
        .route("/posts/search", get(search_posts))
        .route("/posts/view/:id", get(view_post))
        .route("/posts/like/:id", post(like_post))
        // GET takes an author id, PATCH and DELETE a post id
        .route(
            "/posts/:id",
            get(author_posts).patch(update_post).delete(delete_post),
        )
}

async fn create_post(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<NewPost>,
) -> BlogResult<Json<ApiResponse<Post>>> {
    Ok(success_with(ctx.posts.create(user.id, req).await?))
}

async fn author_posts(
    State(ctx): State<AppContext>,
    Path(author_id): Path<i64>,
) -> BlogResult<Json<ApiResponse<Vec<Post>>>> {
    Ok(success_with(ctx.posts.author_posts(author_id).await?))
}

async fn view_post(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> BlogResult<Json<ApiResponse<Post>>> {
    Ok(success_with(ctx.posts.find_by_id(id).await?))
}

/// An empty patch succeeds without touching the post
async fn update_post(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<PostPatch>,
) -> BlogResult<Json<ApiResponse<Post>>> {
    let updated = ctx.posts.update(user.id, id, patch).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: updated,
    }))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> BlogResult<Json<ApiResponse<()>>> {
    ctx.posts.delete(user.id, id).await?;
    Ok(success())
}

async fn like_post(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> BlogResult<Json<ApiResponse<LikeOutcome>>> {
    Ok(success_with(ctx.posts.toggle_like(user.id, id).await?))
}

async fn liked_posts(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
) -> BlogResult<Json<ApiResponse<Vec<Post>>>> {
    Ok(success_with(ctx.posts.liked_by(user.id).await?))
}

async fn search_posts(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> BlogResult<Json<ApiResponse<Vec<Post>>>> {
    Ok(success_with(ctx.posts.search(&query.q).await?))
}
