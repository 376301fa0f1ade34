/// API routes and handlers
pub mod auth;
pub mod comments;
pub mod posts;
pub mod users;

use crate::{auth::require_identity, context::AppContext};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};

/// Response envelope: `{"success": true, "data": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// `{"success": true}`
pub fn success() -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
    })
}

/// `{"success": true, "data": data}`
pub fn success_with<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data: Some(data),
    })
}

/// Build API routes. Everything outside the public set requires a session.
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    let public = Router::new()
        .merge(users::public_routes())
        .merge(auth::routes());

    let protected = Router::new()
        .merge(users::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .route_layer(middleware::from_fn_with_state(ctx, require_identity));

    public.merge(protected)
}
