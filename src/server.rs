/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{BlogError, BlogResult, ErrorResponse},
};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    // Credentials travel in a cookie, so the client origin must be explicit
    let cors = match ctx.config.service.client_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        Err(_) => CorsLayer::new(),
    }
    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
    .allow_headers([header::CONTENT_TYPE]);

    let public = ServeDir::new(&ctx.config.storage.public_directory);

    Router::new()
        .route("/health", get(health_check))
        .merge(crate::api::routes(ctx.clone()))
        .nest_service("/public", public)
        .fallback(not_found)
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Endpoint not found".to_string(),
        }),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> BlogResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Quillpad listening on {}", addr);
    info!("   Public URL: {}", ctx.config.service.public_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BlogError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BlogError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
