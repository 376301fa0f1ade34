/// Quillpad server binary
use quillpad::{config::ServerConfig, context::AppContext, error::BlogResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> BlogResult<()> {
    let config = ServerConfig::from_env()?;

    // RUST_LOG wins over BLOG_LOG_LEVEL
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quillpad={},tower_http={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        database = %config.storage.database.display(),
        trust_token_claims = config.authentication.trust_token_claims,
        "configuration loaded"
    );

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await
}
