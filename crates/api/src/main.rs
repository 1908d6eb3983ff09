use std::sync::Arc;

use anyhow::Context;

use creditpost_api::app::{build_app, services::build_services};
use creditpost_infra::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    creditpost_observability::init();

    let config = ServerConfig::from_env()?;
    let services = Arc::new(build_services(&config).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.use_persistent_stores,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
