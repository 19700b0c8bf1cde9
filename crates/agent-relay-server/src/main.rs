use agent_relay_server::{AppState, ServerConfig, build_router};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    let addr = config.bind_addr();
    info!(role = %config.role, backend = %config.backend_command, "starting agent-relay");

    let state = AppState::from_config(config).context("failed to initialize server state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
