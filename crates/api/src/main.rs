use anyhow::Context;

use comptoir_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    comptoir_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = comptoir_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, tax_rate_bps = config.engine.tax_rate_bps, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
