use anyhow::Context;

use fuelcert_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fuelcert_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "starting fuelcert-api");

    let app = fuelcert_api::app::build_app(&config)
        .await
        .context("failed to initialize services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
