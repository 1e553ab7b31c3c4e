use anyhow::Context;
use basic_auth_proxy::{Config, Proxy};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load().context("invalid proxy configuration")?;
    let proxy = Proxy::bind(cfg).await.context("failed to bind proxy port")?;

    tokio::select! {
        res = proxy.run() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
