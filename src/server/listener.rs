use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::proxy::{Upstream, basic_auth_value};
use crate::server::lifecycle::Lifecycle;

/// State shared by every connection task.
///
/// Not `Debug`: holds the encoded credentials.
pub struct ProxyContext {
    pub upstream: Upstream,
    /// Precomputed `Authorization` value, `None` when injection is off
    pub auth_value: Option<String>,
    pub lifecycle: Lifecycle,
}

impl ProxyContext {
    pub fn new(config: &Config, lifecycle: Lifecycle) -> Self {
        let upstream = Upstream::new(config.target.clone());
        let auth_value = basic_auth_value(&config.credentials);

        Self {
            upstream,
            auth_value,
            lifecycle,
        }
    }
}

/// A bound proxy, ready to accept connections.
pub struct Proxy {
    listener: TcpListener,
    context: Arc<ProxyContext>,
}

impl Proxy {
    /// Binds the listen port and logs the startup banner.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        let local_addr = listener.local_addr()?;

        info!(
            auth_injection = config.credentials.injection_enabled(),
            "{}",
            config.describe(local_addr)
        );

        Ok(Self {
            listener,
            context: Arc::new(ProxyContext::new(&config, Lifecycle::new())),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.context.lifecycle.clone()
    }

    /// Accepts connections until shutdown is requested.
    ///
    /// Each connection runs in its own task; a failing connection is logged
    /// and never stops the loop.
    pub async fn run(&self) -> anyhow::Result<()> {
        let lifecycle = self.lifecycle();

        loop {
            let (socket, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = lifecycle.shutdown_requested() => break,
            };
            tracing::debug!(%peer, "Accepted connection");

            let context = Arc::clone(&self.context);
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, context);
                if let Err(e) = conn.run().await {
                    tracing::warn!(%peer, error = %e, "Connection error");
                }
            });
        }

        lifecycle.mark_stopped();
        info!("Proxy stopped");
        Ok(())
    }
}
