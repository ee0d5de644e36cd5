use rustynet::config::{DEFAULT_CONFIG_PATH, ServerConfig};
use rustynet::handler::Router;
use rustynet::net::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[async_std::main]
async fn main() -> std::io::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let loaded = ServerConfig::try_from_file(&path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = &loaded {
        tracing::warn!(path = %path, cause = %e, "using default config");
    }

    let server = Server::serve_with(&config, Router::new(&config.proxy)).await?;
    tracing::info!(address = %server.local_addr(), "server started");

    // The accept loop lives as long as `server`; run until the process is
    // killed.
    futures::future::pending::<()>().await;
    drop(server);
    Ok(())
}
