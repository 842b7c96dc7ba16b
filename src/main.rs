//! `proxy <listen-port>`: runs the caching forward proxy.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cacheproxy::config::ProxyConfig;
use cacheproxy::proxy::Proxy;
use cacheproxy::server::Server;

#[derive(Parser)]
#[command(name = "proxy")]
#[command(about = "Caching HTTP/1.0 forward proxy", long_about = None)]
struct Cli {
    /// TCP port to accept client connections on
    listen_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            let _ = err.print();
            return Ok(ExitCode::from(1));
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cacheproxy=info,proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ProxyConfig::from_env()
        .context("loading configuration")?
        .with_port(cli.listen_port);
    config.validate().context("validating configuration")?;
    info!(
        port = config.listen_port,
        max_cache_size = config.max_cache_size,
        max_object_size = config.max_object_size,
        origin_override = ?config.origin_override,
        "configuration loaded"
    );

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let server = Server::bind(&addr, Proxy::new(config))
        .await
        .with_context(|| format!("binding {addr}"))?;
    server.run().await.context("accept loop failed")?;

    Ok(ExitCode::SUCCESS)
}
