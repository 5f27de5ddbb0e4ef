use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use url::Url;

use readxkcd::proxy::{DEFAULT_MAX_AGE_SECS, DEFAULT_UPSTREAM, ProxyState, router};

/// Caching CORS proxy in front of the xkcd JSON API.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct ProxyArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,

    /// Upstream API base URL.
    #[arg(long, default_value = DEFAULT_UPSTREAM)]
    upstream: Url,

    /// `max-age` advertised on successful responses, in seconds.
    #[arg(long, default_value_t = DEFAULT_MAX_AGE_SECS)]
    max_age: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    readxkcd::logging::init("info").context("init logging")?;

    let args = ProxyArgs::parse();
    tracing::info!(?args, "starting readxkcd-proxy");

    let state = ProxyState::new(&args.upstream, args.max_age)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
