// Agent: sample this host and push snapshots to the collector, reconnecting forever

use anyhow::Result;
use clap::Parser;
use hostwatch::agent::{Endpoint, Reporter, WsConnector};
use hostwatch::config::AgentArgs;
use hostwatch::sysinfo_repo::SysinfoRepo;
use hostwatch::telemetry;
use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let args = AgentArgs::parse();
    args.validate()?;

    // wss:// handshakes go through rustls; pin the ring provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let endpoint = Endpoint::parse(&args.server)?;
    let probe = Arc::new(tokio::task::spawn_blocking(SysinfoRepo::new).await?);
    let reporter = Reporter::new(
        WsConnector,
        probe,
        &endpoint,
        args.id.trim(),
        args.reporter_config(),
    )?;

    tracing::info!(
        server = %args.server,
        client_id = %args.id,
        url = %reporter.url(),
        "agent starting"
    );

    tokio::select! {
        _ = reporter.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }
    Ok(())
}
