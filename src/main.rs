use anyhow::Result;
use hostwatch::*;
use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let app_config = config::AppConfig::load()?;

    let store = Arc::new(registry::store::ClientStore::new(
        app_config.storage.clients_path(),
    ));
    let (client_registry, repaired) = registry::ClientRegistry::from_records(store.load().await?);
    let client_registry = Arc::new(client_registry);
    if repaired {
        store.persist(&client_registry).await?;
    }
    let auth = Arc::new(auth::Auth::load(app_config.storage.user_path()).await?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sweep_handle = registry::sweep::spawn(
        client_registry.clone(),
        store.clone(),
        registry::sweep::SweepConfig {
            interval: std::time::Duration::from_secs(app_config.liveness.sweep_interval_secs),
            stale_timeout: std::time::Duration::from_secs(app_config.liveness.stale_timeout_secs),
        },
        shutdown_rx,
    );

    let app = routes::app(client_registry.clone(), store.clone(), auth, &app_config);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(clients = client_registry.len().await, "Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = sweep_handle.await;
            store.persist(&client_registry).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
