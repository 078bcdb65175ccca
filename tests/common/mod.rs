// Shared test helpers
#![allow(dead_code)]

use hostwatch::auth::Auth;
use hostwatch::config::AppConfig;
use hostwatch::models::{ClientRecord, MetricSnapshot};
use hostwatch::registry::ClientRegistry;
use hostwatch::registry::store::ClientStore;
use std::sync::Arc;
use tokio::time::{Duration, Instant, sleep};

pub fn busy_snapshot() -> MetricSnapshot {
    MetricSnapshot {
        cpu: 55.5,
        memory: 42.0,
        disk_usage: 71.25,
        disk_read_speed: 120.0,
        disk_write_speed: 64.0,
        upload_speed: 12.5,
        download_speed: 300.0,
    }
}

pub fn record(id: &str, name: &str, order: i64) -> ClientRecord {
    ClientRecord::new(id, name, order)
}

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub registry: Arc<ClientRegistry>,
    pub store: Arc<ClientStore>,
    pub auth: Arc<Auth>,
    pub config: AppConfig,
}

pub async fn test_env() -> TestEnv {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().to_string_lossy().into_owned();
    config.web.assets_dir = dir.path().join("assets").to_string_lossy().into_owned();
    let store = Arc::new(ClientStore::new(config.storage.clients_path()));
    let auth = Arc::new(Auth::load(config.storage.user_path()).await.unwrap());
    TestEnv {
        dir,
        registry: Arc::new(ClientRegistry::new()),
        store,
        auth,
        config,
    }
}

/// Poll `check` until it holds or three seconds pass.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}
