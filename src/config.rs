use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::ReporterConfig;

// ---------- Collector (server) ----------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 44123,
            host: "0.0.0.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub clients_file: String,
    pub user_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            clients_file: "clients.json".into(),
            user_file: "user.json".into(),
        }
    }
}

impl StorageConfig {
    pub fn clients_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.clients_file)
    }

    pub fn user_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.user_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// How often connected clients are checked for silence.
    pub sweep_interval_secs: u64,
    /// Silence after which a connected client is marked disconnected.
    pub stale_timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            stale_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Directory served under /assets; its index.html is served at /.
    pub assets_dir: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            assets_dir: "assets".into(),
        }
    }
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`). A missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::load_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "config file not found; using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(anyhow::anyhow!("read {}: {}", path, e)),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            !self.storage.data_dir.is_empty(),
            "storage.data_dir must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.clients_file.is_empty(),
            "storage.clients_file must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.user_file.is_empty(),
            "storage.user_file must be non-empty"
        );
        anyhow::ensure!(
            self.storage.clients_file != self.storage.user_file,
            "storage.clients_file and storage.user_file must differ"
        );
        anyhow::ensure!(
            self.liveness.sweep_interval_secs > 0,
            "liveness.sweep_interval_secs must be > 0, got {}",
            self.liveness.sweep_interval_secs
        );
        anyhow::ensure!(
            self.liveness.stale_timeout_secs > 0,
            "liveness.stale_timeout_secs must be > 0, got {}",
            self.liveness.stale_timeout_secs
        );
        Ok(())
    }
}

// ---------- Agent ----------

/// Agent command line. Every flag can also come from the environment.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "hostwatch-agent", version, about = "Push host metrics to a hostwatch collector")]
pub struct AgentArgs {
    /// Collector address: host:port, or http(s)://host[:port]
    #[arg(long, env = "HOSTWATCH_SERVER", default_value = "localhost:44123")]
    pub server: String,

    /// Client id issued by the collector when the client was registered
    #[arg(long, env = "HOSTWATCH_ID")]
    pub id: String,

    #[arg(long, env = "HOSTWATCH_REPORT_INTERVAL_MS", default_value_t = 500)]
    pub report_interval_ms: u64,

    #[arg(long, env = "HOSTWATCH_SAMPLE_INTERVAL_MS", default_value_t = 200)]
    pub sample_interval_ms: u64,

    #[arg(long, env = "HOSTWATCH_RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,
}

impl AgentArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.id.trim().is_empty(), "--id must be non-empty");
        anyhow::ensure!(
            self.report_interval_ms > 0,
            "--report-interval-ms must be > 0, got {}",
            self.report_interval_ms
        );
        anyhow::ensure!(
            self.sample_interval_ms > 0,
            "--sample-interval-ms must be > 0, got {}",
            self.sample_interval_ms
        );
        anyhow::ensure!(
            self.retry_delay_secs > 0,
            "--retry-delay-secs must be > 0, got {}",
            self.retry_delay_secs
        );
        if self.sample_interval_ms >= self.report_interval_ms {
            tracing::warn!(
                sample_interval_ms = self.sample_interval_ms,
                report_interval_ms = self.report_interval_ms,
                "sampling is not faster than reporting; rates may lag"
            );
        }
        Ok(())
    }

    pub fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig {
            report_interval: std::time::Duration::from_millis(self.report_interval_ms),
            sample_interval: std::time::Duration::from_millis(self.sample_interval_ms),
            retry_delay: std::time::Duration::from_secs(self.retry_delay_secs),
        }
    }
}
