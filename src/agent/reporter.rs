// Reporting loop and reconnect state machine:
// Connecting -> Connected -> (send failure) -> Reconnecting -> Connecting ...

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use url::Url;

use super::channels::RateChannels;
use super::endpoint::Endpoint;
use super::probe::SystemProbe;
use super::sampling::{CounterFamily, spawn_sampler};
use super::transport::{Connector, Transport};
use crate::models::MetricSnapshot;

/// Reporter timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterConfig {
    pub report_interval: Duration,
    pub sample_interval: Duration,
    /// Fixed delay between reconnect attempts. Attempts are unlimited.
    pub retry_delay: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_millis(500),
            sample_interval: Duration::from_millis(200),
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    Connecting,
    Connected,
    Reconnecting,
}

pub struct Reporter<C: Connector, P: SystemProbe> {
    connector: C,
    probe: Arc<P>,
    url: Url,
    config: ReporterConfig,
    rates: RateChannels,
    samplers: Vec<JoinHandle<()>>,
    state: ReporterState,
}

impl<C: Connector, P: SystemProbe> Reporter<C, P> {
    pub fn new(
        connector: C,
        probe: Arc<P>,
        endpoint: &Endpoint,
        client_id: &str,
        config: ReporterConfig,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!client_id.is_empty(), "client id must be non-empty");
        Ok(Self {
            connector,
            probe,
            url: endpoint.handshake_url(client_id)?,
            config,
            rates: RateChannels::new(),
            samplers: Vec::new(),
            state: ReporterState::Connecting,
        })
    }

    /// Use an externally held rate handle instead of a private one.
    pub fn with_rates(mut self, rates: RateChannels) -> Self {
        self.rates = rates;
        self
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    pub fn rates(&self) -> &RateChannels {
        &self.rates
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Runs the state machine forever. Failures only ever lead back to `Connecting`.
    pub async fn run(mut self) {
        tracing::info!(url = %self.url, "reporter starting");
        loop {
            match self.connect().await {
                Ok(mut conn) => {
                    let err = self.report(&mut conn).await;
                    tracing::warn!(
                        error = %err,
                        retry_in_secs = self.config.retry_delay.as_secs_f64(),
                        "send failed; reconnecting"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        url = %self.url,
                        retry_in_secs = self.config.retry_delay.as_secs_f64(),
                        "connect failed"
                    );
                }
            }
            tokio::time::sleep(self.config.retry_delay).await;
            self.state = ReporterState::Connecting;
        }
    }

    /// Attempt the handshake. On success the rate histories and counter
    /// baselines are discarded and fresh sampling tasks are started, so no
    /// reported rate spans the disconnect.
    pub async fn connect(&mut self) -> anyhow::Result<C::Conn> {
        self.state = ReporterState::Connecting;
        match self.connector.connect(&self.url).await {
            Ok(conn) => {
                self.restart_samplers().await;
                self.state = ReporterState::Connected;
                tracing::info!(url = %self.url, "connected to collector");
                Ok(conn)
            }
            Err(e) => {
                self.state = ReporterState::Reconnecting;
                Err(e)
            }
        }
    }

    /// Push one snapshot per tick until a send fails; returns that failure.
    /// The failed snapshot is not retried.
    pub async fn report(&mut self, conn: &mut C::Conn) -> anyhow::Error {
        let mut tick = interval(self.config.report_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let snapshot = match self.collect().await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, operation = "collect_metrics", "metrics collection failed; skipping tick");
                    continue;
                }
            };
            if let Err(e) = conn.send(&snapshot).await {
                self.state = ReporterState::Reconnecting;
                return e;
            }
        }
    }

    /// Fresh gauges plus the current smoothed rates.
    pub async fn collect(&self) -> anyhow::Result<MetricSnapshot> {
        let probe = self.probe.clone();
        let gauges = tokio::task::spawn_blocking(move || probe.gauges())
            .await
            .map_err(|e| anyhow::anyhow!("gauge task join: {}", e))??;
        let rates = self.rates.values();
        Ok(MetricSnapshot {
            cpu: gauges.cpu_percent,
            memory: gauges.memory_percent,
            disk_usage: gauges.disk_usage_percent,
            disk_read_speed: rates.disk_read_kbs,
            disk_write_speed: rates.disk_write_kbs,
            upload_speed: rates.upload_kbs,
            download_speed: rates.download_kbs,
        })
    }

    async fn restart_samplers(&mut self) {
        self.stop_samplers().await;
        // samplers are stopped: nothing else writes the channels here
        self.rates.reset();
        for family in [CounterFamily::Network, CounterFamily::Disk] {
            self.samplers.push(spawn_sampler(
                family,
                self.probe.clone(),
                self.rates.clone(),
                self.config.sample_interval,
            ));
        }
    }

    async fn stop_samplers(&mut self) {
        for handle in self.samplers.drain(..) {
            handle.abort();
            // wait until the task is gone so it cannot push after the reset
            let _ = handle.await;
        }
    }
}

impl<C: Connector, P: SystemProbe> Drop for Reporter<C, P> {
    fn drop(&mut self) {
        for handle in &self.samplers {
            handle.abort();
        }
    }
}
