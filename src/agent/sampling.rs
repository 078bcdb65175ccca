// Background rate sampling tasks, one per counter family

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};

use super::channels::RateChannels;
use super::probe::SystemProbe;
use super::rate::{CounterSnapshot, RateSample, RateSampler};

/// Repeated sampling failures are logged at most this often.
const FAILURE_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Counter family sampled by one background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFamily {
    Network,
    Disk,
}

impl CounterFamily {
    pub fn name(self) -> &'static str {
        match self {
            CounterFamily::Network => "network",
            CounterFamily::Disk => "disk",
        }
    }

    fn read<P: SystemProbe>(self, probe: &P) -> anyhow::Result<CounterSnapshot> {
        match self {
            CounterFamily::Network => probe.network_counters(),
            CounterFamily::Disk => probe.disk_counters(),
        }
    }

    fn publish(self, rates: &RateChannels, rate: RateSample) {
        match self {
            CounterFamily::Network => rates.push_network(rate),
            CounterFamily::Disk => rates.push_disk(rate),
        }
    }
}

/// Spawn the sampling loop for `family`. The task starts with no baseline, so
/// its first tick only primes the sampler. It writes only to its own channels.
pub fn spawn_sampler<P: SystemProbe>(
    family: CounterFamily,
    probe: Arc<P>,
    rates: RateChannels,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = RateSampler::new(family.name());
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_failure_warn: Option<Instant> = None;

        loop {
            tick.tick().await;
            let probe = probe.clone();
            let read = tokio::task::spawn_blocking(move || family.read(probe.as_ref()))
                .await
                .map_err(|e| anyhow::anyhow!("sampler task join: {}", e))
                .and_then(|r| r);

            let snapshot = match read {
                Ok(snapshot) => {
                    if last_failure_warn.take().is_some() {
                        tracing::info!(family = family.name(), "counter sampling recovered");
                    }
                    snapshot
                }
                Err(e) => {
                    let should_warn = last_failure_warn
                        .is_none_or(|t| t.elapsed() >= FAILURE_WARN_INTERVAL);
                    if should_warn {
                        tracing::warn!(
                            error = %e,
                            family = family.name(),
                            operation = "read_counters",
                            "counter sampling failed; skipping tick"
                        );
                        last_failure_warn = Some(Instant::now());
                    }
                    continue;
                }
            };

            if let Some(rate) = sampler.observe(snapshot) {
                family.publish(&rates, rate);
            }
        }
    })
}
