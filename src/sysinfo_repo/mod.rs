// OS metrics via sysinfo: CPU/memory/disk-space gauges and cumulative byte counters

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use sysinfo::{Disks, Networks, System};
use tracing::instrument;

use crate::agent::probe::SystemProbe;
use crate::agent::rate::CounterSnapshot;
use crate::models::Gauges;

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    last_cpu_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
            networks: Arc::new(Mutex::new(networks)),
            last_cpu_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Global CPU usage. sysinfo needs a minimum gap between refreshes; inside
    /// that gap the previous reading is returned without blocking.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "cpu_percent"))]
    pub fn cpu_percent(&self) -> anyhow::Result<f64> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        let mut last = self
            .last_cpu_refresh
            .lock()
            .map_err(|e| anyhow::anyhow!("cpu cache lock poisoned: {}", e))?;

        let now = Instant::now();
        let usage = match *last {
            Some((prev_ts, prev_usage))
                if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
            {
                prev_usage
            }
            _ => {
                sys.refresh_cpu_usage();
                let usage = sys.global_cpu_usage() as f64;
                *last = Some((now, usage));
                usage
            }
        };
        Ok(usage.clamp(0.0, 100.0))
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "memory_percent"))]
    pub fn memory_percent(&self) -> anyhow::Result<f64> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        sys.refresh_memory();
        let total = sys.total_memory();
        anyhow::ensure!(total > 0, "total memory reported as 0");
        let used = total.saturating_sub(sys.available_memory());
        Ok(usage_percent(used, total))
    }

    /// Used share of all physical filesystems combined.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_usage_percent"))]
    pub fn disk_usage_percent(&self) -> anyhow::Result<f64> {
        let mut disks = self
            .disks
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
        disks.refresh(true);
        let (used, total) = disks
            .list()
            .iter()
            .filter(|d| is_physical_filesystem(&d.file_system().to_string_lossy()))
            .fold((0u64, 0u64), |(used, total), d| {
                let t = d.total_space();
                (
                    used.saturating_add(t.saturating_sub(d.available_space())),
                    total.saturating_add(t),
                )
            });
        Ok(usage_percent(used, total))
    }
}

impl SystemProbe for SysinfoRepo {
    fn gauges(&self) -> anyhow::Result<Gauges> {
        Ok(Gauges {
            cpu_percent: self.cpu_percent()?,
            memory_percent: self.memory_percent()?,
            disk_usage_percent: self.disk_usage_percent()?,
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "network_counters"))]
    fn network_counters(&self) -> anyhow::Result<CounterSnapshot> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
        networks.refresh(true);
        let counters = networks
            .list()
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    (data.total_received(), data.total_transmitted()),
                )
            })
            .collect();
        Ok(CounterSnapshot::new(counters, Instant::now()))
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_counters"))]
    fn disk_counters(&self) -> anyhow::Result<CounterSnapshot> {
        let mut disks = self
            .disks
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
        disks.refresh(true);
        // several mounts can sit on one device; key by device so it is counted once
        let mut counters: HashMap<String, (u64, u64)> = HashMap::new();
        for d in disks.list() {
            let usage = d.usage();
            counters.insert(
                d.name().to_string_lossy().into_owned(),
                (usage.total_read_bytes, usage.total_written_bytes),
            );
        }
        Ok(CounterSnapshot::new(counters, Instant::now()))
    }
}

fn usage_percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Filesystems that count toward disk-space usage. Pseudo and overlay mounts are skipped.
pub fn is_physical_filesystem(fs: &str) -> bool {
    #[cfg(windows)]
    {
        fs.eq_ignore_ascii_case("ntfs")
    }
    #[cfg(not(windows))]
    {
        matches!(fs, "ext4" | "xfs" | "btrfs")
    }
}
