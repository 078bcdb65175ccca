// Wire snapshot pushed by agents, one JSON object per WebSocket message

use serde::{Deserialize, Serialize};

/// One reporting tick from an agent. Percentages are 0-100, speeds are KB/s.
///
/// Missing fields default to 0 so older agents that only send
/// cpu/memory/diskUsage/upload/download still parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricSnapshot {
    pub cpu: f64,
    pub memory: f64,
    pub disk_usage: f64,
    pub disk_read_speed: f64,
    pub disk_write_speed: f64,
    pub upload_speed: f64,
    pub download_speed: f64,
}

impl MetricSnapshot {
    /// Clamp values into their display ranges. Non-finite values become 0.
    pub fn sanitized(self) -> Self {
        Self {
            cpu: percent(self.cpu),
            memory: percent(self.memory),
            disk_usage: percent(self.disk_usage),
            disk_read_speed: rate(self.disk_read_speed),
            disk_write_speed: rate(self.disk_write_speed),
            upload_speed: rate(self.upload_speed),
            download_speed: rate(self.download_speed),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

fn percent(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 }
}

fn rate(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// Point-in-time gauges sampled fresh on each reporting tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gauges {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_usage_percent: f64,
}
