// OS metrics seam used by the samplers and the reporter

use super::rate::CounterSnapshot;
use crate::models::Gauges;

/// Source of instantaneous gauges and cumulative byte counters.
///
/// Calls may block briefly (they refresh OS tables); callers run them on the
/// blocking pool.
pub trait SystemProbe: Send + Sync + 'static {
    /// CPU percent, virtual-memory percent and aggregate disk-space percent.
    fn gauges(&self) -> anyhow::Result<Gauges>;

    /// Cumulative (received, transmitted) bytes per network interface.
    fn network_counters(&self) -> anyhow::Result<CounterSnapshot>;

    /// Cumulative (read, written) bytes per disk.
    fn disk_counters(&self) -> anyhow::Result<CounterSnapshot>;
}
