// Cumulative byte counters -> instantaneous KB/s rates

use std::collections::HashMap;
use std::time::Instant;

/// Cumulative (inbound, outbound) byte counters per source, captured at one instant.
///
/// Sources are network interfaces (received, transmitted) or disks (read, written).
#[derive(Debug, Clone)]
pub struct CounterSnapshot {
    pub counters: HashMap<String, (u64, u64)>,
    pub captured_at: Instant,
}

impl CounterSnapshot {
    pub fn new(counters: HashMap<String, (u64, u64)>, captured_at: Instant) -> Self {
        Self {
            counters,
            captured_at,
        }
    }
}

/// Rates derived from two consecutive snapshots of the same family, in KB/s. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub inbound_kbs: f64,
    pub outbound_kbs: f64,
}

/// Counter direction, used only to label reset logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Derive rates from `previous` to `current`.
///
/// Returns `None` when no time has elapsed. Totals are summed over the sources
/// present in both snapshots; a source that appeared or vanished between ticks
/// is left out for that tick. A total that went backwards is a counter reset:
/// the current total is taken as having accrued entirely since the reset.
pub fn sample(family: &str, previous: &CounterSnapshot, current: &CounterSnapshot) -> Option<RateSample> {
    let elapsed = current
        .captured_at
        .checked_duration_since(previous.captured_at)?
        .as_secs_f64();
    if elapsed <= 0.0 {
        return None;
    }

    let (mut prev_in, mut prev_out, mut cur_in, mut cur_out) = (0u64, 0u64, 0u64, 0u64);
    for (name, &(cin, cout)) in &current.counters {
        if let Some(&(pin, pout)) = previous.counters.get(name) {
            prev_in = prev_in.saturating_add(pin);
            prev_out = prev_out.saturating_add(pout);
            cur_in = cur_in.saturating_add(cin);
            cur_out = cur_out.saturating_add(cout);
        }
    }

    Some(RateSample {
        inbound_kbs: direction_rate(family, Direction::Inbound, prev_in, cur_in, elapsed),
        outbound_kbs: direction_rate(family, Direction::Outbound, prev_out, cur_out, elapsed),
    })
}

fn direction_rate(family: &str, direction: Direction, previous: u64, current: u64, elapsed: f64) -> f64 {
    if current >= previous {
        (current - previous) as f64 / elapsed / 1024.0
    } else {
        tracing::info!(
            family,
            direction = direction.as_str(),
            previous,
            current,
            "counter reset detected"
        );
        current as f64 / elapsed / 1024.0
    }
}

/// Holds the retained baseline for one counter family across sampling ticks.
#[derive(Debug)]
pub struct RateSampler {
    family: &'static str,
    previous: Option<CounterSnapshot>,
}

impl RateSampler {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            previous: None,
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Feed the next snapshot. The baseline is replaced unconditionally, even
    /// when the tick produced no sample.
    pub fn observe(&mut self, current: CounterSnapshot) -> Option<RateSample> {
        let rate = self
            .previous
            .as_ref()
            .and_then(|previous| sample(self.family, previous, &current));
        self.previous = Some(current);
        rate
    }

    /// Forget the baseline so the next observation only primes it.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}
