// Fixed-capacity FIFO of recent rate samples

use std::collections::VecDeque;

/// Samples kept per rate channel.
pub const RATE_HISTORY_CAPACITY: usize = 3;

/// Most recent samples, oldest first. Pushing past capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct RateHistory {
    samples: VecDeque<f64>,
    cap: usize,
}

impl Default for RateHistory {
    fn default() -> Self {
        Self::with_capacity(RATE_HISTORY_CAPACITY)
    }
}

impl RateHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, v: f64) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(v);
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_push_evicts_oldest_in_order() {
        let mut h = RateHistory::default();
        for v in [1.0, 2.0, 3.0, 4.0] {
            h.push(v);
        }
        assert_eq!(h.len(), RATE_HISTORY_CAPACITY);
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(h.latest(), Some(4.0));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut h = RateHistory::default();
        for i in 0..50 {
            h.push(i as f64);
            assert!(h.len() <= h.capacity());
        }
    }

    #[test]
    fn empty_history_has_no_mean() {
        assert_eq!(RateHistory::default().mean(), None);
    }
}
