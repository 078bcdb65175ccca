// Display smoothing: lean 70% on the newest sample, 30% on the window mean

use super::history::RateHistory;

const LATEST_WEIGHT: f64 = 0.7;
const MEAN_WEIGHT: f64 = 0.3;

/// Smooths one rate channel over the last few samples.
///
/// With two or more samples the value is `0.7 * latest + 0.3 * mean(window)`;
/// with one sample it is that sample; with none it is 0.
#[derive(Debug, Clone, Default)]
pub struct RateSmoother {
    history: RateHistory,
}

impl RateSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: f64) {
        self.history.push(sample);
    }

    pub fn value(&self) -> f64 {
        match (self.history.latest(), self.history.mean()) {
            (Some(latest), Some(mean)) if self.history.len() >= 2 => {
                latest * LATEST_WEIGHT + mean * MEAN_WEIGHT
            }
            (Some(latest), _) => latest,
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &RateHistory {
        &self.history
    }
}
