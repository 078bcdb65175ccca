// Per-channel smoothed rate state shared between the samplers and the reporter

use std::sync::{Arc, Mutex, MutexGuard};

use super::rate::RateSample;
use super::smoother::RateSmoother;

/// One of the four independently smoothed rate channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChannel {
    Upload,
    Download,
    DiskRead,
    DiskWrite,
}

impl RateChannel {
    pub const ALL: [RateChannel; 4] = [
        RateChannel::Upload,
        RateChannel::Download,
        RateChannel::DiskRead,
        RateChannel::DiskWrite,
    ];
}

/// Smoothed values read out by the reporter on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateValues {
    pub upload_kbs: f64,
    pub download_kbs: f64,
    pub disk_read_kbs: f64,
    pub disk_write_kbs: f64,
}

/// Shared handle to the four channel smoothers.
///
/// Writers: the network sampler owns upload/download, the disk sampler owns
/// disk-read/disk-write. The reporter only reads, except for `reset`, which it
/// calls after the samplers have been stopped.
#[derive(Debug, Clone, Default)]
pub struct RateChannels {
    upload: Arc<Mutex<RateSmoother>>,
    download: Arc<Mutex<RateSmoother>>,
    disk_read: Arc<Mutex<RateSmoother>>,
    disk_write: Arc<Mutex<RateSmoother>>,
}

fn lock(m: &Mutex<RateSmoother>) -> MutexGuard<'_, RateSmoother> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RateChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, channel: RateChannel) -> &Mutex<RateSmoother> {
        match channel {
            RateChannel::Upload => &self.upload,
            RateChannel::Download => &self.download,
            RateChannel::DiskRead => &self.disk_read,
            RateChannel::DiskWrite => &self.disk_write,
        }
    }

    pub fn push(&self, channel: RateChannel, sample: f64) {
        lock(self.cell(channel)).push(sample);
    }

    /// Network sample: inbound is download, outbound is upload.
    pub fn push_network(&self, rate: RateSample) {
        self.push(RateChannel::Download, rate.inbound_kbs);
        self.push(RateChannel::Upload, rate.outbound_kbs);
    }

    /// Disk sample: inbound is read, outbound is write.
    pub fn push_disk(&self, rate: RateSample) {
        self.push(RateChannel::DiskRead, rate.inbound_kbs);
        self.push(RateChannel::DiskWrite, rate.outbound_kbs);
    }

    pub fn value(&self, channel: RateChannel) -> f64 {
        lock(self.cell(channel)).value()
    }

    pub fn values(&self) -> RateValues {
        RateValues {
            upload_kbs: self.value(RateChannel::Upload),
            download_kbs: self.value(RateChannel::Download),
            disk_read_kbs: self.value(RateChannel::DiskRead),
            disk_write_kbs: self.value(RateChannel::DiskWrite),
        }
    }

    pub fn history_len(&self, channel: RateChannel) -> usize {
        lock(self.cell(channel)).history().len()
    }

    pub fn is_empty(&self) -> bool {
        RateChannel::ALL
            .iter()
            .all(|c| lock(self.cell(*c)).history().is_empty())
    }

    /// Drop every channel's history.
    pub fn reset(&self) {
        for channel in RateChannel::ALL {
            lock(self.cell(channel)).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_disk_land_on_their_channels() {
        let rc = RateChannels::new();
        rc.push_network(RateSample {
            inbound_kbs: 8.0,
            outbound_kbs: 2.0,
        });
        rc.push_disk(RateSample {
            inbound_kbs: 3.0,
            outbound_kbs: 4.0,
        });
        let v = rc.values();
        assert_eq!(v.download_kbs, 8.0);
        assert_eq!(v.upload_kbs, 2.0);
        assert_eq!(v.disk_read_kbs, 3.0);
        assert_eq!(v.disk_write_kbs, 4.0);
    }

    #[test]
    fn clones_share_state_and_reset_clears_all() {
        let rc = RateChannels::new();
        let writer = rc.clone();
        for c in RateChannel::ALL {
            writer.push(c, 1.0);
        }
        assert!(!rc.is_empty());
        rc.reset();
        assert!(writer.is_empty());
        assert_eq!(rc.values(), RateValues::default());
    }
}
