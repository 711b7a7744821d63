use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Downloading,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub phase: Phase,
    pub percent: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Human readable, e.g. "512 KB/s".
    pub speed: String,
    /// Human readable, e.g. "42s".
    pub eta: String,
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            percent: 0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed: "0 KB/s".to_string(),
            eta: "0s".to_string(),
        }
    }
}

/// Single-writer progress holder. Readers always get the latest value
/// without waiting on the writer.
pub struct ProgressTracker {
    tx: watch::Sender<DownloadProgress>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(DownloadProgress::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> DownloadProgress {
        self.tx.borrow().clone()
    }

    pub fn reset(&self) {
        self.tx.send_replace(DownloadProgress::default());
    }

    /// Resets the counters and enters the downloading phase.
    pub fn start(&self) {
        self.tx.send_replace(DownloadProgress {
            phase: Phase::Downloading,
            ..DownloadProgress::default()
        });
    }

    /// Applies a byte-level update. Zero or unknown speed/eta keep the
    /// previous display value.
    pub fn update(&self, downloaded: u64, total: Option<u64>, speed: Option<f64>, eta: Option<u64>) {
        self.tx.send_modify(|p| {
            p.phase = Phase::Downloading;
            p.downloaded_bytes = downloaded;
            if let Some(total) = total.filter(|t| *t > 0) {
                p.total_bytes = total;
            }
            if p.total_bytes > 0 {
                p.percent = ((downloaded.min(p.total_bytes) * 100) / p.total_bytes) as u8;
            }
            if let Some(speed) = speed.filter(|s| *s > 0.0) {
                p.speed = format!("{:.0} KB/s", speed / 1024.0);
            }
            if let Some(eta) = eta.filter(|e| *e > 0) {
                p.eta = format!("{}s", eta);
            }
        });
    }

    /// The download part is over and post-processing (conversion, thumbnail)
    /// has started.
    pub fn finish_download(&self) {
        self.tx.send_modify(|p| {
            p.phase = Phase::Processing;
            p.percent = 100;
        });
    }

    pub fn set_phase(&self, phase: Phase) {
        self.tx.send_modify(|p| p.phase = phase);
    }
}
