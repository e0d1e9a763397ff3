use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage metrics collector
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Number of data elements taken from upstream
    received: Arc<AtomicU64>,
    /// Number of data elements handed downstream
    emitted: Arc<AtomicU64>,
    /// Number of times a downstream deposit had to wait on a full buffer
    blocks: Arc<AtomicU64>,
    /// Start and end of the stage's run
    window: Arc<Mutex<(Option<Instant>, Option<Instant>)>>,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            blocks: Arc::new(AtomicU64::new(0)),
            window: Arc::new(Mutex::new((None, None))),
        }
    }

    /// Mark the stage as started
    pub fn record_start(&self) {
        self.window.lock().0 = Some(Instant::now());
    }

    /// Mark the stage as terminated
    pub fn record_finish(&self) {
        self.window.lock().1 = Some(Instant::now());
    }

    /// Record an element taken from upstream
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an element handed downstream
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the number of block events observed on the stage's output
    pub fn set_blocks(&self, blocks: u64) {
        self.blocks.store(blocks, Ordering::Relaxed);
    }

    /// Get the total number of elements received
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Get the total number of elements emitted
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Get the total number of block events
    pub fn total_blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Time between start and finish, or since start if still running
    pub fn elapsed(&self) -> Duration {
        match *self.window.lock() {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Calculate throughput in received elements per second
    pub fn throughput_eps(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_received() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received(),
            total_emitted: self.total_emitted(),
            total_blocks: self.total_blocks(),
            throughput_eps: self.throughput_eps(),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_emitted: u64,
    pub total_blocks: u64,
    pub throughput_eps: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Emitted: {}, Blocks: {}, Throughput: {:.2} elem/s, Elapsed: {:.3}s",
            self.total_received,
            self.total_emitted,
            self.total_blocks,
            self.throughput_eps,
            self.elapsed.as_secs_f64()
        )
    }
}
