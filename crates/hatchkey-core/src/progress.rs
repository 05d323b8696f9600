//! Periodic per-worker status lines.
//!
//! Workers call [`ProgressReporter::tick`] after every attempt; every
//! `interval` attempts a [`ProgressEvent`] goes to the configured
//! [`ProgressSink`]. Sinks are shared by all workers and must return quickly.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// One status sample from a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Reporting worker
    pub worker_id: usize,
    /// Attempts made so far by that worker
    pub attempts: u64,
    /// Time since the worker started
    pub elapsed: Duration,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[worker {}] attempts={} elapsed={:.1}s",
            self.worker_id,
            self.attempts,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Destination for progress events
pub trait ProgressSink: Sync {
    /// Handle one event
    fn report(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Emits events as `info` log records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: &ProgressEvent) {
        info!("{}", event);
    }
}

/// Per-worker throttle in front of a [`ProgressSink`]
pub struct ProgressReporter<'a> {
    worker_id: usize,
    interval: u64,
    started: Instant,
    sink: &'a dyn ProgressSink,
}

impl<'a> ProgressReporter<'a> {
    /// Reports every `interval` attempts; 0 disables reporting
    pub fn new(worker_id: usize, interval: u64, sink: &'a dyn ProgressSink) -> Self {
        Self {
            worker_id,
            interval,
            started: Instant::now(),
            sink,
        }
    }

    /// Time since this reporter was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Called with the running attempt count after each attempt
    #[inline]
    pub fn tick(&self, attempts: u64) {
        if self.interval != 0 && attempts % self.interval == 0 {
            self.emit(attempts);
        }
    }

    /// Sends an event regardless of the interval
    pub fn emit(&self, attempts: u64) {
        self.sink.report(&ProgressEvent {
            worker_id: self.worker_id,
            attempts,
            elapsed: self.elapsed(),
        });
    }
}
