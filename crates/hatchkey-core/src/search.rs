//! Search orchestration.
//!
//! [`Search`] validates a [`SearchConfig`], splits the keyspace into one
//! partition per worker, runs every worker on its own scoped OS thread
//! against a single [`SharedOutcome`], and folds the worker reports into a
//! [`SearchReport`].
//!
//! ```no_run
//! use hatchkey_core::{crack_zip, SearchConfig, TracingProgress};
//!
//! let config = SearchConfig::new().length(4).workers(4);
//! let report = crack_zip("emergency_storage_key.zip", &config, &TracingProgress)?;
//! if let Some(password) = report.password() {
//!     println!("{password}");
//! }
//! # Ok::<(), hatchkey_core::Error>(())
//! ```

use crate::archive::{ProbeSource, ZipArchive};
use crate::error::{Error, Result};
use crate::keyspace::{partition, Alphabet, Keyspace, Partition};
use crate::outcome::{SharedOutcome, Winner};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::worker::{Worker, WorkerExit, WorkerReport};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default password length
pub const DEFAULT_LENGTH: usize = 6;
/// Default worker count
pub const DEFAULT_WORKERS: usize = 8;
/// Default attempts between progress lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50_000;

/// Parameters of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Symbols candidates are drawn from
    pub alphabet: Alphabet,
    /// Fixed candidate length
    pub length: usize,
    /// Number of worker threads
    pub workers: usize,
    /// Attempts between progress events per worker (0 = never)
    pub progress_interval: u64,
    /// Wall-clock limit after which the search is cancelled
    pub timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::default(),
            length: DEFAULT_LENGTH,
            workers: DEFAULT_WORKERS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            timeout: None,
        }
    }
}

impl SearchConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the alphabet
    pub fn alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Sets the password length
    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Sets the worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the progress interval
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets the timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the keyspace described by this config
    pub fn keyspace(&self) -> Result<Keyspace> {
        Keyspace::new(self.alphabet.clone(), self.length)
    }
}

/// Terminal result of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// A candidate validated
    Found(Winner),
    /// Every candidate was tested; the password is not in the keyspace
    Exhausted,
    /// Some workers aborted on I/O errors, so the negative result is not
    /// trustworthy
    Incomplete {
        /// Workers whose partitions were left unfinished
        aborted_workers: Vec<usize>,
    },
    /// The timeout fired before the search completed
    Cancelled,
}

impl SearchStatus {
    /// Process exit code for this status: 0 found, 1 exhausted, 2 incomplete,
    /// 3 cancelled
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Found(_) => 0,
            Self::Exhausted => 1,
            Self::Incomplete { .. } => 2,
            Self::Cancelled => 3,
        }
    }
}

/// Aggregated result of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    /// Terminal status
    pub status: SearchStatus,
    /// Sum of all workers' attempts
    pub total_attempts: u64,
    /// Size of the searched keyspace
    pub keyspace_size: u64,
    /// Wall time of the whole search
    pub elapsed: Duration,
    /// One report per worker, ordered by worker id
    pub workers: Vec<WorkerReport>,
}

impl SearchReport {
    /// The recovered password, if any
    pub fn password(&self) -> Option<&str> {
        match &self.status {
            SearchStatus::Found(winner) => Some(&winner.candidate),
            _ => None,
        }
    }
}

/// A validated, ready-to-run search over one probe source
pub struct Search<'s, S> {
    source: &'s S,
    config: SearchConfig,
    keyspace: Keyspace,
    partitions: Vec<Partition>,
}

impl<'s, S: ProbeSource> Search<'s, S> {
    /// Validates `config` and computes the partitions.
    pub fn new(source: &'s S, config: SearchConfig) -> Result<Self> {
        let keyspace = config.keyspace()?;
        let partitions = partition(&keyspace, config.workers)?;

        Ok(Self {
            source,
            config,
            keyspace,
            partitions,
        })
    }

    /// The keyspace being searched
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// One partition per worker
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Runs all workers to completion.
    pub fn run(&self, sink: &dyn ProgressSink) -> Result<SearchReport> {
        let started = Instant::now();
        let outcome = SharedOutcome::new();
        let deadline = self.config.timeout.map(|t| started + t);

        info!(
            "Searching {} candidates ({} symbols, length {}) with {} workers",
            self.keyspace.size(),
            self.keyspace.alphabet().len(),
            self.keyspace.length(),
            self.partitions.len()
        );

        let mut workers = thread::scope(|scope| -> Result<Vec<WorkerReport>> {
            let (tx, rx) = mpsc::channel::<WorkerReport>();
            let mut handles = Vec::with_capacity(self.partitions.len());

            for part in &self.partitions {
                let tx = tx.clone();
                let outcome = &outcome;
                let keyspace = &self.keyspace;
                let source = self.source;
                let interval = self.config.progress_interval;

                let spawned = thread::Builder::new()
                    .name(format!("hatchkey-worker-{}", part.worker_id))
                    .spawn_scoped(scope, move || {
                        let progress = ProgressReporter::new(part.worker_id, interval, sink);
                        let report = Worker::new(part, keyspace, outcome, progress).run(source);
                        let _ = tx.send(report.clone());
                        report
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        outcome.cancel();
                        let _ = join_all(handles);
                        return Err(Error::ThreadSpawn(e));
                    }
                }
            }
            drop(tx);

            wait_for_workers(&rx, handles.len(), &outcome, deadline);

            join_all(handles).into_iter().collect()
        })?;
        workers.sort_by_key(|r| r.worker_id);

        let total_attempts = workers.iter().map(|r| r.attempts).sum();
        let aborted_workers: Vec<usize> = workers
            .iter()
            .filter(|r| r.lost_coverage())
            .map(|r| r.worker_id)
            .collect();

        let status = match outcome.into_result() {
            Some(winner) => SearchStatus::Found(winner),
            None if !aborted_workers.is_empty() => SearchStatus::Incomplete { aborted_workers },
            None if workers.iter().any(|r| r.exit != WorkerExit::Exhausted) => {
                SearchStatus::Cancelled
            }
            None => SearchStatus::Exhausted,
        };

        let report = SearchReport {
            status,
            total_attempts,
            keyspace_size: self.keyspace.size(),
            elapsed: started.elapsed(),
            workers,
        };

        match &report.status {
            SearchStatus::Found(winner) => info!(
                "Worker {} recovered the password after {} total attempts in {:.2}s",
                winner.worker_id,
                report.total_attempts,
                report.elapsed.as_secs_f64()
            ),
            SearchStatus::Exhausted => {
                debug_assert_eq!(report.total_attempts, report.keyspace_size);
                info!(
                    "Keyspace exhausted after {} attempts in {:.2}s",
                    report.total_attempts,
                    report.elapsed.as_secs_f64()
                );
            }
            SearchStatus::Incomplete { aborted_workers } => warn!(
                "Search incomplete: workers {:?} aborted on I/O errors",
                aborted_workers
            ),
            SearchStatus::Cancelled => warn!(
                "Search cancelled after {} of {} candidates",
                report.total_attempts, report.keyspace_size
            ),
        }

        Ok(report)
    }
}

/// Blocks until `expected` workers have reported or every sender is gone,
/// cancelling the search once `deadline` passes.
fn wait_for_workers(
    rx: &Receiver<WorkerReport>,
    expected: usize,
    outcome: &SharedOutcome,
    deadline: Option<Instant>,
) {
    let mut remaining = expected;

    while remaining > 0 {
        let received = match deadline {
            Some(deadline) if !outcome.is_done() => {
                let now = Instant::now();
                if now >= deadline {
                    info!("Timeout reached, cancelling search");
                    outcome.cancel();
                    continue;
                }
                match rx.recv_timeout(deadline - now) {
                    Ok(report) => report,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            _ => match rx.recv() {
                Ok(report) => report,
                Err(_) => break,
            },
        };

        remaining -= 1;
        debug!(
            "Worker {} done ({:?}, {} attempts), {} still running",
            received.worker_id, received.exit, received.attempts, remaining
        );
    }
}

/// Joins every worker, so no panicked thread is left for the scope to
/// re-raise. Results are in spawn order.
fn join_all(
    handles: Vec<thread::ScopedJoinHandle<'_, WorkerReport>>,
) -> Vec<Result<WorkerReport>> {
    handles
        .into_iter()
        .enumerate()
        .map(|(id, handle)| handle.join().map_err(|_| Error::WorkerPanicked(id)))
        .collect()
}

/// Opens the zip at `path` and searches it with `config`.
///
/// Archive and configuration problems are returned before any worker starts.
pub fn crack_zip(
    path: impl AsRef<Path>,
    config: &SearchConfig,
    sink: &dyn ProgressSink,
) -> Result<SearchReport> {
    let archive = ZipArchive::open(path)?;
    Search::new(&archive, config.clone())?.run(sink)
}
