//! The per-thread search loop.
//!
//! A worker owns one [`Partition`] and one [`ArchiveProbe`]. It walks its
//! candidates in order, checking the [`SharedOutcome`] before each probe, and
//! ends in exactly one of three states:
//!
//! - `Found`: a candidate validated (whether or not it won the race)
//! - `Exhausted`: every candidate in the partition was tested
//! - `Aborted`: another worker finished first, the search was cancelled, or
//!   the archive could not be read

use crate::archive::{ArchiveProbe, ProbeOutcome, ProbeSource};
use crate::keyspace::{Keyspace, Partition};
use crate::outcome::SharedOutcome;
use crate::progress::ProgressReporter;
use std::time::Duration;
use tracing::{debug, warn};

/// Why a worker stopped before finishing its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    /// The shared outcome was already done
    Stopped,
    /// The worker's archive handle failed
    Io,
}

/// Terminal state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A candidate validated
    Found,
    /// The partition was fully searched without success
    Exhausted,
    /// The worker stopped early
    Aborted(AbortCause),
}

/// What a worker hands back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker id, equal to its partition index
    pub worker_id: usize,
    /// Terminal state
    pub exit: WorkerExit,
    /// Candidates probed
    pub attempts: u64,
    /// Wall time spent
    pub elapsed: Duration,
}

impl WorkerReport {
    /// True if this worker left part of its partition untested because of an
    /// I/O failure
    pub fn lost_coverage(&self) -> bool {
        self.exit == WorkerExit::Aborted(AbortCause::Io)
    }
}

/// Search loop over one partition
pub struct Worker<'a> {
    partition: &'a Partition,
    keyspace: &'a Keyspace,
    outcome: &'a SharedOutcome,
    progress: ProgressReporter<'a>,
}

impl<'a> Worker<'a> {
    /// Binds a worker to its partition and the shared outcome
    pub fn new(
        partition: &'a Partition,
        keyspace: &'a Keyspace,
        outcome: &'a SharedOutcome,
        progress: ProgressReporter<'a>,
    ) -> Self {
        Self {
            partition,
            keyspace,
            outcome,
            progress,
        }
    }

    /// Opens this worker's own probe from `source` and searches.
    pub fn run<S: ProbeSource>(self, source: &S) -> WorkerReport {
        match source.open_probe() {
            Ok(mut probe) => self.search(&mut probe),
            Err(e) => {
                warn!(
                    "Worker {} could not open the archive: {}",
                    self.partition.worker_id, e
                );
                self.report(WorkerExit::Aborted(AbortCause::Io), 0)
            }
        }
    }

    /// Searches the partition with an already opened probe.
    pub fn search<P: ArchiveProbe + ?Sized>(self, probe: &mut P) -> WorkerReport {
        let worker_id = self.partition.worker_id;
        debug!(
            "Worker {} searching {} candidates starting with {:?}",
            worker_id,
            self.partition.candidate_count(self.keyspace),
            String::from_utf8_lossy(self.partition.symbols(self.keyspace))
        );

        let mut candidates = self.partition.candidates(self.keyspace);
        let mut attempts = 0u64;

        let exit = loop {
            let Some(candidate) = candidates.next_candidate() else {
                break WorkerExit::Exhausted;
            };
            if self.outcome.is_done() {
                break WorkerExit::Aborted(AbortCause::Stopped);
            }

            attempts += 1;
            match probe.test(candidate) {
                ProbeOutcome::Valid => {
                    let won = self.outcome.try_set_result(
                        candidate,
                        worker_id,
                        attempts,
                        self.progress.elapsed(),
                    );
                    if !won {
                        debug!("Worker {} found a password after another worker", worker_id);
                    }
                    break WorkerExit::Found;
                }
                ProbeOutcome::WrongPassword | ProbeOutcome::CorruptArchive => {
                    self.progress.tick(attempts);
                }
                ProbeOutcome::IoError(e) => {
                    warn!(
                        "Worker {} aborting after {} attempts: {}",
                        worker_id, attempts, e
                    );
                    break WorkerExit::Aborted(AbortCause::Io);
                }
            }
        };

        debug!("Worker {} finished: {:?} after {} attempts", worker_id, exit, attempts);
        self.report(exit, attempts)
    }

    fn report(&self, exit: WorkerExit, attempts: u64) -> WorkerReport {
        WorkerReport {
            worker_id: self.partition.worker_id,
            exit,
            attempts,
            elapsed: self.progress.elapsed(),
        }
    }
}
