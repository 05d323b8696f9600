//! Cross-worker result slot.
//!
//! One [`SharedOutcome`] exists per search. Workers poll [`is_done`] before
//! every probe and race through [`try_set_result`] when a candidate
//! validates; the compare-and-set on the claim flag guarantees a single
//! winner even when several workers succeed at once.
//!
//! [`is_done`]: SharedOutcome::is_done
//! [`try_set_result`]: SharedOutcome::try_set_result

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// The recorded successful candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    /// Recovered password
    pub candidate: String,
    /// Worker that found it
    pub worker_id: usize,
    /// Attempts that worker had made, the winning one included
    pub attempts: u64,
    /// Time from the worker's start to the win
    pub elapsed: Duration,
}

/// First-writer-wins result slot plus cancellation flag
#[derive(Debug, Default)]
pub struct SharedOutcome {
    claimed: AtomicBool,
    done: AtomicBool,
    cancelled: AtomicBool,
    winner: OnceLock<Winner>,
}

impl SharedOutcome {
    /// Creates an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a result is recorded or the search was cancelled
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Records `candidate` if no result exists yet.
    ///
    /// Returns true only for the first caller. Losers must discard their
    /// result.
    pub fn try_set_result(
        &self,
        candidate: &[u8],
        worker_id: usize,
        attempts: u64,
        elapsed: Duration,
    ) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // Only the claim holder reaches this point, so the cell is empty.
        let _ = self.winner.set(Winner {
            candidate: String::from_utf8_lossy(candidate).into_owned(),
            worker_id,
            attempts,
            elapsed,
        });
        self.done.store(true, Ordering::Release);
        true
    }

    /// Stops all workers without recording a result
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.done.store(true, Ordering::Release);
    }

    /// True if [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The winning candidate, if any
    pub fn result(&self) -> Option<&Winner> {
        self.winner.get()
    }

    /// Consumes the slot, returning the winner
    pub fn into_result(self) -> Option<Winner> {
        self.winner.into_inner()
    }
}
