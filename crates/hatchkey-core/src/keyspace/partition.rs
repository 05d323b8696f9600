//! Splitting a keyspace between workers.
//!
//! Work is divided along the first-symbol dimension only: each worker gets a
//! contiguous run of alphabet positions and owns every candidate starting with
//! one of them. Chunks are `|alphabet| / workers` wide and the remainder goes
//! to the last worker.

use super::{Candidates, Keyspace};
use crate::error::{Error, Result};
use std::ops::Range;

/// First-symbol slice owned by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Worker this slice is assigned to
    pub worker_id: usize,
    /// Alphabet positions of the first symbols in this slice
    pub first_symbols: Range<usize>,
}

impl Partition {
    /// Number of first symbols in the slice
    pub fn width(&self) -> usize {
        self.first_symbols.len()
    }

    /// The first symbols themselves
    pub fn symbols<'a>(&self, keyspace: &'a Keyspace) -> &'a [u8] {
        &keyspace.alphabet().symbols()[self.first_symbols.clone()]
    }

    /// Number of candidates owned by this partition
    pub fn candidate_count(&self, keyspace: &Keyspace) -> u64 {
        self.width() as u64 * keyspace.suffix_count()
    }

    /// Contiguous candidate-index range owned by this partition
    pub fn index_range(&self, keyspace: &Keyspace) -> Range<u64> {
        let per_first = keyspace.suffix_count();
        self.first_symbols.start as u64 * per_first..self.first_symbols.end as u64 * per_first
    }

    /// Fresh enumerator over this partition's candidates
    pub fn candidates<'a>(&self, keyspace: &'a Keyspace) -> Candidates<'a> {
        keyspace.candidates(self.first_symbols.clone())
    }
}

/// Divides `keyspace` between `workers` workers.
///
/// Fails when `workers` is zero or larger than the alphabet, since some
/// worker would then receive no first symbol at all.
pub fn partition(keyspace: &Keyspace, workers: usize) -> Result<Vec<Partition>> {
    let symbols = keyspace.alphabet().len();
    if workers == 0 || workers > symbols {
        return Err(Error::InvalidWorkerCount {
            workers,
            max: symbols,
        });
    }

    let chunk = symbols / workers;
    let partitions = (0..workers)
        .map(|worker_id| {
            let start = worker_id * chunk;
            let end = if worker_id == workers - 1 {
                symbols
            } else {
                start + chunk
            };
            Partition {
                worker_id,
                first_symbols: start..end,
            }
        })
        .collect();

    Ok(partitions)
}
