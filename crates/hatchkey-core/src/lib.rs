//! # hatchkey-core
//!
//! A library for recovering fixed-length passwords of ZipCrypto-protected
//! archives by exhaustive, multi-threaded search.
//!
//! This crate provides the core functionality for:
//! - Enumerating every candidate of a fixed length over an alphabet
//! - Splitting that keyspace into disjoint per-worker partitions
//! - Testing candidates cheaply against one encrypted zip record
//! - Coordinating workers so the first success stops everyone
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`keyspace`]: Alphabets, candidate enumeration and partitioning
//! - [`archive`]: Zip parsing, the ZipCrypto cipher and per-worker probes
//! - [`outcome`]: The first-writer-wins result slot shared by workers
//! - [`worker`]: The per-thread search loop
//! - [`progress`]: Periodic status reporting
//! - [`search`]: Validation, thread orchestration and the final report
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use hatchkey_core::{Alphabet, NullProgress, SearchConfig, SearchStatus};
//!
//! let config = SearchConfig::new()
//!     .alphabet(Alphabet::new("0123456789")?)
//!     .length(4)
//!     .workers(5);
//!
//! let report = hatchkey_core::crack_zip("./locked.zip", &config, &NullProgress)?;
//! match report.status {
//!     SearchStatus::Found(winner) => println!("password: {}", winner.candidate),
//!     other => println!("no password ({other:?})"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! The library provides several traits for customization:
//!
//! - [`ProbeSource`] / [`ArchiveProbe`]: Search against something other than
//!   a zip file
//! - [`ProgressSink`]: Route progress events elsewhere
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod archive;
pub mod error;
pub mod keyspace;
pub mod outcome;
pub mod progress;
pub mod search;
pub mod worker;

// Re-export primary types for convenience
pub use archive::{ArchiveProbe, ProbeOutcome, ProbeSource, TargetEntry, ZipArchive, ZipProbe};
pub use error::{Error, Result};
pub use keyspace::{partition, Alphabet, Candidates, Keyspace, Partition};
pub use outcome::{SharedOutcome, Winner};
pub use progress::{NullProgress, ProgressEvent, ProgressReporter, ProgressSink, TracingProgress};
pub use search::{crack_zip, Search, SearchConfig, SearchReport, SearchStatus};
pub use worker::{AbortCause, Worker, WorkerExit, WorkerReport};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
