//! Testing candidate passwords against an encrypted archive.
//!
//! ## Algorithm Overview
//!
//! 1. Validate the archive once and pick the *target entry*: the smallest
//!    ZipCrypto-encrypted file, since it is the cheapest record to verify
//! 2. Give every worker its own [`ArchiveProbe`] with a private file handle
//! 3. Per candidate, decrypt the 12-byte encryption header and compare the
//!    check byte; almost every wrong password stops here
//! 4. On a check-byte match, decrypt and decode the target record and verify
//!    its CRC-32 and size
//!
//! ## Extensibility
//!
//! The [`ProbeSource`] and [`ArchiveProbe`] traits allow the search to run
//! against something other than a zip file:
//!
//! ```no_run
//! use hatchkey_core::archive::{ArchiveProbe, ProbeOutcome, ProbeSource};
//! use hatchkey_core::Result;
//!
//! struct Fixed(&'static [u8]);
//!
//! impl ArchiveProbe for Fixed {
//!     fn test(&mut self, candidate: &[u8]) -> ProbeOutcome {
//!         if candidate == self.0 {
//!             ProbeOutcome::Valid
//!         } else {
//!             ProbeOutcome::WrongPassword
//!         }
//!     }
//! }
//!
//! struct FixedSource;
//!
//! impl ProbeSource for FixedSource {
//!     type Probe = Fixed;
//!
//!     fn open_probe(&self) -> Result<Fixed> {
//!         Ok(Fixed(b"7k2p"))
//!     }
//! }
//! ```

#[cfg(test)]
pub(crate) mod fixture;
mod probe;
mod zip;
mod zipcrypto;

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use probe::ZipProbe;
pub use zip::EntryRecord;
pub use zipcrypto::{Keys, ENCRYPTION_HEADER_LEN};

/// Result of testing one candidate
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The candidate decrypts the target record and its checksum matches
    Valid,
    /// The candidate was rejected; the common case
    WrongPassword,
    /// The candidate passed the header check but the record failed to decode
    /// or verify
    CorruptArchive,
    /// Reading the archive failed mid-probe
    IoError(io::Error),
}

/// Tests candidates against one archive. Each instance is owned by exactly
/// one worker.
pub trait ArchiveProbe: Send {
    /// Tests a single candidate password
    fn test(&mut self, candidate: &[u8]) -> ProbeOutcome;
}

/// Hands out one exclusive [`ArchiveProbe`] per worker
pub trait ProbeSource: Sync {
    /// Probe type produced for each worker
    type Probe: ArchiveProbe;

    /// Opens a fresh probe with its own handle to the archive
    fn open_probe(&self) -> Result<Self::Probe>;
}

/// How the target entry's data is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Method 0
    Stored,
    /// Method 8
    Deflated,
}

/// The encrypted entry every probe verifies against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    /// Entry name
    pub name: String,
    /// Compression of the plaintext
    pub method: CompressionMethod,
    /// Offset of the encryption header
    pub data_offset: u64,
    /// Stored size, encryption header included
    pub compressed_size: u64,
    /// Plaintext size
    pub uncompressed_size: u64,
    /// CRC-32 of the plaintext
    pub crc32: u32,
    /// Expected last byte of the decrypted encryption header
    pub check_byte: u8,
}

impl TargetEntry {
    fn from_record(record: &EntryRecord, data_offset: u64) -> Result<Self> {
        let method = match record.method {
            zip::METHOD_STORED => CompressionMethod::Stored,
            zip::METHOD_DEFLATED => CompressionMethod::Deflated,
            other => {
                return Err(Error::unsupported(format!(
                    "compression method {other} in entry '{}'",
                    record.name
                )))
            }
        };

        if record.compressed_size < ENCRYPTION_HEADER_LEN as u64 {
            return Err(Error::invalid_archive(
                data_offset,
                format!(
                    "encrypted entry '{}' is shorter than its encryption header",
                    record.name
                ),
            ));
        }

        let check_byte = if record.uses_data_descriptor() {
            (record.mod_time >> 8) as u8
        } else {
            (record.crc32 >> 24) as u8
        };

        Ok(Self {
            name: record.name.clone(),
            method,
            data_offset,
            compressed_size: record.compressed_size,
            uncompressed_size: record.uncompressed_size,
            crc32: record.crc32,
            check_byte,
        })
    }

    /// Encrypted payload length after the encryption header
    pub fn payload_len(&self) -> u64 {
        self.compressed_size - ENCRYPTION_HEADER_LEN as u64
    }
}

/// A validated ZipCrypto-protected archive
#[derive(Debug, Clone)]
pub struct ZipArchive {
    path: PathBuf,
    len: u64,
    entries: usize,
    target: TargetEntry,
}

impl ZipArchive {
    /// Opens and validates the archive at `path`.
    ///
    /// Every failure here is a fatal input error: missing, unreadable or
    /// empty files, malformed zips, and archives without a usable encrypted
    /// entry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ArchiveNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::archive_unreadable(path, e),
        })?;
        if !metadata.is_file() {
            return Err(Error::archive_unreadable(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let len = metadata.len();
        if len == 0 {
            return Err(Error::ArchiveEmpty {
                path: path.to_path_buf(),
            });
        }

        let mut file = File::open(path).map_err(|e| Error::archive_unreadable(path, e))?;
        let records = zip::read_central_directory(&mut file, len)?;
        let record = select_target(&records)?;
        let data_offset = zip::locate_data(&mut file, len, record)?;
        let target = TargetEntry::from_record(record, data_offset)?;

        debug!(
            "Target entry '{}' ({} encrypted of {} entries, {} bytes at offset {})",
            target.name,
            records.iter().filter(|r| r.is_encrypted()).count(),
            records.len(),
            target.compressed_size,
            target.data_offset
        );

        Ok(Self {
            path: path.to_path_buf(),
            len,
            entries: records.len(),
            target,
        })
    }

    /// Path the archive was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Always false for an opened archive
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of central directory entries
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// The entry candidates are verified against
    pub fn target(&self) -> &TargetEntry {
        &self.target
    }
}

impl ProbeSource for ZipArchive {
    type Probe = ZipProbe;

    fn open_probe(&self) -> Result<ZipProbe> {
        ZipProbe::open(&self.path, &self.target)
    }
}

/// Picks the smallest non-empty ZipCrypto-encrypted file entry. Empty
/// entries verify under any password whose check byte matches, so they are
/// never a target.
fn select_target(records: &[EntryRecord]) -> Result<&EntryRecord> {
    let encrypted: Vec<&EntryRecord> = records
        .iter()
        .filter(|r| r.is_encrypted() && !r.is_dir())
        .collect();
    if encrypted.is_empty() {
        return Err(Error::NoEncryptedEntry);
    }

    let supported: Vec<&EntryRecord> = encrypted
        .iter()
        .copied()
        .filter(|r| {
            r.flags & zip::FLAG_STRONG_ENCRYPTION == 0
                && matches!(r.method, zip::METHOD_STORED | zip::METHOD_DEFLATED)
        })
        .collect();

    if !supported.is_empty() && supported.iter().all(|r| r.uncompressed_size == 0) {
        return Err(Error::unsupported(
            "only empty encrypted entries, which cannot confirm a password",
        ));
    }

    supported
        .into_iter()
        .filter(|r| r.uncompressed_size != 0)
        .min_by_key(|r| r.compressed_size)
        .ok_or_else(|| {
            let first = encrypted[0];
            if first.method == zip::METHOD_AES {
                Error::unsupported("AES-encrypted entries")
            } else if first.flags & zip::FLAG_STRONG_ENCRYPTION != 0 {
                Error::unsupported("PKWARE strong encryption")
            } else {
                Error::unsupported(format!(
                    "compression method {} in entry '{}'",
                    first.method, first.name
                ))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::fixture::{write_zip, FixtureEntry};
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_empty_archives() {
        let dir = TempDir::new().unwrap();

        let err = ZipArchive::open(dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, Error::ArchiveNotFound { .. }));

        let empty = dir.path().join("empty.zip");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            ZipArchive::open(&empty).unwrap_err(),
            Error::ArchiveEmpty { .. }
        ));

        assert!(matches!(
            ZipArchive::open(dir.path()).unwrap_err(),
            Error::ArchiveUnreadable { .. }
        ));
    }

    #[test]
    fn test_no_encrypted_entry() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "plain.zip",
            &[FixtureEntry::stored("a.txt", b"open")],
        );
        assert!(matches!(
            ZipArchive::open(&path).unwrap_err(),
            Error::NoEncryptedEntry
        ));
    }

    #[test]
    fn test_selects_smallest_encrypted_entry() {
        let dir = TempDir::new().unwrap();
        let big = vec![b'x'; 4096];
        let path = write_zip(
            dir.path(),
            "mixed.zip",
            &[
                FixtureEntry::stored("tiny-plain.txt", b"a"),
                FixtureEntry::stored("big.bin", &big).password(b"pw"),
                FixtureEntry::deflated("small.txt", b"short secret").password(b"pw"),
                FixtureEntry::directory("folder/").password(b"pw"),
            ],
        );

        let archive = ZipArchive::open(&path).unwrap();
        assert_eq!(archive.entry_count(), 4);
        let target = archive.target();
        assert_eq!(target.name, "small.txt");
        assert_eq!(target.method, CompressionMethod::Deflated);
        assert_eq!(target.uncompressed_size, 12);
        assert_eq!(target.check_byte, (target.crc32 >> 24) as u8);
    }

    #[test]
    fn test_data_descriptor_uses_time_check_byte() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "streamed.zip",
            &[FixtureEntry::stored("s.txt", b"streamed").password(b"pw").data_descriptor()],
        );
        let archive = ZipArchive::open(&path).unwrap();
        assert_eq!(archive.target().check_byte, 0x6B);
    }

    #[test]
    fn test_rejects_archive_with_only_empty_encrypted_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "hollow.zip",
            &[
                FixtureEntry::stored("empty.txt", b"").password(b"pw"),
                FixtureEntry::stored("note.txt", b"secret").password(b"pw"),
            ],
        );
        assert_eq!(ZipArchive::open(&path).unwrap().target().name, "note.txt");

        let path = write_zip(
            dir.path(),
            "only-empty.zip",
            &[
                FixtureEntry::stored("readme.txt", b"plain"),
                FixtureEntry::stored("empty.txt", b"").password(b"pw"),
                FixtureEntry::deflated("blank.txt", b"").password(b"pw"),
            ],
        );
        let err = ZipArchive::open(&path).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("only empty encrypted entries"));
    }

    #[test]
    fn test_rejects_aes_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "aes.zip",
            &[FixtureEntry::stored("a.txt", b"aes payload").password(b"pw").method(99)],
        );
        let err = ZipArchive::open(&path).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("AES"));
    }
}
