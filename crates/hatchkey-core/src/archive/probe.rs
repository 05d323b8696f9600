//! Per-worker ZipCrypto probe.
//!
//! # Invariants
//! - A probe is owned by one worker and never shared; all buffers and the
//!   inflate state are reused across candidates.
//! - The check-byte rejection path does no I/O, allocation or logging.
//! - The full verification path reads only the target record, never the
//!   whole archive, and never writes anything to storage.

use super::zipcrypto::{Keys, ENCRYPTION_HEADER_LEN};
use super::{ArchiveProbe, CompressionMethod, ProbeOutcome, TargetEntry};
use crate::error::{Error, Result};
use flate2::{Crc, Decompress, FlushDecompress, Status};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

const INFLATE_CHUNK: usize = 32 * 1024;

/// Exclusive decoder context over one archive
pub struct ZipProbe {
    file: File,
    header: [u8; ENCRYPTION_HEADER_LEN],
    target: TargetEntry,
    payload: Vec<u8>,
    inflater: Decompress,
    chunk: Box<[u8]>,
}

impl std::fmt::Debug for ZipProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipProbe")
            .field("target", &self.target.name)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl ZipProbe {
    /// Opens a private handle on `path` and caches the target's encryption
    /// header.
    pub fn open(path: &Path, target: &TargetEntry) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::archive_unreadable(path, e))?;

        let mut header = [0u8; ENCRYPTION_HEADER_LEN];
        file.seek(SeekFrom::Start(target.data_offset))
            .and_then(|_| file.read_exact(&mut header))
            .map_err(|e| Error::archive_unreadable(path, e))?;

        let payload_len = usize::try_from(target.payload_len())
            .map_err(|_| Error::unsupported("target entry too large for this platform"))?;

        Ok(Self {
            file,
            header,
            target: target.clone(),
            payload: vec![0u8; payload_len],
            inflater: Decompress::new(false),
            chunk: vec![0u8; INFLATE_CHUNK].into_boxed_slice(),
        })
    }

    /// Re-reads the encrypted record through this probe's handle.
    fn load_payload(&mut self) -> io::Result<()> {
        let offset = self.target.data_offset + ENCRYPTION_HEADER_LEN as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut self.payload)
    }

    /// Full decode of the record after a check-byte match.
    fn verify(&mut self, mut keys: Keys) -> ProbeOutcome {
        if let Err(e) = self.load_payload() {
            return ProbeOutcome::IoError(e);
        }
        keys.decrypt_in_place(&mut self.payload);

        let verdict = match self.target.method {
            CompressionMethod::Stored => {
                let mut crc = Crc::new();
                crc.update(&self.payload);
                self.payload.len() as u64 == self.target.uncompressed_size
                    && crc.sum() == self.target.crc32
            }
            CompressionMethod::Deflated => self.inflate_matches(),
        };

        if verdict {
            ProbeOutcome::Valid
        } else {
            trace!("Check byte matched but '{}' failed to verify", self.target.name);
            ProbeOutcome::CorruptArchive
        }
    }

    /// Streams the decrypted payload through inflate, checking size and
    /// CRC-32 of the output.
    fn inflate_matches(&mut self) -> bool {
        self.inflater.reset(false);
        let mut crc = Crc::new();
        let mut in_pos = 0usize;
        let mut out_total = 0u64;

        loop {
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = match self.inflater.decompress(
                &self.payload[in_pos..],
                &mut self.chunk,
                FlushDecompress::None,
            ) {
                Ok(status) => status,
                Err(_) => return false,
            };

            let consumed = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            in_pos += consumed;

            if produced != 0 {
                out_total += produced as u64;
                if out_total > self.target.uncompressed_size {
                    return false;
                }
                crc.update(&self.chunk[..produced]);
            }

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        return false;
                    }
                }
            }
        }

        out_total == self.target.uncompressed_size && crc.sum() == self.target.crc32
    }
}

impl ArchiveProbe for ZipProbe {
    fn test(&mut self, candidate: &[u8]) -> ProbeOutcome {
        let mut keys = Keys::new(candidate);
        let mut last = 0u8;
        for &b in &self.header {
            last = keys.decrypt_byte(b);
        }

        if last != self.target.check_byte {
            return ProbeOutcome::WrongPassword;
        }
        self.verify(keys)
    }
}
