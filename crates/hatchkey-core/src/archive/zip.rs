//! Zip32 container parsing.
//!
//! Only the metadata needed to locate one encrypted record is read: the End
//! Of Central Directory record, the central directory, and the local file
//! header of the chosen entry. All sizes and offsets are untrusted and are
//! checked against the file length before use.
//!
//! ## Record layout
//!
//! - Local file header:  `PK 03 04`, 30 fixed bytes + name + extra
//! - Central directory:  `PK 01 02`, 46 fixed bytes + name + extra + comment
//! - End of central dir: `PK 05 06`, 22 fixed bytes + comment
//!
//! Zip64 and multi-disk archives are rejected.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_LEN: usize = 22;
/// 64 KiB comment + fixed record
const EOCD_SEARCH_MAX: u64 = 0xFFFF + EOCD_LEN as u64;
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

/// General purpose flag: entry is encrypted
pub(crate) const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: CRC and sizes follow the data in a descriptor
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: PKWARE strong encryption
pub(crate) const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

/// Compression method: stored
pub(crate) const METHOD_STORED: u16 = 0;
/// Compression method: deflate
pub(crate) const METHOD_DEFLATED: u16 = 8;
/// Compression method marker for WinZip AES
pub(crate) const METHOD_AES: u16 = 99;

/// Central directory view of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entry name as stored (lossily decoded)
    pub name: String,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method id
    pub method: u16,
    /// DOS modification time
    pub mod_time: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Size of the stored data, encryption header included
    pub compressed_size: u64,
    /// Size after decompression
    pub uncompressed_size: u64,
    /// Offset of the local file header
    pub local_header_offset: u64,
}

impl EntryRecord {
    /// Entry carries the traditional or strong encryption bit
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Entry is a directory marker
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// CRC and sizes were written after the data
    pub fn uses_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

#[inline]
fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

/// Location of the central directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CentralDirectory {
    offset: u64,
    size: u64,
    entries: u16,
}

/// Finds and decodes the End Of Central Directory record.
fn read_eocd(file: &mut File, file_len: u64) -> Result<CentralDirectory> {
    if file_len < EOCD_LEN as u64 {
        return Err(Error::invalid_archive(0, "file too small to be a zip"));
    }

    let tail_len = file_len.min(EOCD_SEARCH_MAX);
    let tail_start = file_len - tail_len;
    let mut tail = vec![0u8; tail_len as usize];
    read_at(file, tail_start, &mut tail)
        .map_err(|e| Error::invalid_archive(tail_start, format!("failed to read tail: {e}")))?;

    let pos = (0..=tail.len() - EOCD_LEN)
        .rev()
        .find(|&i| u32_at(&tail, i) == SIG_EOCD)
        .ok_or_else(|| Error::invalid_archive(tail_start, "end of central directory not found"))?;
    let eocd = &tail[pos..];
    let eocd_offset = tail_start + pos as u64;

    let disk = u16_at(eocd, 4);
    let cd_disk = u16_at(eocd, 6);
    if disk != 0 || cd_disk != 0 {
        return Err(Error::unsupported("multi-disk archives"));
    }

    let entries = u16_at(eocd, 10);
    let size = u32_at(eocd, 12);
    let offset = u32_at(eocd, 16);
    if entries == 0xFFFF || size == 0xFFFF_FFFF || offset == 0xFFFF_FFFF {
        return Err(Error::unsupported("zip64 archives"));
    }

    let (offset, size) = (offset as u64, size as u64);
    if offset + size > eocd_offset {
        return Err(Error::invalid_archive(
            eocd_offset,
            format!("central directory {offset}+{size} overlaps its end record"),
        ));
    }

    Ok(CentralDirectory {
        offset,
        size,
        entries,
    })
}

/// Reads every central directory entry.
pub(crate) fn read_central_directory(file: &mut File, file_len: u64) -> Result<Vec<EntryRecord>> {
    let cd = read_eocd(file, file_len)?;

    let mut buf = vec![0u8; cd.size as usize];
    read_at(file, cd.offset, &mut buf).map_err(|e| {
        Error::invalid_archive(cd.offset, format!("failed to read central directory: {e}"))
    })?;

    let mut entries = Vec::with_capacity(cd.entries as usize);
    let mut pos = 0usize;
    for _ in 0..cd.entries {
        let at = cd.offset + pos as u64;
        if pos + CDFH_LEN > buf.len() {
            return Err(Error::invalid_archive(at, "truncated central directory entry"));
        }
        let header = &buf[pos..];
        if u32_at(header, 0) != SIG_CDFH {
            return Err(Error::invalid_archive(at, "bad central directory signature"));
        }

        let name_len = u16_at(header, 28) as usize;
        let extra_len = u16_at(header, 30) as usize;
        let comment_len = u16_at(header, 32) as usize;
        let record_len = CDFH_LEN + name_len + extra_len + comment_len;
        if pos + record_len > buf.len() {
            return Err(Error::invalid_archive(at, "central directory entry overruns directory"));
        }

        let compressed_size = u32_at(header, 20);
        let uncompressed_size = u32_at(header, 24);
        let local_header_offset = u32_at(header, 42);
        if compressed_size == 0xFFFF_FFFF
            || uncompressed_size == 0xFFFF_FFFF
            || local_header_offset == 0xFFFF_FFFF
        {
            return Err(Error::unsupported("zip64 entries"));
        }

        entries.push(EntryRecord {
            name: String::from_utf8_lossy(&header[CDFH_LEN..CDFH_LEN + name_len]).into_owned(),
            flags: u16_at(header, 8),
            method: u16_at(header, 10),
            mod_time: u16_at(header, 12),
            crc32: u32_at(header, 16),
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            local_header_offset: local_header_offset as u64,
        });

        pos += record_len;
    }

    Ok(entries)
}

/// Returns the offset of `entry`'s data (the encryption header for an
/// encrypted entry), validating its local file header.
pub(crate) fn locate_data(file: &mut File, file_len: u64, entry: &EntryRecord) -> Result<u64> {
    let lho = entry.local_header_offset;
    let mut header = [0u8; LFH_LEN];
    if lho + LFH_LEN as u64 > file_len {
        return Err(Error::invalid_archive(lho, "local header beyond end of file"));
    }
    read_at(file, lho, &mut header)
        .map_err(|e| Error::invalid_archive(lho, format!("failed to read local header: {e}")))?;

    if u32_at(&header, 0) != SIG_LFH {
        return Err(Error::invalid_archive(lho, "bad local header signature"));
    }
    if u16_at(&header, 8) != entry.method {
        return Err(Error::invalid_archive(
            lho,
            "local header disagrees with central directory on compression method",
        ));
    }

    let name_len = u16_at(&header, 26) as u64;
    let extra_len = u16_at(&header, 28) as u64;
    let data_offset = lho + LFH_LEN as u64 + name_len + extra_len;
    if data_offset + entry.compressed_size > file_len {
        return Err(Error::invalid_archive(
            data_offset,
            format!(
                "entry '{}' data ({} bytes) runs past end of file",
                entry.name, entry.compressed_size
            ),
        ));
    }

    Ok(data_offset)
}
