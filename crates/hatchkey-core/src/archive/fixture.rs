//! Deterministic zip builder for tests.
//!
//! Produces Zip32 archives with fixed timestamps. Password-protected entries
//! are really encrypted with ZipCrypto, so the probe can be exercised end to
//! end.

use super::zipcrypto::{Keys, ENCRYPTION_HEADER_LEN};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::Write;
use std::path::{Path, PathBuf};

const FIXED_TIME: u16 = 0x6B2A;
const FIXED_DATE: u16 = 0x5A21;

/// One entry to place in a fixture archive
#[derive(Debug, Clone)]
pub(crate) struct FixtureEntry<'a> {
    name: &'a str,
    payload: &'a [u8],
    method: u16,
    password: Option<&'a [u8]>,
    data_descriptor: bool,
}

impl<'a> FixtureEntry<'a> {
    pub(crate) fn stored(name: &'a str, payload: &'a [u8]) -> Self {
        Self {
            name,
            payload,
            method: 0,
            password: None,
            data_descriptor: false,
        }
    }

    pub(crate) fn deflated(name: &'a str, payload: &'a [u8]) -> Self {
        Self {
            method: 8,
            ..Self::stored(name, payload)
        }
    }

    pub(crate) fn directory(name: &'a str) -> Self {
        Self::stored(name, &[])
    }

    pub(crate) fn password(mut self, password: &'a [u8]) -> Self {
        self.password = Some(password);
        self
    }

    pub(crate) fn data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    pub(crate) fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }
}

/// Build zip bytes for `entries`, in order.
pub(crate) fn build_zip(entries: &[FixtureEntry<'_>]) -> Vec<u8> {
    fn u16le(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn u32le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    let mut out = Vec::new();
    let mut cd = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let mut crc = Crc::new();
        crc.update(entry.payload);
        let crc = crc.sum();

        let mut data = if entry.method == 8 {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(entry.payload).unwrap();
            encoder.finish().unwrap()
        } else {
            entry.payload.to_vec()
        };

        let mut flags = 0u16;
        if entry.data_descriptor {
            flags |= 0x0008;
        }
        if let Some(password) = entry.password {
            flags |= 0x0001;
            let check = if entry.data_descriptor {
                (FIXED_TIME >> 8) as u8
            } else {
                (crc >> 24) as u8
            };
            let mut header = [0u8; ENCRYPTION_HEADER_LEN];
            for (i, b) in header.iter_mut().enumerate() {
                *b = (i as u8).wrapping_mul(37).wrapping_add(index as u8);
            }
            header[ENCRYPTION_HEADER_LEN - 1] = check;

            let mut keys = Keys::new(password);
            keys.encrypt_in_place(&mut header);
            keys.encrypt_in_place(&mut data);
            let mut sealed = header.to_vec();
            sealed.extend_from_slice(&data);
            data = sealed;
        }

        let name = entry.name.as_bytes();
        let local_off = out.len() as u32;
        let (lh_crc, lh_csize, lh_usize) = if entry.data_descriptor {
            (0, 0, 0)
        } else {
            (crc, data.len() as u32, entry.payload.len() as u32)
        };

        out.extend_from_slice(&u32le(0x04034b50));
        out.extend_from_slice(&u16le(20));
        out.extend_from_slice(&u16le(flags));
        out.extend_from_slice(&u16le(entry.method));
        out.extend_from_slice(&u16le(FIXED_TIME));
        out.extend_from_slice(&u16le(FIXED_DATE));
        out.extend_from_slice(&u32le(lh_crc));
        out.extend_from_slice(&u32le(lh_csize));
        out.extend_from_slice(&u32le(lh_usize));
        out.extend_from_slice(&u16le(name.len() as u16));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(name);
        out.extend_from_slice(&data);
        if entry.data_descriptor {
            out.extend_from_slice(&u32le(0x08074b50));
            out.extend_from_slice(&u32le(crc));
            out.extend_from_slice(&u32le(data.len() as u32));
            out.extend_from_slice(&u32le(entry.payload.len() as u32));
        }

        cd.extend_from_slice(&u32le(0x02014b50));
        cd.extend_from_slice(&u16le(20));
        cd.extend_from_slice(&u16le(20));
        cd.extend_from_slice(&u16le(flags));
        cd.extend_from_slice(&u16le(entry.method));
        cd.extend_from_slice(&u16le(FIXED_TIME));
        cd.extend_from_slice(&u16le(FIXED_DATE));
        cd.extend_from_slice(&u32le(crc));
        cd.extend_from_slice(&u32le(data.len() as u32));
        cd.extend_from_slice(&u32le(entry.payload.len() as u32));
        cd.extend_from_slice(&u16le(name.len() as u16));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u32le(0));
        cd.extend_from_slice(&u32le(local_off));
        cd.extend_from_slice(name);
    }

    let cd_start = out.len() as u32;
    out.extend_from_slice(&cd);
    let cd_size = cd.len() as u32;

    out.extend_from_slice(&u32le(0x06054b50));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(entries.len() as u16));
    out.extend_from_slice(&u16le(entries.len() as u16));
    out.extend_from_slice(&u32le(cd_size));
    out.extend_from_slice(&u32le(cd_start));
    out.extend_from_slice(&u16le(0));

    out
}

/// Build a zip and write it to `dir/file_name`.
pub(crate) fn write_zip(dir: &Path, file_name: &str, entries: &[FixtureEntry<'_>]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, build_zip(entries)).unwrap();
    path
}

/// Single deflated entry protected by `password`, the usual search target.
pub(crate) fn locked_zip(dir: &Path, password: &str) -> PathBuf {
    write_zip(
        dir,
        "locked.zip",
        &[FixtureEntry::deflated(
            "emergency_storage_key.txt",
            b"Mars base emergency storage key: keep it safe. Mars base emergency storage key.",
        )
        .password(password.as_bytes())],
    )
}
