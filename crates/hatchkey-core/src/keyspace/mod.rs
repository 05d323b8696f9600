//! Keyspace model and candidate enumeration.
//!
//! A keyspace is every string of a fixed length over an [`Alphabet`]. Its
//! candidates are ordered lexicographically by alphabet position, with the
//! first symbol most significant, so candidate `i` is simply `i` written in
//! base `|alphabet|` with `length` digits.
//!
//! ## Enumeration
//!
//! [`Candidates`] walks a contiguous range of first symbols and, for each of
//! them, every combination of the remaining positions as an odometer
//! (rightmost position turns fastest). The hot path,
//! [`Candidates::next_candidate`], rewrites a single internal buffer in place
//! and hands out a borrowed slice:
//!
//! ```
//! use hatchkey_core::{Alphabet, Keyspace};
//!
//! let keyspace = Keyspace::new(Alphabet::new("ab")?, 2)?;
//! let mut candidates = keyspace.candidates(0..2);
//! let mut seen = Vec::new();
//! while let Some(candidate) = candidates.next_candidate() {
//!     seen.push(candidate.to_vec());
//! }
//! assert_eq!(seen, [b"aa", b"ab", b"ba", b"bb"]);
//! # Ok::<(), hatchkey_core::Error>(())
//! ```

mod partition;

use crate::error::{Error, Result};
use std::fmt;
use std::ops::Range;

pub use partition::{partition, Partition};

/// Decimal digits
pub const DIGITS: &str = "0123456789";
/// Lowercase ASCII letters
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
/// Uppercase ASCII letters
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// ASCII punctuation
pub const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Ordered set of distinct printable ASCII symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<u8>,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::digits_lowercase()
    }
}

impl Alphabet {
    /// Builds an alphabet from the given symbols, keeping their order
    pub fn new(symbols: impl AsRef<str>) -> Result<Self> {
        let symbols = symbols.as_ref();
        if symbols.is_empty() {
            return Err(Error::invalid_alphabet("alphabet is empty"));
        }

        let mut seen = [false; 128];
        let mut bytes = Vec::with_capacity(symbols.len());
        for ch in symbols.chars() {
            if !(ch == ' ' || ch.is_ascii_graphic()) {
                return Err(Error::invalid_alphabet(format!(
                    "symbol {:?} is not printable ASCII",
                    ch
                )));
            }
            let b = ch as u8;
            if seen[b as usize] {
                return Err(Error::invalid_alphabet(format!(
                    "symbol {:?} appears more than once",
                    ch
                )));
            }
            seen[b as usize] = true;
            bytes.push(b);
        }

        Ok(Self { symbols: bytes })
    }

    /// `0-9a-z`, 36 symbols
    pub fn digits_lowercase() -> Self {
        Self {
            symbols: [DIGITS, LOWERCASE].concat().into_bytes(),
        }
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false for a constructed alphabet
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in enumeration order
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Position of `symbol` in the alphabet
    pub fn position(&self, symbol: u8) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.symbols {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// All strings of `length` symbols over an alphabet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    alphabet: Alphabet,
    length: usize,
    size: u64,
    suffix_count: u64,
}

impl Keyspace {
    /// Creates a keyspace, rejecting zero lengths and sizes beyond `u64`
    pub fn new(alphabet: Alphabet, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::InvalidLength);
        }

        let overflow = || Error::KeyspaceOverflow {
            symbols: alphabet.len(),
            length,
        };
        let exp = u32::try_from(length).map_err(|_| overflow())?;
        let base = alphabet.len() as u64;
        let size = base.checked_pow(exp).ok_or_else(overflow)?;
        let suffix_count = base.pow(exp - 1);

        Ok(Self {
            alphabet,
            length,
            size,
            suffix_count,
        })
    }

    /// The alphabet candidates are drawn from
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Fixed candidate length
    pub fn length(&self) -> usize {
        self.length
    }

    /// Total number of candidates, `|alphabet|^length`
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of candidates sharing one first symbol, `|alphabet|^(length-1)`
    pub fn suffix_count(&self) -> u64 {
        self.suffix_count
    }

    /// Returns the candidate at `index` in enumeration order
    pub fn candidate_at(&self, index: u64) -> Option<String> {
        if index >= self.size {
            return None;
        }

        let base = self.alphabet.len() as u64;
        let symbols = self.alphabet.symbols();
        let mut out = vec![0u8; self.length];
        let mut rest = index;
        for slot in out.iter_mut().rev() {
            *slot = symbols[(rest % base) as usize];
            rest /= base;
        }

        Some(out.into_iter().map(char::from).collect())
    }

    /// Inverse of [`candidate_at`](Self::candidate_at)
    pub fn index_of(&self, candidate: &str) -> Option<u64> {
        if candidate.len() != self.length {
            return None;
        }

        let base = self.alphabet.len() as u64;
        candidate.bytes().try_fold(0u64, |acc, b| {
            let digit = self.alphabet.position(b)? as u64;
            Some(acc * base + digit)
        })
    }

    /// Enumerates every candidate whose first symbol lies in `first_symbols`
    /// (alphabet positions)
    pub fn candidates(&self, first_symbols: Range<usize>) -> Candidates<'_> {
        let end = first_symbols.end.min(self.alphabet.len());
        let start = first_symbols.start.min(end);
        Candidates::new(self.alphabet.symbols(), start..end, self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Fresh,
    Active,
    Done,
}

/// Lazy, restartable enumerator over one first-symbol range
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    symbols: &'a [u8],
    first: Range<usize>,
    digits: Vec<usize>,
    buf: Vec<u8>,
    cursor: Cursor,
}

impl<'a> Candidates<'a> {
    fn new(symbols: &'a [u8], first: Range<usize>, length: usize) -> Self {
        Self {
            symbols,
            first,
            digits: vec![0; length],
            buf: vec![0; length],
            cursor: Cursor::Fresh,
        }
    }

    /// Number of candidates this enumerator yields from the start
    pub fn total(&self) -> u64 {
        let per_first = (self.symbols.len() as u64).pow(self.digits.len() as u32 - 1);
        self.first.len() as u64 * per_first
    }

    /// Rewinds to the first candidate
    pub fn reset(&mut self) {
        self.cursor = Cursor::Fresh;
    }

    /// Advances and returns the next candidate, or `None` once exhausted
    ///
    /// The returned slice is overwritten by the following call.
    pub fn next_candidate(&mut self) -> Option<&[u8]> {
        match self.cursor {
            Cursor::Done => return None,
            Cursor::Fresh => {
                if self.first.is_empty() {
                    self.cursor = Cursor::Done;
                    return None;
                }
                self.digits.fill(0);
                self.digits[0] = self.first.start;
                self.buf.fill(self.symbols[0]);
                self.buf[0] = self.symbols[self.first.start];
                self.cursor = Cursor::Active;
            }
            Cursor::Active => {
                if !self.advance() {
                    self.cursor = Cursor::Done;
                    return None;
                }
            }
        }

        Some(&self.buf)
    }

    /// Odometer step; false when the first position leaves its range
    fn advance(&mut self) -> bool {
        let base = self.symbols.len();

        for pos in (1..self.digits.len()).rev() {
            self.digits[pos] += 1;
            if self.digits[pos] < base {
                self.buf[pos] = self.symbols[self.digits[pos]];
                return true;
            }
            self.digits[pos] = 0;
            self.buf[pos] = self.symbols[0];
        }

        self.digits[0] += 1;
        if self.digits[0] < self.first.end {
            self.buf[0] = self.symbols[self.digits[0]];
            true
        } else {
            false
        }
    }
}

/// Allocating convenience view; workers use [`Candidates::next_candidate`].
impl Iterator for Candidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_candidate()
            .map(|c| c.iter().copied().map(char::from).collect())
    }
}
