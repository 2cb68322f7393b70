//! VNI Pool BitArray - Allocation bitmap codec
//!
//! A growable bit-vector that records which identifiers of a pool are
//! claimed, plus the compact text form it is stored as inside a
//! configuration record.
//!
//! # Layout
//!
//! ```text
//!   bit index:  0 1 2 3 4 5 6 7 | 8 9 ...
//!   byte 0:     MSB ........ LSB | byte 1 ...
//!   text:       base64(bytes without trailing zero bytes)
//! ```
//!
//! Reading past the end of the storage yields "free", writing past the end
//! grows the storage to the next byte boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bit_vec::BitVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// BitArray errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitArrayError {
    /// Stored text is not valid base64
    #[error("allocation bitmap is not valid base64: {0}")]
    Decode(String),
}

/// Growable allocation bitmap
///
/// # Invariants
/// - Storage length is always a multiple of 8 bits
/// - Equality and encoding depend only on which bits are set
#[derive(Debug, Clone, Default)]
pub struct BitArray {
    bits: BitVec,
}

impl BitArray {
    /// Create an all-clear bitmap with no storage
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    /// Create an all-clear bitmap able to hold `len` bits without growing
    pub fn with_capacity(len: u32) -> Self {
        let bytes = (len as usize).div_ceil(8);
        Self {
            bits: BitVec::from_elem(bytes * 8, false),
        }
    }

    /// Decode from the base64 text form. Empty text is an empty bitmap.
    pub fn from_base64(text: &str) -> Result<Self, BitArrayError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::new());
        }
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| BitArrayError::Decode(e.to_string()))?;
        Ok(Self {
            bits: BitVec::from_bytes(&bytes),
        })
    }

    /// Encode to the base64 text form
    pub fn encode(&self) -> String {
        let bytes = self.trimmed_bytes();
        if bytes.is_empty() {
            return String::new();
        }
        STANDARD.encode(bytes)
    }

    /// Whether bit `index` is set. Indices past the end read as clear.
    #[inline]
    pub fn get(&self, index: u32) -> bool {
        self.bits.get(index as usize).unwrap_or(false)
    }

    /// Set bit `index`, growing storage when needed
    pub fn set(&mut self, index: u32) {
        let index = index as usize;
        if index >= self.bits.len() {
            let wanted = (index / 8 + 1) * 8;
            self.bits.grow(wanted - self.bits.len(), false);
        }
        self.bits.set(index, true);
    }

    /// Clear bit `index`. Clearing past the end is a no-op.
    pub fn reset(&mut self, index: u32) {
        let index = index as usize;
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    /// Storage length in bits
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when no bit is set
    pub fn is_empty(&self) -> bool {
        self.bits.none()
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|b| *b).count()
    }

    /// Indices of the set bits, ascending
    pub fn ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| *set)
            .map(|(i, _)| i as u32)
    }

    fn trimmed_bytes(&self) -> Vec<u8> {
        let mut bytes = self.bits.to_bytes();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }
}

impl PartialEq for BitArray {
    fn eq(&self, other: &Self) -> bool {
        self.trimmed_bytes() == other.trimmed_bytes()
    }
}

impl Eq for BitArray {}

impl FromStr for BitArray {
    type Err = BitArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl fmt::Display for BitArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
