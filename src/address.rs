use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of an address hash in trytes, without checksum.
pub const HASH_TRYTES: usize = 81;
/// Length of the checksum suffix in trytes.
pub const CHECKSUM_TRYTES: usize = 9;
/// Length of a checksummed address in trytes.
pub const CHECKSUMMED_TRYTES: usize = HASH_TRYTES + CHECKSUM_TRYTES;
/// Length of a seed in trytes.
pub const SEED_TRYTES: usize = 81;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("must consist of the tryte alphabet [9A-Z]")]
    NotTrytes,
    #[error("must be {HASH_TRYTES} or {CHECKSUMMED_TRYTES} trytes long, got {0}")]
    InvalidLength(usize),
    #[error("seed must be {SEED_TRYTES} trytes long, got {0}")]
    InvalidSeedLength(usize),
}

/// Checks whether the string consists solely of the tryte alphabet.
pub fn is_trytes(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b'9' || b.is_ascii_uppercase())
}

/// Checks whether the string is a tryte string of exactly `len` characters.
pub fn is_trytes_of_length(s: &str, len: usize) -> bool {
    s.len() == len && is_trytes(s)
}

/// A deposit or recipient address, with or without its checksum suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Accepts an 81-tryte hash or a 90-tryte checksummed hash.
    pub fn new(trytes: impl Into<String>) -> Result<Self, AddressError> {
        let trytes = trytes.into();
        if !is_trytes(&trytes) {
            return Err(AddressError::NotTrytes);
        }
        if trytes.len() != HASH_TRYTES && trytes.len() != CHECKSUMMED_TRYTES {
            return Err(AddressError::InvalidLength(trytes.len()));
        }
        Ok(Self(trytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_checksummed(&self) -> bool {
        self.0.len() == CHECKSUMMED_TRYTES
    }

    /// The 81-tryte hash part, checksum stripped.
    pub fn hash(&self) -> &str {
        &self.0[..HASH_TRYTES]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The account's secret seed material.
///
/// The `Debug` impl is redacted; the seed never appears in logs or errors.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed(String);

impl Seed {
    pub fn new(trytes: impl Into<String>) -> Result<Self, AddressError> {
        let trytes = trytes.into();
        if !is_trytes(&trytes) {
            return Err(AddressError::NotTrytes);
        }
        if trytes.len() != SEED_TRYTES {
            return Err(AddressError::InvalidSeedLength(trytes.len()));
        }
        Ok(Self(trytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Number of signing rounds backing an address; higher levels give larger
/// signatures and stronger one-time keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}
