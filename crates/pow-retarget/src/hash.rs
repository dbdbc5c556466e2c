//! SHA256 double-hashing and block hash handling.

use core::fmt;
use core::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// Litecoin-family chains identify headers by this hash even though their
/// proof of work uses a different function.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Reverse the byte order of a 32-byte array.
///
/// Hashes are displayed in reverse byte order (little-endian display).
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Errors from parsing a displayed block hash.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HashParseError {
    #[error("invalid hash hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("hash must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A block header hash in internal byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// The all-zero hash, used as the previous hash of a genesis header.
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Wrap raw bytes already in internal byte order.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        BlockHash(bytes)
    }

    /// Hash serialized header bytes.
    pub fn hash(data: &[u8]) -> Self {
        BlockHash(double_sha256(data))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a hash given in display (reversed) order.
    pub fn from_display_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s.trim())?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(bytes.len()))?;
        Ok(BlockHash(reverse_bytes(&bytes)))
    }

    /// Hex string in display (reversed) order.
    pub fn to_display_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.0))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_display_hex())
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockHash::from_display_hex(s)
    }
}
