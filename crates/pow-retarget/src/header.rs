//! Block header model and the stored-header view used by the header store.

use num_bigint::BigUint;

use crate::compact;
use crate::hash::BlockHash;

/// Block version with BIP9 versionbits signaling.
pub const BLOCK_VERSION: i32 = 0x20000000;

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// A block header (80 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version.
    pub version: i32,
    /// Hash of the previous block.
    pub prev_block_hash: BlockHash,
    /// Merkle root of all transactions.
    pub merkle_root: BlockHash,
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    /// Nonce for proof of work.
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with the default version and a zero nonce.
    pub fn new(
        prev_block_hash: BlockHash,
        merkle_root: BlockHash,
        timestamp: u32,
        bits: u32,
    ) -> Self {
        BlockHeader {
            version: BLOCK_VERSION,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];

        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        header[36..68].copy_from_slice(self.merkle_root.as_bytes());
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());

        header
    }

    /// Compute the block hash (double SHA256 of the serialized header).
    pub fn hash(&self) -> BlockHash {
        BlockHash::hash(&self.serialize())
    }

    /// Get the target as a full integer.
    pub fn target(&self) -> BigUint {
        compact::decode(self.bits)
    }

    /// Work contributed by this header.
    pub fn work(&self) -> BigUint {
        compact::work(self.bits)
    }
}

/// A header accepted into the chain, with its position and cumulative work.
///
/// The hash is computed once on construction. Fields are read-only so the
/// cached hash cannot drift from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHeader {
    header: BlockHeader,
    hash: BlockHash,
    height: u32,
    chain_work: BigUint,
}

impl StoredHeader {
    /// Wrap a header at an arbitrary height, e.g. a checkpoint the store was seeded from.
    pub fn new(header: BlockHeader, height: u32, chain_work: BigUint) -> Self {
        let hash = header.hash();
        StoredHeader {
            header,
            hash,
            height,
            chain_work,
        }
    }

    /// Height zero, work of the header alone.
    pub fn genesis(header: BlockHeader) -> Self {
        let work = header.work();
        StoredHeader::new(header, 0, work)
    }

    /// The stored form of `header` when it extends this one.
    ///
    /// Heights saturate at `u32::MAX`.
    pub fn build_next(&self, header: BlockHeader) -> Self {
        let chain_work = &self.chain_work + header.work();
        StoredHeader::new(header, self.height.saturating_add(1), chain_work)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn prev_hash(&self) -> BlockHash {
        self.header.prev_block_hash
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn time(&self) -> u32 {
        self.header.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.header.bits
    }

    pub fn chain_work(&self) -> &BigUint {
        &self.chain_work
    }
}
