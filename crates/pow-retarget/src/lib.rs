//! Proof-of-work difficulty retargeting for Litecoin-family header chains.
//!
//! This crate provides pure Rust implementations of:
//! - Compact "bits" target encoding and decoding
//! - Block header hashing and the stored-header model
//! - Per-network consensus parameters with genesis validation
//! - A read-only header store interface with bounded ancestor walks
//! - Verification that a candidate header carries the required difficulty
//!
//! Typical use builds the parameters once at startup and checks each header
//! before it is admitted to the chain:
//!
//! ```no_run
//! use pow_retarget::{verify, BlockHeader, ConsensusParams, MemoryHeaderStore, StoredHeader};
//!
//! # fn check(prev: &StoredHeader, next: &BlockHeader, store: &MemoryHeaderStore)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let params = ConsensusParams::mainnet()?;
//! verify(prev, next, store, &params)?;
//! # Ok(())
//! # }
//! ```

pub mod compact;
pub mod config;
pub mod hash;
pub mod header;
pub mod network;
pub mod params;
pub mod retarget;
pub mod store;

pub use config::ChainConfig;
pub use hash::{double_sha256, BlockHash, HashParseError};
pub use header::{BlockHeader, StoredHeader};
pub use network::Network;
pub use params::{Checkpoints, ConfigError, ConsensusParams, RetargetInterval};
pub use retarget::{verify, DifficultyDecision, DifficultyError, RetargetEngine};
pub use store::{Ancestors, HeaderStore, MemoryHeaderStore};
