//! Per-network consensus parameters for difficulty retargeting.
//!
//! A [`ConsensusParams`] is built once at startup and passed by reference to
//! every verification call. Nothing in it changes after construction.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use log::debug;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compact;
use crate::hash::{BlockHash, HashParseError};
use crate::header::BlockHeader;
use crate::network::{
    Network, GENESIS_MERKLE_ROOT, GENESIS_VERSION, INTERVAL, TARGET_SPACING, TARGET_TIMESPAN,
};

/// Errors raised while building consensus parameters.
///
/// These indicate a build or configuration defect and should abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("genesis header of {network} hashes to {computed}, expected {expected}")]
    InvalidGenesis {
        network: String,
        expected: BlockHash,
        computed: BlockHash,
    },
    #[error("invalid consensus parameter: {0}")]
    InvalidParameter(&'static str),
    #[error(transparent)]
    InvalidHash(#[from] HashParseError),
    #[error("invalid chain config: {0}")]
    Json(#[from] serde_json::Error),
}

/// How often the difficulty is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetargetInterval {
    /// Retarget every `n` blocks.
    Blocks(NonZeroU32),
    /// Never retarget; the interval is effectively infinite.
    Disabled,
}

impl RetargetInterval {
    /// Interval of `blocks`, or `None` when zero.
    pub fn every(blocks: u32) -> Option<Self> {
        NonZeroU32::new(blocks).map(RetargetInterval::Blocks)
    }

    pub fn blocks(&self) -> Option<u32> {
        match self {
            RetargetInterval::Blocks(n) => Some(n.get()),
            RetargetInterval::Disabled => None,
        }
    }

    /// Whether the header after `prev_height` is a retarget boundary.
    pub fn is_boundary(&self, prev_height: u32) -> bool {
        match self {
            RetargetInterval::Blocks(n) => (u64::from(prev_height) + 1) % u64::from(n.get()) == 0,
            RetargetInterval::Disabled => false,
        }
    }

    /// Whether `height` opens a retarget period.
    pub fn is_period_start(&self, height: u32) -> bool {
        match self {
            RetargetInterval::Blocks(n) => height % n.get() == 0,
            RetargetInterval::Disabled => height == 0,
        }
    }
}

/// Immutable height -> hash checkpoint table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoints(BTreeMap<u32, BlockHash>);

impl Checkpoints {
    /// Build from (height, display hash) literals.
    pub fn from_table(table: &[(u32, &str)]) -> Result<Self, HashParseError> {
        table
            .iter()
            .map(|&(height, hash)| BlockHash::from_display_hex(hash).map(|hash| (height, hash)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Checkpoints)
    }

    pub fn get(&self, height: u32) -> Option<&BlockHash> {
        self.0.get(&height)
    }

    /// A header passes unless a checkpoint at its height names a different hash.
    pub fn passes(&self, height: u32, hash: &BlockHash) -> bool {
        self.0.get(&height).map_or(true, |expected| expected == hash)
    }

    /// Highest checkpoint at or below `height`.
    pub fn last_at_or_below(&self, height: u32) -> Option<(u32, &BlockHash)> {
        self.0.range(..=height).next_back().map(|(h, hash)| (*h, hash))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BlockHash)> {
        self.0.iter().map(|(h, hash)| (*h, hash))
    }
}

/// Consensus parameters that drive difficulty verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusParams {
    network: Option<Network>,
    interval: RetargetInterval,
    target_timespan: u32,
    target_spacing: u32,
    max_target: BigUint,
    max_bits: u32,
    allow_min_difficulty_blocks: bool,
    genesis: Option<BlockHeader>,
    checkpoints: Checkpoints,
}

impl ConsensusParams {
    /// Parameters not tied to a named network.
    ///
    /// The target spacing is derived as `target_timespan / interval`. With
    /// retargeting disabled it defaults to the network spacing; use
    /// [`ConsensusParams::with_target_spacing`] to override.
    pub fn custom(
        interval: RetargetInterval,
        target_timespan: u32,
        max_target: BigUint,
        allow_min_difficulty_blocks: bool,
    ) -> Result<Self, ConfigError> {
        if target_timespan == 0 {
            return Err(ConfigError::InvalidParameter("target timespan must be positive"));
        }
        if max_target.is_zero() {
            return Err(ConfigError::InvalidParameter("max target must be positive"));
        }
        let target_spacing = match interval.blocks() {
            Some(blocks) => target_timespan / blocks,
            None => TARGET_SPACING,
        };
        if target_spacing == 0 {
            return Err(ConfigError::InvalidParameter("interval exceeds target timespan"));
        }

        Ok(ConsensusParams {
            network: None,
            interval,
            target_timespan,
            target_spacing,
            max_bits: compact::encode(&max_target),
            max_target,
            allow_min_difficulty_blocks,
            genesis: None,
            checkpoints: Checkpoints::default(),
        })
    }

    /// Build and validate the parameters of a named network.
    pub fn for_network(network: Network) -> Result<Self, ConfigError> {
        let (interval, max_target, allow_min_difficulty_blocks) = match network {
            Network::Mainnet => (
                RetargetInterval::every(INTERVAL),
                compact::decode(0x1e0fffff),
                false,
            ),
            Network::Testnet => (
                RetargetInterval::every(INTERVAL),
                compact::decode(0x1e0fffff),
                true,
            ),
            Network::Regtest => (
                Some(RetargetInterval::Disabled),
                (BigUint::one() << 255usize) - BigUint::one(),
                false,
            ),
        };
        let interval =
            interval.ok_or(ConfigError::InvalidParameter("interval must be positive"))?;

        let spec = network.genesis();
        let genesis = BlockHeader::new(
            BlockHash::ZERO,
            GENESIS_MERKLE_ROOT.parse()?,
            spec.timestamp,
            spec.bits,
        )
        .with_version(GENESIS_VERSION)
        .with_nonce(spec.nonce);

        let mut params = ConsensusParams::custom(
            interval,
            TARGET_TIMESPAN,
            max_target,
            allow_min_difficulty_blocks,
        )?
        .with_target_spacing(TARGET_SPACING)?;
        params.network = Some(network);
        params.checkpoints = Checkpoints::from_table(network.checkpoint_table())?;
        let params = params.with_genesis(genesis, spec.hash.parse()?)?;

        debug!(
            "Built consensus params for {}: interval {:?}, max bits {:08x}",
            network, params.interval, params.max_bits
        );
        Ok(params)
    }

    pub fn mainnet() -> Result<Self, ConfigError> {
        ConsensusParams::for_network(Network::Mainnet)
    }

    pub fn testnet() -> Result<Self, ConfigError> {
        ConsensusParams::for_network(Network::Testnet)
    }

    pub fn regtest() -> Result<Self, ConfigError> {
        ConsensusParams::for_network(Network::Regtest)
    }

    pub fn with_target_spacing(mut self, target_spacing: u32) -> Result<Self, ConfigError> {
        if target_spacing == 0 {
            return Err(ConfigError::InvalidParameter("target spacing must be positive"));
        }
        self.target_spacing = target_spacing;
        Ok(self)
    }

    /// Anchor the parameters to a genesis header whose hash must equal `expected`.
    pub fn with_genesis(
        mut self,
        genesis: BlockHeader,
        expected: BlockHash,
    ) -> Result<Self, ConfigError> {
        let computed = genesis.hash();
        if computed != expected {
            return Err(ConfigError::InvalidGenesis {
                network: self.network.map_or_else(|| "custom".to_string(), |n| n.to_string()),
                expected,
                computed,
            });
        }
        self.genesis = Some(genesis);
        Ok(self)
    }

    pub fn with_checkpoints(mut self, checkpoints: Checkpoints) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// The named network, `None` for custom parameters.
    pub fn network(&self) -> Option<Network> {
        self.network
    }

    pub fn interval(&self) -> RetargetInterval {
        self.interval
    }

    pub fn target_timespan(&self) -> u32 {
        self.target_timespan
    }

    pub fn target_spacing(&self) -> u32 {
        self.target_spacing
    }

    /// Easiest allowed target.
    pub fn max_target(&self) -> &BigUint {
        &self.max_target
    }

    /// Compact form of the easiest allowed target.
    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    pub fn allow_min_difficulty_blocks(&self) -> bool {
        self.allow_min_difficulty_blocks
    }

    /// Block-time gap after which a minimum-difficulty header is allowed.
    pub fn min_difficulty_gap(&self) -> u64 {
        u64::from(self.target_spacing) * 2
    }

    /// Bounds applied to the measured timespan of a retarget period.
    pub fn timespan_bounds(&self) -> (i64, i64) {
        let timespan = i64::from(self.target_timespan);
        (timespan / 4, timespan * 4)
    }

    pub fn genesis(&self) -> Option<&BlockHeader> {
        self.genesis.as_ref()
    }

    pub fn genesis_hash(&self) -> Option<BlockHash> {
        self.genesis.as_ref().map(BlockHeader::hash)
    }

    pub fn checkpoints(&self) -> &Checkpoints {
        &self.checkpoints
    }
}
