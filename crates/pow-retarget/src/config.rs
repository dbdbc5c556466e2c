//! Selecting consensus parameters from configuration.
//!
//! A config either names one of the built-in networks or spells out custom
//! retargeting values:
//!
//! ```json
//! { "network": "testnet" }
//! { "interval": 2016, "target_timespan": 1209600, "max_bits": 486604799 }
//! ```

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::compact;
use crate::network::Network;
use crate::params::{Checkpoints, ConfigError, ConsensusParams, RetargetInterval};

/// Retargeting values for a network that is not built in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomParams {
    /// Blocks per retarget period; absent disables retargeting.
    #[serde(default)]
    pub interval: Option<NonZeroU32>,
    pub target_timespan: u32,
    /// Overrides the spacing derived from timespan and interval.
    #[serde(default)]
    pub target_spacing: Option<u32>,
    /// Easiest allowed target in compact form.
    pub max_bits: u32,
    #[serde(default)]
    pub allow_min_difficulty_blocks: bool,
    /// (height, display hash) pairs.
    #[serde(default)]
    pub checkpoints: Vec<(u32, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainConfig {
    Named { network: Network },
    Custom(CustomParams),
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig::Named {
            network: Network::default(),
        }
    }
}

impl ChainConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the validated parameters this config describes.
    pub fn build(&self) -> Result<ConsensusParams, ConfigError> {
        match self {
            ChainConfig::Named { network } => ConsensusParams::for_network(*network),
            ChainConfig::Custom(custom) => {
                let interval = custom
                    .interval
                    .map_or(RetargetInterval::Disabled, RetargetInterval::Blocks);
                let max_target = compact::decode(custom.max_bits);
                let mut params = ConsensusParams::custom(
                    interval,
                    custom.target_timespan,
                    max_target,
                    custom.allow_min_difficulty_blocks,
                )?;
                if let Some(spacing) = custom.target_spacing {
                    params = params.with_target_spacing(spacing)?;
                }

                let table: Vec<(u32, &str)> = custom
                    .checkpoints
                    .iter()
                    .map(|(height, hash)| (*height, hash.as_str()))
                    .collect();
                Ok(params.with_checkpoints(Checkpoints::from_table(&table)?))
            }
        }
    }
}
