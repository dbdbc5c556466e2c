//! Litecoin-family network definitions and constants.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Public test network with the minimum-difficulty relaxation
    Testnet,
    /// Regression test mode; difficulty never changes
    Regtest,
}

/// Parameters of a network's hardcoded genesis header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisSpec {
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Documented hash in display order.
    pub hash: &'static str,
}

/// Merkle root shared by every genesis header (display order).
pub const GENESIS_MERKLE_ROOT: &str =
    "97ddfbbae6be97fd6cdf3e7ca13232a3afff2353e29badfab7f73011edd4ced9";

/// Version of the genesis headers.
pub const GENESIS_VERSION: i32 = 1;

/// Ideal seconds between blocks (2.5 minutes).
pub const TARGET_SPACING: u32 = 150;

/// Ideal seconds per retarget interval (3.5 days).
pub const TARGET_TIMESPAN: u32 = 302_400;

/// Blocks per retarget interval.
pub const INTERVAL: u32 = TARGET_TIMESPAN / TARGET_SPACING;

/// Coinbase maturity - blocks before coinbase can be spent.
pub const SPENDABLE_COINBASE_DEPTH: u32 = 100;

/// Scheme part for payment URIs.
pub const URI_SCHEME: &str = "litecoin";

const MAINNET_CHECKPOINTS: &[(u32, &str)] = &[
    (1500, "841a2965955dd288cfa707a755d05a54e45f8bd476835ec9af4402a2b59a2967"),
    (4032, "9ce90e427198fc0ef05e5905ce3503725b80e26afd35a987965fd7e3d9cf0846"),
    (8064, "eb984353fc5190f210651f150c40b8a4bab9eeeff0b729fcb3987da694430d70"),
    (16128, "602edf1859b7f9a6af809f1d9b0e6cb66fdc1d4d9dcd7a4bec03e12a1ccd153d"),
    (23420, "d80fdf9ca81afd0bd2b2a90ac3a9fe547da58f2530ec874e978fce0b5101b507"),
    (50000, "69dc37eb029b68f075a5012dcc0419c127672adb4f3a32882b2b3e71d07a20a6"),
    (80000, "4fcb7c02f676a300503f49c764a89955a8f920b46a8cbecb4867182ecdb2e90a"),
    (120000, "bd9d26924f05f6daa7f0155f32828ec89e8e29cee9e7121b026a7a3552ac6131"),
    (161500, "dbe89880474f4bb4f75c227c77ba1cdc024991123b28b8418dbbf7798471ff43"),
    (179620, "2ad9c65c990ac00426d18e446e0fd7be2ffa69e9a7dcb28358a50b2b78b9f709"),
    (240000, "7140d1c4b4c2157ca217ee7636f24c9c73db39c4590c4e6eab2e3ea1555088aa"),
    (383640, "2b6809f094a9215bafc65eb3f110a35127a34be94b7d0590a096c3f126c6f364"),
    (409004, "487518d663d9f1fa08611d9395ad74d982b667fbdc0e77e9cf39b4f1355908a3"),
    (456000, "bf34f71cc6366cd487930d06be22f897e34ca6a40501ac7d401be32456372004"),
    (541794, "1cbccbe6920e7c258bbce1f26211084efb19764aa3224bec3f4320d77d6a2fd2"),
    (585010, "ea9ea06840de20a18a66acb07c9102ee6374ad2cbafc71794e576354fea5df2d"),
    (638902, "15238656e8ec63d28de29a8c75fcf3a5819afc953dcd9cc45cecc53baec74f38"),
];

const TESTNET_CHECKPOINTS: &[(u32, &str)] = &[
    (2056, "17748a31ba97afdc9a4f86837a39d287e3e7c7290a08a1d816c5969c78a83289"),
];

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Regtest];

    /// Stable identifier of the network.
    pub fn id(&self) -> &'static str {
        match self {
            Network::Mainnet => "org.litecoin.production",
            Network::Testnet => "org.litecoin.test",
            Network::Regtest => "org.litecoin.regtest",
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Get display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mainnet => "Litecoin Mainnet",
            Network::Testnet => "Litecoin Testnet",
            Network::Regtest => "Litecoin Regtest",
        }
    }

    /// Get the version byte for P2PKH addresses.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 48,
            Network::Testnet | Network::Regtest => 111,
        }
    }

    /// Get the version byte for P2SH addresses.
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 5,
            Network::Testnet | Network::Regtest => 196,
        }
    }

    /// Version byte of dumped (WIF) private keys.
    pub fn dumped_private_key_version(&self) -> u8 {
        match self {
            Network::Mainnet => 128,
            Network::Testnet | Network::Regtest => 239,
        }
    }

    /// BIP32 extended public key header.
    pub fn bip32_public_header(&self) -> u32 {
        match self {
            Network::Mainnet => 0x0488_B21E,
            Network::Testnet | Network::Regtest => 0x0435_87CF,
        }
    }

    /// BIP32 extended private key header.
    pub fn bip32_private_header(&self) -> u32 {
        match self {
            Network::Mainnet => 0x0488_ADE4,
            Network::Testnet | Network::Regtest => 0x0435_8394,
        }
    }

    /// Get the default P2P port for this network.
    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => 9333,
            Network::Testnet => 19335,
            Network::Regtest => 19444,
        }
    }

    /// Magic bytes prefixing every P2P message.
    pub fn packet_magic(&self) -> u32 {
        match self {
            Network::Mainnet => 0xfbc0_b6db,
            Network::Testnet => 0xfdd2_c8f1,
            Network::Regtest => 0xfabf_b5da,
        }
    }

    pub fn dns_seeds(&self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => &[
                "dnsseed.litecointools.com",
                "dnsseed.litecoinpool.org",
                "dnsseed.koin-project.com",
            ],
            Network::Testnet => &["testnet-seed.litecointools.com"],
            Network::Regtest => &[],
        }
    }

    /// Blocks between subsidy halvings.
    pub fn subsidy_halving_interval(&self) -> u32 {
        match self {
            Network::Mainnet => 840_000,
            Network::Testnet => 210_000,
            Network::Regtest => 150,
        }
    }

    /// Calculate block subsidy in base units for a given height.
    ///
    /// The subsidy starts at 50 coins and halves every halving interval.
    pub fn block_subsidy(&self, height: u32) -> u64 {
        let halvings = height / self.subsidy_halving_interval();
        if halvings >= 64 {
            return 0;
        }
        5_000_000_000u64 >> halvings
    }

    /// Height from which segwit rules are enforced, if scheduled.
    pub fn segwit_enforce_height(&self) -> Option<u32> {
        match self {
            Network::Mainnet => Some(481_824),
            Network::Testnet => Some(834_624),
            Network::Regtest => None,
        }
    }

    /// Whether segwit rules apply at the caller-supplied height.
    pub fn is_segwit_enforced(&self, height: u32) -> bool {
        self.segwit_enforce_height()
            .is_some_and(|activation| height >= activation)
    }

    /// The hardcoded genesis header parameters.
    pub fn genesis(&self) -> GenesisSpec {
        match self {
            Network::Mainnet => GenesisSpec {
                timestamp: 1317972665,
                bits: 0x1e0ffff0,
                nonce: 2084524493,
                hash: "12a765e31ffd4059bada1e25190f6e98c99d9714d334efa41a195a7e7e04bfe2",
            },
            Network::Testnet => GenesisSpec {
                timestamp: 1486949366,
                bits: 0x1e0ffff0,
                nonce: 293345,
                hash: "4966625a4b2851d9fdee139e56211a0d88575f59ed816ff5e6a63deb4e3e29a0",
            },
            Network::Regtest => GenesisSpec {
                timestamp: 1296688602,
                bits: 0x207fffff,
                nonce: 0,
                hash: "530827f38f93b43ed12af0b3ad25a288dc02ed74d6d7857862df51fc56c416f9",
            },
        }
    }

    /// Checkpoint table as (height, display hash) literals.
    pub fn checkpoint_table(&self) -> &'static [(u32, &'static str)] {
        match self {
            Network::Mainnet => MAINNET_CHECKPOINTS,
            Network::Testnet => TESTNET_CHECKPOINTS,
            Network::Regtest => &[],
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "litecoin" => Ok(Network::Mainnet),
            "testnet" | "test" | "testnet4" => Ok(Network::Testnet),
            "regtest" | "reg" => Ok(Network::Regtest),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}
