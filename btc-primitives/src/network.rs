//! Per-network constants: wire magic, address version bytes, proof-of-work
//! limits, and the genesis header each chain starts from.

use serde::{Deserialize, Serialize};

use crate::block::Header;
use crate::u256::U256;

const MAINNET_GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
const TESTNET_GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff001d1aa4ae18";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// The four magic bytes that open every P2P frame.
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet => [0x0b, 0x11, 0x09, 0x07],
        }
    }

    /// Base58Check version byte for P2PKH addresses.
    pub fn address_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
        }
    }

    /// The compact-bits form of the easiest target the network accepts.
    pub fn pow_limit_bits(self) -> u32 {
        0x1d00_ffff
    }

    pub fn pow_limit(self) -> U256 {
        U256::from_compact_bits(self.pow_limit_bits())
    }

    /// Testnet allows minimum-difficulty blocks after 20 minutes of
    /// silence, which makes its bits sequence non-deterministic for a
    /// header-only client.
    pub fn allows_min_difficulty(self) -> bool {
        matches!(self, Network::Testnet)
    }

    pub fn genesis_header(self) -> Header {
        let hex = match self {
            Network::Mainnet => MAINNET_GENESIS_HEX,
            Network::Testnet => TESTNET_GENESIS_HEX,
        };
        let bytes = hex::decode(hex).expect("genesis constants are valid hex");
        Header::parse(&mut bytes.as_slice()).expect("genesis constants are valid headers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_ids() {
        assert_eq!(
            Network::Mainnet.genesis_header().id(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(
            Network::Testnet.genesis_header().id(),
            "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
        );
    }

    #[test]
    fn genesis_meets_its_own_target() {
        for network in [Network::Mainnet, Network::Testnet] {
            assert!(network.genesis_header().check_pow());
        }
    }

    #[test]
    fn serde_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Network::Mainnet).unwrap(), "\"mainnet\"");
        let parsed: Network = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(parsed, Network::Testnet);
    }
}
