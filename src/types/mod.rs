pub mod core_node;
pub mod db;

pub use core_node::*;
pub use db::*;

/// Network a node reports for, keyed by its chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ChainId {
    Mainnet,
    Testnet,
}

impl ChainId {
    pub const MAINNET_ID: u32 = 0x0000_0001;
    pub const TESTNET_ID: u32 = 0x8000_0000;

    pub fn from_u32(id: u32) -> Option<ChainId> {
        match id {
            ChainId::MAINNET_ID => Some(ChainId::Mainnet),
            ChainId::TESTNET_ID => Some(ChainId::Testnet),
            _ => None,
        }
    }

    /// Accepts `0x`-prefixed hex (`0x80000000`) or decimal input
    pub fn from_str_id(id: &str) -> Result<ChainId, String> {
        let id = id.trim();
        let value = match id.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => id.parse::<u32>(),
        }
        .map_err(|e| format!("invalid chain id '{}': {}", id, e))?;
        ChainId::from_u32(value).ok_or(format!("unsupported chain id '{}'", id))
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            ChainId::Mainnet => ChainId::MAINNET_ID,
            ChainId::Testnet => ChainId::TESTNET_ID,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, ChainId::Mainnet)
    }
}
