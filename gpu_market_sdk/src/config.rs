use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::Address;

/// Arbiter of every listing deployed by this client.
pub const DEFAULT_ARBITER: &str = "0x32Ce567764bE7395aE8B6Ba2Bf90870d4762D0dB";
/// Approvals needed to finalize a release or refund.
pub const DEFAULT_QUORUM: u32 = 2;
pub const DEFAULT_COMMISSION_PERCENT: u8 = 1;
pub const DEFAULT_BENCHMARK_DELAY_MS: u64 = 3_000;

pub const ENV_ARBITER: &str = "GPU_MARKET_ARBITER";
pub const ENV_MAPS_KEY: &str = "GPU_MARKET_MAPS_KEY";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Target network, in the shape wallets expect for `wallet_addEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkConfig {
    pub fn sepolia() -> Self {
        Self {
            chain_id: "0xaa36a7".to_string(),
            chain_name: "Sepolia Test Network".to_string(),
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            native_currency: NativeCurrency {
                name: "SepoliaETH".to_string(),
                symbol: "SEP".to_string(),
                decimals: 18,
            },
            block_explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
        }
    }

    /// Explorer link for an address, if the network has an explorer.
    pub fn explorer_address_url(&self, address: &Address) -> Option<String> {
        self.block_explorer_urls
            .first()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::sepolia()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub arbiter: Address,
    pub network: NetworkConfig,
    pub commission_percent: u8,
    pub quorum: u32,
    pub benchmark_delay_ms: u64,
    pub maps_api_key: Option<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            arbiter: Address::parse(DEFAULT_ARBITER).unwrap_or_else(|_| Address::zero()),
            network: NetworkConfig::default(),
            commission_percent: DEFAULT_COMMISSION_PERCENT,
            quorum: DEFAULT_QUORUM,
            benchmark_delay_ms: DEFAULT_BENCHMARK_DELAY_MS,
            maps_api_key: None,
        }
    }
}

impl MarketConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let cfg: MarketConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Applies `GPU_MARKET_ARBITER` and `GPU_MARKET_MAPS_KEY` when set.
    pub fn with_env_overrides(self) -> Result<Self, Error> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        if let Some(arbiter) = lookup(ENV_ARBITER) {
            self.arbiter = Address::parse(&arbiter)?;
        }
        if let Some(key) = lookup(ENV_MAPS_KEY).filter(|k| !k.is_empty()) {
            self.maps_api_key = Some(key);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.quorum == 0 {
            return Err(Error::Config("quorum must be at least 1".into()));
        }
        if self.commission_percent > 100 {
            return Err(Error::Config("commission_percent must be <= 100".into()));
        }
        if !self.network.chain_id.starts_with("0x") {
            return Err(Error::Config(format!(
                "chain id {} must be hex",
                self.network.chain_id
            )));
        }
        Ok(())
    }

    pub fn is_arbiter(&self, account: &Address) -> bool {
        &self.arbiter == account
    }
}
