use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{ConstructionError, Result};
use crate::timeout::TimeoutConfig;
use crate::types::DepositParameters;

/// Cardano network IDs (address header nibble)
pub const MAINNET_NETWORK_ID: u8 = 1;
pub const TESTNET_NETWORK_ID: u8 = 0; // Preview/Preprod

/// Protocol magics
pub const MAINNET_NETWORK_MAGIC: u32 = 764_824_073;
pub const PREPROD_NETWORK_MAGIC: u32 = 1;
pub const PREVIEW_NETWORK_MAGIC: u32 = 2;

/// Rosetta blockchain name
pub const BLOCKCHAIN_NAME: &str = "cardano";

/// Lovelace is the smallest unit (1 ADA = 1,000,000 Lovelace)
pub const LOVELACE_PER_ADA: u64 = 1_000_000;
pub const ADA_SYMBOL: &str = "ADA";
pub const ADA_DECIMALS: u32 = 6;

/// Slots added to the tip when the caller gives no relative ttl
pub const DEFAULT_RELATIVE_TTL: u64 = 1000;

/// Deposits used when neither the caller nor the ledger supplies them
pub const DEFAULT_KEY_DEPOSIT: u64 = 2_000_000;
pub const DEFAULT_POOL_DEPOSIT: u64 = 500_000_000;

/// Cardano network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: u8,
    pub protocol_magic: u32,
    /// Rosetta network name (`mainnet`, `preprod`, `preview`)
    pub name: String,
    pub currency_symbol: String,
    pub decimals: u32,
}

impl NetworkConfig {
    /// Cardano Mainnet configuration
    pub fn mainnet() -> Self {
        NetworkConfig {
            network_id: MAINNET_NETWORK_ID,
            protocol_magic: MAINNET_NETWORK_MAGIC,
            name: "mainnet".to_string(),
            currency_symbol: ADA_SYMBOL.to_string(),
            decimals: ADA_DECIMALS,
        }
    }

    /// Cardano Preprod Testnet configuration
    pub fn preprod() -> Self {
        NetworkConfig {
            network_id: TESTNET_NETWORK_ID,
            protocol_magic: PREPROD_NETWORK_MAGIC,
            name: "preprod".to_string(),
            currency_symbol: ADA_SYMBOL.to_string(),
            decimals: ADA_DECIMALS,
        }
    }

    /// Cardano Preview Testnet configuration
    pub fn preview() -> Self {
        NetworkConfig {
            network_id: TESTNET_NETWORK_ID,
            protocol_magic: PREVIEW_NETWORK_MAGIC,
            name: "preview".to_string(),
            currency_symbol: ADA_SYMBOL.to_string(),
            decimals: ADA_DECIMALS,
        }
    }

    /// Look up a well-known network by its Rosetta name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "preprod" => Some(Self::preprod()),
            "preview" => Some(Self::preview()),
            _ => None,
        }
    }

    /// Check if mainnet
    pub fn is_mainnet(&self) -> bool {
        self.network_id == MAINNET_NETWORK_ID
    }
}

/// Settings for one construction engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionConfig {
    pub network: NetworkConfig,
    /// No ledger access; metadata and submit are refused
    #[serde(default)]
    pub offline: bool,
    #[serde(default = "default_relative_ttl")]
    pub default_relative_ttl: u64,
    /// Deposits assumed by preprocess and by parse of foreign certificates
    #[serde(default)]
    pub deposit_parameters: DepositParameters,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Base URL of a cardano-submit-api instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_api_url: Option<String>,
}

fn default_relative_ttl() -> u64 {
    DEFAULT_RELATIVE_TTL
}

impl ConstructionConfig {
    /// Creates a new configuration for the given network
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            offline: false,
            default_relative_ttl: DEFAULT_RELATIVE_TTL,
            deposit_parameters: DepositParameters::default(),
            timeouts: TimeoutConfig::default(),
            submit_api_url: None,
        }
    }

    /// Set offline mode
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Set the default relative ttl
    pub fn with_relative_ttl(mut self, slots: u64) -> Self {
        self.default_relative_ttl = slots;
        self
    }

    /// Set default deposit parameters
    pub fn with_deposit_parameters(mut self, deposits: DepositParameters) -> Self {
        self.deposit_parameters = deposits;
        self
    }

    /// Set the ledger lookup timeout
    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.with_ledger(timeout);
        self
    }

    /// Set the submission timeout
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.with_submit(timeout);
        self
    }

    /// Set the submit-api base URL
    pub fn with_submit_api_url(mut self, url: impl Into<String>) -> Self {
        self.submit_api_url = Some(url.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_relative_ttl == 0 {
            return Err(ConstructionError::ConfigurationError(
                "default relative ttl must be positive".to_string(),
            ));
        }
        if self.timeouts.ledger.is_zero() || self.timeouts.submit.is_zero() {
            return Err(ConstructionError::ConfigurationError(
                "timeouts must be positive".to_string(),
            ));
        }
        if let Some(url) = &self.submit_api_url {
            Url::parse(url).map_err(|e| {
                ConstructionError::ConfigurationError(format!("invalid submit api url {}: {}", url, e))
            })?;
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConstructionError::GeneralDeserializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self::new(NetworkConfig::mainnet())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_config() {
        let config = NetworkConfig::mainnet();
        assert_eq!(config.network_id, 1);
        assert_eq!(config.protocol_magic, 764824073);
        assert_eq!(config.currency_symbol, "ADA");
        assert_eq!(config.decimals, 6);
        assert!(config.is_mainnet());
    }

    #[test]
    fn test_testnet_configs() {
        let preprod = NetworkConfig::preprod();
        let preview = NetworkConfig::preview();
        assert_eq!(preprod.network_id, 0);
        assert_eq!(preprod.protocol_magic, 1);
        assert_eq!(preview.protocol_magic, 2);
        assert!(!preview.is_mainnet());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(NetworkConfig::from_name("preprod"), Some(NetworkConfig::preprod()));
        assert!(NetworkConfig::from_name("testnet-42").is_none());
    }

    #[test]
    fn test_construction_defaults() {
        let config = ConstructionConfig::default();
        assert!(!config.offline);
        assert_eq!(config.default_relative_ttl, 1000);
        assert_eq!(config.deposit_parameters.key_deposit, 2_000_000);
        assert_eq!(config.deposit_parameters.pool_deposit, 500_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_submit_url() {
        let config = ConstructionConfig::new(NetworkConfig::preview())
            .with_submit_api_url("not a url");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConstructionError::ConfigurationError(_)));
        assert!(!err.retriable());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ConstructionConfig::default().with_ledger_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConstructionError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "network": {
                "network_id": 0,
                "protocol_magic": 1,
                "name": "preprod",
                "currency_symbol": "ADA",
                "decimals": 6
            },
            "offline": true,
            "submit_api_url": "http://localhost:8090"
        }"#;
        let config = ConstructionConfig::from_json(json).unwrap();
        assert!(config.offline);
        assert_eq!(config.network, NetworkConfig::preprod());
        assert_eq!(config.default_relative_ttl, DEFAULT_RELATIVE_TTL);
    }
}
