//! Configuration management for Asset Vault

use serde::Deserialize;
use std::env;

/// Default upper bound on an uploaded asset: 10MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    /// Allow synthetic `mock-ipfs-` addresses when the pinning service
    /// is unreachable or unconfigured. Off unless explicitly enabled.
    pub mock_fallback: bool,
}

impl StoreConfig {
    /// Both API keys are present and non-empty
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.api_key, &self.secret_key),
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub provider: LedgerProvider,
    pub url: Option<String>,
    pub contract_address: String,
    pub network: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerProvider {
    Memory,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                api_url: "https://api.pinata.cloud".to_string(),
                gateway_url: "https://gateway.pinata.cloud".to_string(),
                api_key: None,
                secret_key: None,
                mock_fallback: false,
            },
            ledger: LedgerConfig {
                provider: LedgerProvider::Memory,
                url: None,
                contract_address: "0x0000000000000000000000000000000000000000".to_string(),
                network: "local".to_string(),
            },
            limits: LimitsConfig {
                max_file_size: DEFAULT_MAX_FILE_SIZE,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        let provider = match env::var("LEDGER_PROVIDER")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "http" => LedgerProvider::Http,
            _ => LedgerProvider::Memory,
        };

        // An HTTP ledger without a gateway URL is a configuration error, not a default.
        let url = match provider {
            LedgerProvider::Http => Some(env::var("LEDGER_URL")?),
            LedgerProvider::Memory => env::var("LEDGER_URL").ok(),
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            store: StoreConfig {
                api_url: env::var("PINATA_API_URL").unwrap_or(defaults.store.api_url),
                gateway_url: env::var("IPFS_GATEWAY_URL").unwrap_or(defaults.store.gateway_url),
                api_key: env::var("PINATA_API_KEY").ok().filter(|k| !k.is_empty()),
                secret_key: env::var("PINATA_SECRET_KEY").ok().filter(|k| !k.is_empty()),
                mock_fallback: env::var("STORE_MOCK_FALLBACK")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(false),
            },
            ledger: LedgerConfig {
                provider,
                url,
                contract_address: env::var("LEDGER_CONTRACT_ADDRESS")
                    .unwrap_or(defaults.ledger.contract_address),
                network: env::var("LEDGER_NETWORK").unwrap_or(defaults.ledger.network),
            },
            limits: LimitsConfig {
                max_file_size: env::var("MAX_FILE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            },
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
