use std::{collections::BTreeMap, env, path::PathBuf};

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;

use crate::{
    compiler::{CompilerError, CompilerSpec},
    object::Network,
};

pub const SEPOLIA_NETWORK: &str = "sepolia";
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
/// Keyless public endpoint, provider URLs with embedded keys belong in `SEPOLIA_URL`
pub const DEFAULT_SEPOLIA_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const SOLIDITY_VERSION: &str = "0.8.24";

pub const SEPOLIA_URL_VAR: &str = "SEPOLIA_URL";
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";
pub const ETHERSCAN_API_KEY_VAR: &str = "ETHERSCAN_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),
    #[error("invalid credential in {0}: {1}")]
    InvalidCredential(&'static str, String),
    #[error("invalid rpc url in {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error(transparent)]
    Compiler(#[from] CompilerError),
}

/// A signing account, the key never leaves the `SecretString`
#[derive(Debug, Clone)]
pub struct Account {
    address: Address,
    key: SecretString,
}

impl Account {
    pub fn from_private_key(source: &'static str, key: &str) -> Result<Self, ConfigError> {
        let trimmed = key.trim();
        let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes =
            hex::decode(hex_key).map_err(|e| ConfigError::InvalidCredential(source, e.to_string()))?;
        if bytes.len() != 32 {
            return Err(ConfigError::InvalidCredential(
                source,
                format!("expected 32 bytes, got {}", bytes.len()),
            ));
        }
        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
            .map_err(|e| ConfigError::InvalidCredential(source, e.to_string()))?;
        Ok(Account {
            address: signer.address(),
            key: SecretString::new(hex_key.to_string()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn expose_key(&self) -> &str {
        self.key.expose_secret()
    }
}

#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub name: String,
    pub url: Url,
    pub chain_id: Option<u64>,
    pub accounts: Vec<Account>,
}

impl NetworkProfile {
    /// The account that signs deployment transactions
    pub fn deployer(&self) -> Result<&Account, ConfigError> {
        self.accounts
            .first()
            .ok_or(ConfigError::MissingCredential(PRIVATE_KEY_VAR))
    }
}

#[derive(Debug, Clone, Default)]
pub struct EtherscanConfig {
    api_key: Option<SecretString>,
}

impl EtherscanConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .ok_or(ConfigError::MissingCredential(ETHERSCAN_API_KEY_VAR))
    }
}

/// Project layout, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub artifacts: PathBuf,
    pub deployments: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        ProjectPaths {
            artifacts: root.join("artifacts"),
            deployments: root.join("deployments"),
            root,
        }
    }

    /// Artifacts record sources relative to the project root, e.g. `contracts/EcommerceEscrow.sol`
    pub fn source(&self, source_name: &str) -> PathBuf {
        self.root.join(source_name)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub solidity: CompilerSpec,
    pub networks: BTreeMap<String, NetworkProfile>,
    pub etherscan: EtherscanConfig,
}

impl ProjectConfig {
    /// Load configuration from environment variables, `.env` included
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // empty values count as unset
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let private_key =
            lookup(PRIVATE_KEY_VAR).ok_or(ConfigError::MissingCredential(PRIVATE_KEY_VAR))?;
        let account = Account::from_private_key(PRIVATE_KEY_VAR, &private_key)?;

        let url = lookup(SEPOLIA_URL_VAR).unwrap_or_else(|| DEFAULT_SEPOLIA_URL.to_string());
        let url = parse_rpc_url(SEPOLIA_URL_VAR, url.trim())?;

        let sepolia = NetworkProfile {
            name: SEPOLIA_NETWORK.to_string(),
            url,
            chain_id: Some(SEPOLIA_CHAIN_ID),
            accounts: vec![account],
        };

        Ok(ProjectConfig {
            solidity: CompilerSpec::parse(SOLIDITY_VERSION)?,
            networks: BTreeMap::from([(sepolia.name.clone(), sepolia)]),
            etherscan: EtherscanConfig {
                api_key: lookup(ETHERSCAN_API_KEY_VAR).map(SecretString::new),
            },
        })
    }

    pub fn network(&self, name: &str) -> Result<&NetworkProfile, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    /// Resolve a `--network` value, custom urls sign with the configured accounts
    pub fn resolve(&self, network: &Network) -> Result<NetworkProfile, ConfigError> {
        match network {
            Network::Named(name) => self.network(name).cloned(),
            Network::Custom(url) => {
                let accounts = self
                    .networks
                    .values()
                    .next()
                    .map(|profile| profile.accounts.clone())
                    .unwrap_or_default();
                if accounts.is_empty() {
                    return Err(ConfigError::MissingCredential(PRIVATE_KEY_VAR));
                }
                Ok(NetworkProfile {
                    name: network.record_key(),
                    url: url.clone(),
                    chain_id: None,
                    accounts,
                })
            }
        }
    }

    /// Printable view of the configuration with every secret redacted
    pub fn summary(&self) -> serde_json::Value {
        let networks: serde_json::Map<String, serde_json::Value> = self
            .networks
            .iter()
            .map(|(name, profile)| {
                let accounts: Vec<String> = profile
                    .accounts
                    .iter()
                    .map(|account| account.address().to_string())
                    .collect();
                (
                    name.clone(),
                    json!({
                        "url": redact_url(&profile.url),
                        "chainId": profile.chain_id,
                        "accounts": accounts,
                    }),
                )
            })
            .collect();
        let api_key = if self.etherscan.has_api_key() {
            "<set>"
        } else {
            "<unset>"
        };
        json!({
            "solidity": self.solidity.to_string(),
            "networks": networks,
            "etherscan": { "apiKey": api_key },
        })
    }
}

fn parse_rpc_url(source: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url: Url = value
        .parse()
        .map_err(|e: url::ParseError| ConfigError::InvalidUrl(source, e.to_string()))?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        scheme => Err(ConfigError::InvalidUrl(
            source,
            format!("unsupported scheme `{scheme}`"),
        )),
    }
}

/// Providers put API keys in the path or query, only scheme and authority are shown
pub fn redact_url(url: &Url) -> String {
    let mut shown = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        shown.push_str(&format!(":{port}"));
    }
    let has_secret_parts = !url.path().trim_matches('/').is_empty()
        || url.query().is_some()
        || !url.username().is_empty()
        || url.password().is_some();
    if has_secret_parts {
        shown.push_str("/***");
    }
    shown
}
