use std::fmt::Display;

use alloy_primitives::{Address, B256};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Named(String),
    Custom(Url),
}

impl Network {
    /// Directory-safe name used to key deployment records
    pub fn record_key(&self) -> String {
        match self {
            Network::Named(name) => name.clone(),
            Network::Custom(url) => {
                let host = url.host_str().unwrap_or("unknown");
                match url.port() {
                    Some(port) => format!("custom-{host}-{port}"),
                    None => format!("custom-{host}"),
                }
            }
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Named(name) => write!(f, "{}", name),
            Network::Custom(url) => write!(f, "{}", url),
        }
    }
}

impl TryFrom<String> for Network {
    type Error = eyre::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.starts_with("http://") || value.starts_with("https://") {
            return Ok(Network::Custom(value.parse()?));
        }
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(eyre::eyre!("invalid network `{value}`"));
        }
        Ok(Network::Named(value))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ListMode {
    All,
    Latest,
}

impl TryFrom<String> for ListMode {
    type Error = eyre::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "all" => Ok(ListMode::All),
            "latest" => Ok(ListMode::Latest),
            _ => Err(eyre::eyre!("invalid list mode")),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub module: String,
    pub future_id: String,
    pub contract_name: String,
    pub date: String,
    pub network: String,
    pub chain_id: Option<u64>,
    pub address: Address,
    pub tx_hash: B256,
    pub bytecode_hash: Option<B256>,
    pub deployer: Address,
    // Not written by the tool, edit <module>.json by hand to leave notes for teammates
    #[serde(default)]
    pub comment: Option<String>,
}
