use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{keccak256, Bytes, B256};
use serde_json::Value;

use crate::module::ContractStep;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact for `{0}` not found under {1}, compile the contracts first")]
    NotFound(String, PathBuf),
    #[error("malformed artifact {0}: {1}")]
    Malformed(PathBuf, String),
    #[error("`{0}` has no creation bytecode, abstract contracts and interfaces cannot be deployed")]
    EmptyBytecode(String),
    #[error("`{0}` links against libraries, which is not supported")]
    UnlinkedLibraries(String),
    #[error("`{step}` passes {given} constructor arguments but `{contract}` expects {expected}")]
    ArgumentMismatch {
        step: String,
        contract: String,
        expected: usize,
        given: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub contract_name: String,
    /// Source path relative to the project root, absent for Foundry outputs
    pub source_name: Option<String>,
    pub bytecode: Bytes,
    pub constructor_inputs: usize,
}

impl ContractArtifact {
    /// Locate `<name>.sol/<name>.json`, first under `contracts/` then anywhere in the artifacts tree
    pub fn load(artifacts_dir: &Path, contract_name: &str) -> Result<Self, ArtifactError> {
        let file_name = format!("{contract_name}.json");
        let dir_name = format!("{contract_name}.sol");
        let direct = artifacts_dir
            .join("contracts")
            .join(&dir_name)
            .join(&file_name);
        let path = if direct.is_file() {
            Some(direct)
        } else {
            find_artifact(artifacts_dir, &dir_name, &file_name)?
        };
        let path = path.ok_or_else(|| {
            ArtifactError::NotFound(contract_name.to_string(), artifacts_dir.to_path_buf())
        })?;
        let content = fs::read(&path)?;
        let json: Value = serde_json::from_slice(&content)
            .map_err(|e| ArtifactError::Malformed(path.clone(), e.to_string()))?;
        Self::from_json(contract_name, &json)
            .map_err(|e| match e {
                ArtifactError::Malformed(_, reason) => ArtifactError::Malformed(path, reason),
                other => other,
            })
    }

    pub fn from_json(contract_name: &str, json: &Value) -> Result<Self, ArtifactError> {
        let malformed = |reason: &str| ArtifactError::Malformed(PathBuf::new(), reason.to_string());
        // hardhat stores a string, foundry an object with the code under `object`
        let bytecode = match json.get("bytecode") {
            Some(Value::String(code)) => code.as_str(),
            Some(Value::Object(object)) => object
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("bytecode.object missing"))?,
            _ => return Err(malformed("bytecode missing")),
        };
        let has_links = json
            .get("linkReferences")
            .or_else(|| json.get("bytecode").and_then(|b| b.get("linkReferences")))
            .and_then(Value::as_object)
            .is_some_and(|links| !links.is_empty());
        if has_links {
            return Err(ArtifactError::UnlinkedLibraries(contract_name.to_string()));
        }
        let bytecode = bytecode.strip_prefix("0x").unwrap_or(bytecode);
        if bytecode.is_empty() {
            return Err(ArtifactError::EmptyBytecode(contract_name.to_string()));
        }
        let bytecode = hex::decode(bytecode).map_err(|e| malformed(&e.to_string()))?;

        let abi = json
            .get("abi")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("abi missing"))?;
        let constructor_inputs = abi
            .iter()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("constructor"))
            .and_then(|constructor| constructor.get("inputs"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        Ok(ContractArtifact {
            contract_name: json
                .get("contractName")
                .and_then(Value::as_str)
                .unwrap_or(contract_name)
                .to_string(),
            source_name: json
                .get("sourceName")
                .and_then(Value::as_str)
                .map(str::to_string),
            bytecode: bytecode.into(),
            constructor_inputs,
        })
    }

    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }

    pub fn check_arguments(&self, step: &ContractStep) -> Result<(), ArtifactError> {
        if step.constructor_args.len() != self.constructor_inputs {
            return Err(ArtifactError::ArgumentMismatch {
                step: step.id.clone(),
                contract: self.contract_name.clone(),
                expected: self.constructor_inputs,
                given: step.constructor_args.len(),
            });
        }
        Ok(())
    }
}

fn find_artifact(
    dir: &Path,
    dir_name: &str,
    file_name: &str,
) -> Result<Option<PathBuf>, ArtifactError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    // deterministic pick when a name exists twice
    entries.sort();
    for path in entries {
        if !path.is_dir() || path.file_name().is_some_and(|name| name == "build-info") {
            continue;
        }
        if path.file_name().is_some_and(|name| name == dir_name) {
            let candidate = path.join(file_name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        if let Some(found) = find_artifact(&path, dir_name, file_name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
