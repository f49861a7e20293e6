use std::{collections::BTreeMap, fs};

use alloy_primitives::Address;
use chrono::prelude::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    artifact::{ArtifactError, ContractArtifact},
    compiler::CompilerSpec,
    config::{redact_url, ProjectConfig, ProjectPaths},
    executor::{DeployRequest, Executor, ExecutorSecrets, VerifyRequest},
    journal::Journal,
    module::{ArgumentValue, ContractStep, DeploymentRun},
    modules::{available_modules, load_module},
    object::{DeploymentRecord, ListMode, Network},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Print the requests without calling the executor or writing records
    pub dry_run: bool,
    /// Ignore earlier records and deploy every step again
    pub reset: bool,
}

/// Every project module when none are named
pub fn build_run(module_names: &[String]) -> eyre::Result<DeploymentRun> {
    let names: Vec<String> = if module_names.is_empty() {
        available_modules().iter().map(|s| s.to_string()).collect()
    } else {
        module_names.to_vec()
    };
    let mut run = DeploymentRun::new();
    for name in &names {
        run.add(load_module(name)?)?;
    }
    Ok(run)
}

pub fn executor_secrets(config: &ProjectConfig, network: &Network) -> eyre::Result<ExecutorSecrets> {
    let profile = config.resolve(network)?;
    Ok(ExecutorSecrets {
        private_key: Some(profile.deployer()?.expose_key().to_string()),
        etherscan_api_key: config
            .etherscan
            .require_api_key()
            .ok()
            .map(str::to_string),
    })
}

pub fn show_config(config: &ProjectConfig) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.summary())?);
    Ok(())
}

fn check_compiler(
    paths: &ProjectPaths,
    solidity: &CompilerSpec,
    artifact: &ContractArtifact,
) -> eyre::Result<()> {
    let Some(source_name) = &artifact.source_name else {
        return Ok(());
    };
    let source_path = paths.source(source_name);
    if !source_path.is_file() {
        debug!(source = %source_path.display(), "source not found, skipping pragma check");
        return Ok(());
    }
    let source = fs::read_to_string(&source_path)?;
    solidity
        .check_source(&source)
        .map_err(|e| eyre::eyre!("{e}:{}", source_path.to_string_lossy()))
}

fn load_checked_artifact(
    paths: &ProjectPaths,
    solidity: &CompilerSpec,
    step: &ContractStep,
) -> eyre::Result<ContractArtifact> {
    let artifact = ContractArtifact::load(&paths.artifacts, &step.contract_name)?;
    artifact.check_arguments(step)?;
    check_compiler(paths, solidity, &artifact)?;
    Ok(artifact)
}

// Futures become addresses, unresolved ones only allowed as placeholders in dry runs
fn resolve_arguments(
    step: &ContractStep,
    addresses: &BTreeMap<String, Address>,
    allow_placeholders: bool,
) -> eyre::Result<Vec<Value>> {
    step.constructor_args
        .iter()
        .map(|arg| match arg {
            ArgumentValue::Literal(value) => Ok(value.clone()),
            ArgumentValue::Future(id) => match addresses.get(id) {
                Some(address) => Ok(Value::String(address.to_string())),
                None if allow_placeholders => Ok(Value::String(format!("<{id}>"))),
                None => Err(eyre::eyre!("{} depends on {id} which is not deployed", step.id)),
            },
        })
        .collect()
}

/// Print the deployment plan, artifacts are checked when they have been compiled
pub fn plan_modules(
    paths: &ProjectPaths,
    solidity: &CompilerSpec,
    module_names: &[String],
) -> eyre::Result<Value> {
    let run = build_run(module_names)?;
    let mut modules = Vec::new();
    for module in run.modules() {
        let mut steps = Vec::new();
        for step in module.steps() {
            let bytecode_hash = match load_checked_artifact(paths, solidity, step) {
                Ok(artifact) => Some(artifact.bytecode_hash()),
                Err(e)
                    if matches!(
                        e.downcast_ref::<ArtifactError>(),
                        Some(ArtifactError::NotFound(..))
                    ) =>
                {
                    warn!(step = %step.id, "artifact not compiled yet");
                    None
                }
                Err(e) => return Err(e),
            };
            let mut planned = serde_json::to_value(step)?;
            planned["bytecode_hash"] = json!(bytecode_hash);
            steps.push(planned);
        }
        modules.push(json!({
            "id": module.id(),
            "steps": steps,
            "results": module.results(),
        }));
    }
    let plan = json!({ "solidity": solidity.to_string(), "modules": modules });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(plan)
}

pub async fn deploy_modules<E: Executor + ?Sized>(
    config: &ProjectConfig,
    paths: &ProjectPaths,
    network: &Network,
    module_names: &[String],
    executor: &E,
    journal: &Journal,
    options: DeployOptions,
) -> eyre::Result<Vec<DeploymentRecord>> {
    let profile = config.resolve(network)?;
    let deployer = profile.deployer()?.address();
    let run = build_run(module_names)?;
    let mut records = Vec::new();
    for module in run.modules() {
        info!(module = module.id(), network = %profile.name, %deployer, "deploying module");
        let mut addresses = BTreeMap::new();
        for step in module.steps() {
            let artifact = load_checked_artifact(paths, &config.solidity, step)?;
            let bytecode_hash = artifact.bytecode_hash();
            if !options.reset {
                if let Some(previous) = journal.latest(&profile.name, module.id(), &step.id)? {
                    if previous.bytecode_hash.is_some_and(|hash| hash != bytecode_hash) {
                        return Err(eyre::eyre!(
                            "{} was deployed at {} with different bytecode, use --reset to deploy it again",
                            step.id,
                            previous.address
                        ));
                    }
                    info!(step = %step.id, address = %previous.address, "already deployed, skipping");
                    addresses.insert(step.id.clone(), previous.address);
                    records.push(previous);
                    continue;
                }
            }
            let request = DeployRequest {
                network: profile.name.clone(),
                rpc_url: profile.url.to_string(),
                chain_id: profile.chain_id,
                deployer,
                future_id: step.id.clone(),
                contract_name: step.contract_name.clone(),
                bytecode: artifact.bytecode.clone(),
                constructor_args: resolve_arguments(step, &addresses, options.dry_run)?,
            };
            if options.dry_run {
                let mut shown = serde_json::to_value(&request)?;
                shown["rpc_url"] = json!(redact_url(&profile.url));
                shown["bytecode_hash"] = json!(bytecode_hash);
                println!("{}", serde_json::to_string_pretty(&shown)?);
                continue;
            }
            let receipt = executor.deploy(&request).await?;
            println!("Transaction hash: {}", receipt.tx_hash);
            info!(step = %step.id, address = %receipt.address, "contract deployed");
            let record = DeploymentRecord {
                module: module.id().to_string(),
                future_id: step.id.clone(),
                contract_name: step.contract_name.clone(),
                date: Utc::now().to_rfc3339(),
                network: profile.name.clone(),
                chain_id: profile.chain_id,
                address: receipt.address,
                tx_hash: receipt.tx_hash,
                bytecode_hash: Some(bytecode_hash),
                deployer,
                comment: None,
            };
            journal.append(record.clone())?;
            addresses.insert(step.id.clone(), receipt.address);
            records.push(record);
        }
    }
    if !options.dry_run {
        println!("Deployed Addresses");
        for record in &records {
            println!("{} - {}", record.future_id, record.address);
        }
    }
    Ok(records)
}

pub async fn verify_modules<E: Executor + ?Sized>(
    config: &ProjectConfig,
    paths: &ProjectPaths,
    network: &Network,
    module_names: &[String],
    executor: &E,
    journal: &Journal,
) -> eyre::Result<Vec<Address>> {
    config.etherscan.require_api_key()?;
    let profile = config.resolve(network)?;
    let run = build_run(module_names)?;
    let mut verified = Vec::new();
    for module in run.modules() {
        let addresses = journal.deployed_addresses(&profile.name, module.id())?;
        for step in module.steps() {
            let Some(record) = journal.latest(&profile.name, module.id(), &step.id)? else {
                warn!(step = %step.id, network = %profile.name, "not deployed, nothing to verify");
                continue;
            };
            let source_name = match ContractArtifact::load(&paths.artifacts, &step.contract_name) {
                Ok(artifact) => artifact.source_name,
                Err(e) => {
                    warn!(step = %step.id, error = %e, "artifact unavailable, verifying without source name");
                    None
                }
            };
            let request = VerifyRequest {
                network: profile.name.clone(),
                chain_id: profile.chain_id,
                future_id: step.id.clone(),
                contract_name: step.contract_name.clone(),
                source_name,
                address: record.address,
                compiler_version: config.solidity.to_string(),
                constructor_args: resolve_arguments(step, &addresses, false)?,
            };
            executor.verify(&request).await?;
            info!(step = %step.id, address = %record.address, "verification submitted");
            verified.push(record.address);
        }
    }
    Ok(verified)
}

pub fn list_deployments(
    journal: &Journal,
    network: &Network,
    module_names: &[String],
    mode: ListMode,
) -> eyre::Result<Vec<DeploymentRecord>> {
    let run = build_run(module_names)?;
    let network_key = network.record_key();
    let mut listed = Vec::new();
    for module in run.modules() {
        let records = journal.load(&network_key, module.id())?;
        match mode {
            ListMode::All => listed.extend(records),
            ListMode::Latest => {
                let mut latest: BTreeMap<String, DeploymentRecord> = BTreeMap::new();
                for record in records {
                    latest.insert(record.future_id.clone(), record);
                }
                // keep plan order
                for step in module.steps() {
                    if let Some(record) = latest.remove(&step.id) {
                        listed.push(record);
                    }
                }
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&listed)?);
    Ok(listed)
}
