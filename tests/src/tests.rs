use std::{collections::HashMap, fs, path::Path, sync::Mutex};

use alloy_primitives::{keccak256, Address, B256};
use ecom_deployer::{
    compiler::CompilerSpec,
    config::{
        ConfigError, ProjectConfig, ProjectPaths, ETHERSCAN_API_KEY_VAR, PRIVATE_KEY_VAR,
        SEPOLIA_URL_VAR,
    },
    executor::{DeployReceipt, DeployRequest, Executor, VerifyRequest},
    handle::{deploy_modules, list_deployments, plan_modules, verify_modules, DeployOptions},
    journal::Journal,
    module::ModuleError,
    modules::{ECOMMERCE_ESCROW, ECOM_MODULE},
    ListMode, Network,
};
use serde_json::json;

const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ESCROW_STEP: &str = "EcomModule#EcommerceEscrow";

// Answers like a node would, addresses follow the deployer's nonce
#[derive(Default)]
struct FakeExecutor {
    deployed: Mutex<Vec<DeployRequest>>,
    verified: Mutex<Vec<VerifyRequest>>,
}

impl FakeExecutor {
    fn deploy_count(&self) -> usize {
        self.deployed.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Executor for FakeExecutor {
    async fn deploy(&self, request: &DeployRequest) -> eyre::Result<DeployReceipt> {
        let mut deployed = self.deployed.lock().unwrap();
        let nonce = deployed.len() as u64;
        deployed.push(request.clone());
        Ok(DeployReceipt {
            address: request.deployer.create(nonce),
            tx_hash: keccak256(nonce.to_be_bytes()),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> eyre::Result<()> {
        self.verified.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct Project {
    dir: tempfile::TempDir,
    paths: ProjectPaths,
    journal: Journal,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let journal = Journal::new(paths.deployments.clone());
        Project {
            dir,
            paths,
            journal,
        }
    }

    fn with_escrow(pragma: &str, bytecode: &str) -> Self {
        let project = Self::new();
        project.write_source(pragma);
        project.write_artifact(bytecode, json!([]));
        project
    }

    fn write_source(&self, pragma: &str) {
        let contracts = self.dir.path().join("contracts");
        fs::create_dir_all(&contracts).unwrap();
        fs::write(
            contracts.join("EcommerceEscrow.sol"),
            format!(
                "// SPDX-License-Identifier: MIT\npragma solidity {pragma};\n\ncontract EcommerceEscrow {{}}\n"
            ),
        )
        .unwrap();
    }

    fn write_artifact(&self, bytecode: &str, constructor_inputs: serde_json::Value) {
        let dir = self
            .paths
            .artifacts
            .join("contracts")
            .join("EcommerceEscrow.sol");
        fs::create_dir_all(&dir).unwrap();
        let artifact = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "EcommerceEscrow",
            "sourceName": "contracts/EcommerceEscrow.sol",
            "abi": [{ "type": "constructor", "inputs": constructor_inputs, "stateMutability": "nonpayable" }],
            "bytecode": bytecode,
            "deployedBytecode": "0x",
            "linkReferences": {},
            "deployedLinkReferences": {},
        });
        fs::write(dir.join("EcommerceEscrow.json"), artifact.to_string()).unwrap();
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn config(vars: &[(&str, &str)]) -> ProjectConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ProjectConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn sepolia_config() -> ProjectConfig {
    config(&[
        (PRIVATE_KEY_VAR, TEST_KEY),
        (SEPOLIA_URL_VAR, "https://eth-sepolia.example.org/v2/key"),
    ])
}

fn sepolia() -> Network {
    Network::Named("sepolia".into())
}

fn modules(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn deploys_escrow_and_records_it() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let config = sepolia_config();
    let executor = FakeExecutor::default();

    let records = deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    let deployer = config.network("sepolia").unwrap().deployer().unwrap().address();
    let record = &records[0];
    assert_eq!(record.module, ECOM_MODULE);
    assert_eq!(record.future_id, ESCROW_STEP);
    assert_eq!(record.contract_name, ECOMMERCE_ESCROW);
    assert_eq!(record.address, deployer.create(0));
    assert_eq!(record.chain_id, Some(11_155_111));
    assert_eq!(record.deployer, deployer);
    assert_eq!(
        record.bytecode_hash,
        Some(keccak256([0x60u8, 0x80, 0x60, 0x40, 0x52]))
    );

    let requests = executor.deployed.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].contract_name, ECOMMERCE_ESCROW);
    assert!(requests[0].constructor_args.is_empty());
    assert_eq!(requests[0].rpc_url, "https://eth-sepolia.example.org/v2/key");

    let journal_file = project
        .root()
        .join("deployments")
        .join("sepolia")
        .join("EcomModule.json");
    assert!(journal_file.is_file());
    assert_eq!(project.journal.load("sepolia", ECOM_MODULE).unwrap(), records);
}

#[tokio::test]
async fn second_deploy_reuses_the_recorded_address() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let config = sepolia_config();
    let executor = FakeExecutor::default();
    let first = deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &modules(&[ECOM_MODULE]),
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();
    let second = deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &modules(&[ECOM_MODULE]),
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(executor.deploy_count(), 1);
    assert_eq!(project.journal.load("sepolia", ECOM_MODULE).unwrap().len(), 1);
}

#[tokio::test]
async fn changed_bytecode_needs_reset() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let config = sepolia_config();
    let executor = FakeExecutor::default();
    deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();

    project.write_artifact("0x6080604053", json!([]));
    let err = deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("different bytecode"), "{err}");
    assert_eq!(executor.deploy_count(), 1);

    let records = deploy_modules(
        &config,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions {
            reset: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(executor.deploy_count(), 2);
    let deployer = config.network("sepolia").unwrap().deployer().unwrap().address();
    assert_eq!(records[0].address, deployer.create(1));
    let latest = project
        .journal
        .latest("sepolia", ECOM_MODULE, ESCROW_STEP)
        .unwrap()
        .unwrap();
    assert_eq!(latest.address, deployer.create(1));
    assert_eq!(project.journal.load("sepolia", ECOM_MODULE).unwrap().len(), 2);
}

#[tokio::test]
async fn dry_run_neither_executes_nor_records() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let executor = FakeExecutor::default();
    let records = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions {
            dry_run: true,
            reset: false,
        },
    )
    .await
    .unwrap();
    assert!(records.is_empty());
    assert_eq!(executor.deploy_count(), 0);
    assert!(project.journal.load("sepolia", ECOM_MODULE).unwrap().is_empty());
}

#[tokio::test]
async fn custom_networks_are_recorded_separately() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let executor = FakeExecutor::default();
    let local: Network = "http://127.0.0.1:8545".to_string().try_into().unwrap();
    let records = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &local,
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(records[0].network, "custom-127.0.0.1-8545");
    assert_eq!(records[0].chain_id, None);
    assert!(project.journal.load("sepolia", ECOM_MODULE).unwrap().is_empty());
    assert_eq!(
        executor.deployed.lock().unwrap()[0].rpc_url,
        "http://127.0.0.1:8545/"
    );
}

#[tokio::test]
async fn pragma_mismatch_stops_before_executing() {
    let project = Project::with_escrow("^0.8.25", "0x6080604052");
    let executor = FakeExecutor::default();
    let err = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("does not admit solc 0.8.24"), "{err}");
    assert_eq!(executor.deploy_count(), 0);
}

#[tokio::test]
async fn constructor_with_parameters_is_rejected() {
    let project = Project::new();
    project.write_source("0.8.24");
    project.write_artifact(
        "0x6080604052",
        json!([{ "name": "arbiter", "type": "address" }]),
    );
    let executor = FakeExecutor::default();
    let err = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("expects 1"), "{err}");
    assert_eq!(executor.deploy_count(), 0);
}

#[tokio::test]
async fn missing_artifact_is_reported() {
    let project = Project::new();
    let executor = FakeExecutor::default();
    let err = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("compile the contracts first"), "{err}");
}

#[tokio::test]
async fn modules_are_unique_per_run() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let executor = FakeExecutor::default();
    let err = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &modules(&[ECOM_MODULE, ECOM_MODULE]),
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ModuleError>(),
        Some(&ModuleError::DuplicateModule(ECOM_MODULE.into()))
    );

    let err = deploy_modules(
        &sepolia_config(),
        &project.paths,
        &sepolia(),
        &modules(&["LockModule"]),
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ModuleError>(),
        Some(&ModuleError::UnknownModule("LockModule".into()))
    );
    assert_eq!(executor.deploy_count(), 0);
}

#[tokio::test]
async fn verification_needs_the_explorer_key() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let executor = FakeExecutor::default();
    let without_key = sepolia_config();
    let err = verify_modules(
        &without_key,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingCredential(ETHERSCAN_API_KEY_VAR))
    ));

    let with_key = config(&[(PRIVATE_KEY_VAR, TEST_KEY), (ETHERSCAN_API_KEY_VAR, "key")]);
    // nothing deployed yet
    let verified = verify_modules(
        &with_key,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
    )
    .await
    .unwrap();
    assert!(verified.is_empty());

    let records = deploy_modules(
        &with_key,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
        DeployOptions::default(),
    )
    .await
    .unwrap();
    let verified = verify_modules(
        &with_key,
        &project.paths,
        &sepolia(),
        &[],
        &executor,
        &project.journal,
    )
    .await
    .unwrap();
    assert_eq!(verified, vec![records[0].address]);
    let requests = executor.verified.lock().unwrap();
    assert_eq!(requests[0].compiler_version, "0.8.24");
    assert_eq!(
        requests[0].source_name.as_deref(),
        Some("contracts/EcommerceEscrow.sol")
    );
    assert!(requests[0].constructor_args.is_empty());
}

#[tokio::test]
async fn lists_latest_and_all_records() {
    let project = Project::with_escrow("^0.8.24", "0x6080604052");
    let config = sepolia_config();
    let executor = FakeExecutor::default();
    for _ in 0..2 {
        deploy_modules(
            &config,
            &project.paths,
            &sepolia(),
            &[],
            &executor,
            &project.journal,
            DeployOptions {
                reset: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }
    let all = list_deployments(&project.journal, &sepolia(), &[], ListMode::All).unwrap();
    assert_eq!(all.len(), 2);
    let latest = list_deployments(&project.journal, &sepolia(), &[], ListMode::Latest).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].tx_hash, keccak256(1u64.to_be_bytes()));
    assert_ne!(latest[0].tx_hash, B256::ZERO);
}

#[test]
fn plan_marks_uncompiled_contracts() {
    let solidity = CompilerSpec::parse("0.8.24").unwrap();
    let project = Project::new();
    let plan = plan_modules(&project.paths, &solidity, &[]).unwrap();
    let step = &plan["modules"][0]["steps"][0];
    assert_eq!(plan["modules"][0]["id"], ECOM_MODULE);
    assert_eq!(plan["modules"][0]["results"]["Ecom"], ESCROW_STEP);
    assert_eq!(step["contract_name"], ECOMMERCE_ESCROW);
    assert_eq!(step["constructor_args"], json!([]));
    assert!(step["bytecode_hash"].is_null());

    project.write_artifact("0x6080604052", json!([]));
    let plan = plan_modules(&project.paths, &solidity, &modules(&[ECOM_MODULE])).unwrap();
    let hash: B256 =
        serde_json::from_value(plan["modules"][0]["steps"][0]["bytecode_hash"].clone()).unwrap();
    assert_eq!(hash, keccak256([0x60u8, 0x80, 0x60, 0x40, 0x52]));
}

#[test]
fn deployer_address_comes_from_the_private_key() {
    let config = sepolia_config();
    let deployer = config.network("sepolia").unwrap().deployer().unwrap().address();
    assert_eq!(
        deployer,
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            .parse::<Address>()
            .unwrap()
    );
}
