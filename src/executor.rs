//! Seam to the external deployment executor.
//!
//! Signing, broadcasting, nonce management and confirmation waiting are not
//! done here. An executor receives one fully resolved request per step and
//! answers with the resulting address and transaction hash.

use std::process::Stdio;

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::{ETHERSCAN_API_KEY_VAR, PRIVATE_KEY_VAR};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployRequest {
    pub network: String,
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub deployer: Address,
    pub future_id: String,
    pub contract_name: String,
    pub bytecode: Bytes,
    /// Constructor arguments with earlier steps already replaced by their addresses
    pub constructor_args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployReceipt {
    pub address: Address,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyRequest {
    pub network: String,
    pub chain_id: Option<u64>,
    pub future_id: String,
    pub contract_name: String,
    pub source_name: Option<String>,
    pub address: Address,
    pub compiler_version: String,
    pub constructor_args: Vec<serde_json::Value>,
}

/// Wire format of requests written to an executor process
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExecutorRequest<'a> {
    Deploy(&'a DeployRequest),
    Verify(&'a VerifyRequest),
}

/// Credentials handed to the executor, never serialized into requests
#[derive(Clone, Default)]
pub struct ExecutorSecrets {
    pub private_key: Option<String>,
    pub etherscan_api_key: Option<String>,
}

#[async_trait::async_trait]
pub trait Executor {
    async fn deploy(&self, request: &DeployRequest) -> eyre::Result<DeployReceipt>;

    async fn verify(&self, request: &VerifyRequest) -> eyre::Result<()>;
}

/// Runs an external program per request: one JSON request on stdin, JSON answer as last stdout line
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    secrets: ExecutorSecrets,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>, secrets: ExecutorSecrets) -> Self {
        CommandExecutor {
            program: program.into(),
            args,
            secrets,
        }
    }

    async fn call(&self, request: ExecutorRequest<'_>) -> eyre::Result<String> {
        let payload = serde_json::to_vec(&request)?;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &self.secrets.private_key {
            command.env(PRIVATE_KEY_VAR, key);
        }
        if let Some(key) = &self.secrets.etherscan_api_key {
            command.env(ETHERSCAN_API_KEY_VAR, key);
        }
        let mut child = command
            .spawn()
            .map_err(|e| eyre::eyre!("{e}:{}", self.program))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or(eyre::eyre!("executor stdin unavailable"))?;
        // fed concurrently, the executor may print before it reads its request
        let writer = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.write_all(b"\n").await
        });

        let output = child.wait_with_output().await?;
        let written = writer.await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre::eyre!(
                "executor `{}` failed with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }
        match written {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(program = %self.program, "executor exited without reading the whole request");
            }
            written => written?,
        }
        let stdout = String::from_utf8(output.stdout)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait::async_trait]
impl Executor for CommandExecutor {
    async fn deploy(&self, request: &DeployRequest) -> eyre::Result<DeployReceipt> {
        let answer = self.call(ExecutorRequest::Deploy(request)).await?;
        if answer.is_empty() {
            return Err(eyre::eyre!("executor returned no receipt for {}", request.future_id));
        }
        serde_json::from_str(&answer)
            .map_err(|e| eyre::eyre!("invalid receipt for {}: {e}", request.future_id))
    }

    async fn verify(&self, request: &VerifyRequest) -> eyre::Result<()> {
        self.call(ExecutorRequest::Verify(request)).await?;
        Ok(())
    }
}
