use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;

use crate::object::DeploymentRecord;

/// Deployment records, one `<network>/<module>.json` array per module
#[derive(Debug, Clone)]
pub struct Journal {
    root: PathBuf,
}

impl Journal {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Journal { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, network: &str, module: &str) -> PathBuf {
        self.root.join(network).join(format!("{module}.json"))
    }

    pub fn load(&self, network: &str, module: &str) -> eyre::Result<Vec<DeploymentRecord>> {
        let path = self.record_path(network, module);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path)?;
        let records = serde_json::from_reader(file)
            .map_err(|e| eyre::eyre!("{e}:{}", path.to_string_lossy()))?;
        Ok(records)
    }

    pub fn append(&self, record: DeploymentRecord) -> eyre::Result<()> {
        let path = self.record_path(&record.network, &record.module);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut records = self.load(&record.network, &record.module)?;
        records.push(record);
        let new_content = serde_json::to_string_pretty(&records)?;
        // write-then-rename so an interrupted run never leaves a truncated journal
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, new_content)?;
        fs::rename(staging, path)?;
        Ok(())
    }

    pub fn latest(
        &self,
        network: &str,
        module: &str,
        future_id: &str,
    ) -> eyre::Result<Option<DeploymentRecord>> {
        let records = self.load(network, module)?;
        Ok(records
            .into_iter()
            .rev()
            .find(|record| record.future_id == future_id))
    }

    /// Latest address of every step deployed so far
    pub fn deployed_addresses(
        &self,
        network: &str,
        module: &str,
    ) -> eyre::Result<BTreeMap<String, Address>> {
        let records = self.load(network, module)?;
        Ok(records
            .into_iter()
            .map(|record| (record.future_id, record.address))
            .collect())
    }
}
