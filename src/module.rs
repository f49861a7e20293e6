use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("duplicate step `{0}`")]
    DuplicateStep(String),
    #[error("duplicate result `{0}` in module `{1}`")]
    DuplicateResult(String, String),
    #[error("step `{0}` is not defined in module `{1}`")]
    UnknownFuture(String, String),
    #[error("module `{0}` is already part of this deployment")]
    DuplicateModule(String),
    #[error("unknown module `{0}`")]
    UnknownModule(String),
}

/// A constructor argument, either a literal or the address of an earlier step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgumentValue {
    Literal(serde_json::Value),
    Future(String),
}

impl From<serde_json::Value> for ArgumentValue {
    fn from(value: serde_json::Value) -> Self {
        ArgumentValue::Literal(value)
    }
}

impl From<&ContractFuture> for ArgumentValue {
    fn from(future: &ContractFuture) -> Self {
        ArgumentValue::Future(future.id.clone())
    }
}

/// One contract creation of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractStep {
    pub id: String,
    pub contract_name: String,
    pub constructor_args: Vec<ArgumentValue>,
}

impl ContractStep {
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.constructor_args.iter().filter_map(|arg| match arg {
            ArgumentValue::Future(id) => Some(id.as_str()),
            ArgumentValue::Literal(_) => None,
        })
    }
}

/// Handle to a step, pass it to later steps or export it as a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFuture {
    id: String,
}

impl ContractFuture {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentModule {
    id: String,
    steps: Vec<ContractStep>,
    results: BTreeMap<String, String>,
}

impl DeploymentModule {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[ContractStep] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&ContractStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Exported result name to step id
    pub fn results(&self) -> &BTreeMap<String, String> {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&ContractStep> {
        self.results.get(name).and_then(|id| self.step(id))
    }
}

pub struct ModuleBuilder {
    id: String,
    steps: Vec<ContractStep>,
    step_ids: BTreeSet<String>,
    results: BTreeMap<String, String>,
}

impl ModuleBuilder {
    fn new(id: &str) -> Result<Self, ModuleError> {
        check_identifier(id)?;
        Ok(ModuleBuilder {
            id: id.to_string(),
            steps: Vec::new(),
            step_ids: BTreeSet::new(),
            results: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deploy `contract_name`, the step id is `<module>#<contract_name>`
    pub fn contract(
        &mut self,
        contract_name: &str,
        args: Vec<ArgumentValue>,
    ) -> Result<ContractFuture, ModuleError> {
        self.contract_with_id(contract_name, contract_name, args)
    }

    /// Deploy `contract_name` under a custom local id, needed to deploy one contract twice
    pub fn contract_with_id(
        &mut self,
        contract_name: &str,
        local_id: &str,
        args: Vec<ArgumentValue>,
    ) -> Result<ContractFuture, ModuleError> {
        check_identifier(contract_name)?;
        check_identifier(local_id)?;
        let id = format!("{}#{}", self.id, local_id);
        if self.step_ids.contains(&id) {
            return Err(ModuleError::DuplicateStep(id));
        }
        for arg in &args {
            if let ArgumentValue::Future(dependency) = arg {
                if !self.step_ids.contains(dependency) {
                    return Err(ModuleError::UnknownFuture(
                        dependency.clone(),
                        self.id.clone(),
                    ));
                }
            }
        }
        self.step_ids.insert(id.clone());
        self.steps.push(ContractStep {
            id: id.clone(),
            contract_name: contract_name.to_string(),
            constructor_args: args,
        });
        Ok(ContractFuture { id })
    }

    pub fn export(&mut self, name: &str, future: &ContractFuture) -> Result<(), ModuleError> {
        check_identifier(name)?;
        if !self.step_ids.contains(&future.id) {
            return Err(ModuleError::UnknownFuture(future.id.clone(), self.id.clone()));
        }
        if self.results.contains_key(name) {
            return Err(ModuleError::DuplicateResult(
                name.to_string(),
                self.id.clone(),
            ));
        }
        self.results.insert(name.to_string(), future.id.clone());
        Ok(())
    }

    fn finish(self) -> DeploymentModule {
        DeploymentModule {
            id: self.id,
            steps: self.steps,
            results: self.results,
        }
    }
}

/// Build a module from its definition, the definition must not depend on outside state
pub fn build_module<F>(id: &str, define: F) -> Result<DeploymentModule, ModuleError>
where
    F: FnOnce(&mut ModuleBuilder) -> Result<(), ModuleError>,
{
    let mut builder = ModuleBuilder::new(id)?;
    define(&mut builder)?;
    Ok(builder.finish())
}

/// All modules executed by one deploy command
#[derive(Debug, Default)]
pub struct DeploymentRun {
    modules: Vec<DeploymentModule>,
}

impl DeploymentRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: DeploymentModule) -> Result<(), ModuleError> {
        if self.modules.iter().any(|m| m.id == module.id) {
            return Err(ModuleError::DuplicateModule(module.id));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn modules(&self) -> &[DeploymentModule] {
        &self.modules
    }
}

fn check_identifier(value: &str) -> Result<(), ModuleError> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ModuleError::InvalidIdentifier(value.to_string()))
    }
}
