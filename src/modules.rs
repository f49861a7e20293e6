use crate::module::{build_module, DeploymentModule, ModuleError};

pub const ECOM_MODULE: &str = "EcomModule";
pub const ECOMMERCE_ESCROW: &str = "EcommerceEscrow";
pub const ECOM_RESULT: &str = "Ecom";

// Deploys the escrow contract, its constructor takes no arguments:
//   - EcomModule#EcommerceEscrow -> exported as `Ecom`
pub fn ecom_module() -> Result<DeploymentModule, ModuleError> {
    build_module(ECOM_MODULE, |m| {
        let ecom = m.contract(ECOMMERCE_ESCROW, vec![])?;
        m.export(ECOM_RESULT, &ecom)
    })
}

pub fn available_modules() -> &'static [&'static str] {
    &[ECOM_MODULE]
}

pub fn load_module(name: &str) -> Result<DeploymentModule, ModuleError> {
    match name {
        ECOM_MODULE => ecom_module(),
        _ => Err(ModuleError::UnknownModule(name.to_string())),
    }
}
