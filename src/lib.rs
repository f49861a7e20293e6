pub mod artifact;
pub mod compiler;
pub mod config;
pub mod executor;
pub mod handle;
pub mod journal;
pub mod module;
pub mod modules;
mod object;

pub use object::{DeploymentRecord, ListMode, Network};
