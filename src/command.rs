use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The network to deploy to, a configured name such as `sepolia` or an rpc url like `http://localhost:8545`
    #[arg(short, long, global = true, default_value_t = String::from("sepolia"))]
    pub network: String,

    /// Project root containing `artifacts/`, `contracts/` and `deployments/`
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the loaded configuration with secrets redacted
    Config,
    /// Print the deployment plan of the given modules, all modules if none given
    Plan {
        /// Deployment module id, e.g. `EcomModule`
        #[arg(long = "module")]
        modules: Vec<String>,
    },
    /// Deploy modules through an external executor and record the results
    Deploy {
        /// Deployment module id, e.g. `EcomModule`
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Program that signs and broadcasts each deployment request
        #[arg(long, required_unless_present = "dry_run")]
        executor: Option<String>,
        /// Extra argument passed to the executor, repeatable
        #[arg(long = "executor-arg", allow_hyphen_values = true)]
        executor_args: Vec<String>,
        /// Print the requests without executing or recording anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Deploy again even if a record exists for this network
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Submit recorded deployments for block explorer verification
    Verify {
        /// Deployment module id, e.g. `EcomModule`
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Program that submits the verification requests
        #[arg(long)]
        executor: String,
        /// Extra argument passed to the executor, repeatable
        #[arg(long = "executor-arg", allow_hyphen_values = true)]
        executor_args: Vec<String>,
    },
    /// List recorded deployments on the selected network
    Deployments {
        /// Deployment module id, e.g. `EcomModule`
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Which records to show, options are `all`, `latest`
        #[arg(long, default_value_t = String::from("latest"))]
        mode: String,
    },
}
