use clap::Parser;
use ecom_deployer::{
    compiler::CompilerSpec,
    config::{ProjectConfig, ProjectPaths, SOLIDITY_VERSION},
    executor::CommandExecutor,
    handle::*,
    journal::Journal,
    Network,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod command;

use command::{Cli, Commands};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecom_deployer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let network: Network = cli.network.try_into()?;
    let paths = ProjectPaths::new(cli.root);
    let journal = Journal::new(paths.deployments.clone());
    match cli.command {
        Commands::Config => {
            let config = ProjectConfig::from_env()?;
            show_config(&config)
        }
        Commands::Plan { modules } => {
            plan_modules(&paths, &CompilerSpec::parse(SOLIDITY_VERSION)?, &modules)?;
            Ok(())
        }
        Commands::Deploy {
            modules,
            executor,
            executor_args,
            dry_run,
            reset,
        } => {
            let config = ProjectConfig::from_env()?;
            // clap guarantees an executor unless this is a dry run, which never calls it
            let executor = CommandExecutor::new(
                executor.unwrap_or_default(),
                executor_args,
                executor_secrets(&config, &network)?,
            );
            deploy_modules(
                &config,
                &paths,
                &network,
                &modules,
                &executor,
                &journal,
                DeployOptions { dry_run, reset },
            )
            .await?;
            Ok(())
        }
        Commands::Verify {
            modules,
            executor,
            executor_args,
        } => {
            let config = ProjectConfig::from_env()?;
            let executor =
                CommandExecutor::new(executor, executor_args, executor_secrets(&config, &network)?);
            let verified =
                verify_modules(&config, &paths, &network, &modules, &executor, &journal).await?;
            println!("Submitted {} contract(s) for verification", verified.len());
            Ok(())
        }
        Commands::Deployments { modules, mode } => {
            list_deployments(&journal, &network, &modules, mode.try_into()?)?;
            Ok(())
        }
    }
}
