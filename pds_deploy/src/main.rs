use std::process::ExitCode;

use clap::Parser;
use deploy_kit::HookDeployer;
use pds_deploy::{run, Cli};
use stacked_errors::{Result, StackableErr};
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    // stdout is reserved for the failure message and usage block
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let invocation_dir = std::env::current_dir().stack()?;
    let deployer = HookDeployer::new(&cli.hook);
    // single threaded, the environment is written before the deploy call
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .stack()?;
    let status = runtime
        .block_on(run(&cli, &invocation_dir, &deployer, &mut std::io::stdout()))
        .stack()?;
    Ok(status.exit_code())
}
