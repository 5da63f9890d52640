use clap::{CommandFactory, Parser};

/// The hook program used when neither `--hook` nor `DEPLOY_HOOK` is given
pub const DEFAULT_HOOK: &str = "deploy-service";

/// Deploys the pds service to an EKS cluster through ECR
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "deploy")]
pub struct Cli {
    /// Deploy even if the branch check fails
    #[arg(long)]
    pub force: bool,
    /// Print the resolved deployment instead of running it
    #[arg(long)]
    pub dry_run: bool,
    /// External program that performs the deployment
    #[arg(long, env = "DEPLOY_HOOK", default_value = DEFAULT_HOOK)]
    pub hook: String,
    /// Target cluster context, e.g. prod-live1 or prod-test3
    pub context: String,
}

/// The usage block printed after a failed deployment
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}
