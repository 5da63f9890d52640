//! Deploys the pds service to an EKS cluster through ECR.
//!
//! The binary is a thin adapter: it parses the command line, writes the
//! service environment, and hands a [ServiceDeployment] to a [Deployer].
//!
//! [ServiceDeployment]: deploy_kit::ServiceDeployment
//! [Deployer]: deploy_kit::Deployer

pub mod app;
mod cli;
pub mod config;
pub mod env;
pub use app::{report_failure, run, DeployStatus};
pub use cli::{usage, Cli, DEFAULT_HOOK};
pub use config::DeployConfig;
