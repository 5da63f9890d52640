//! The service deployment collaborator, and the OS command machinery it uses
//! to reach the external deploy hook.

mod command;
mod command_runner;
/// The `deploy_service2` entry point and the [Deployer] seam
pub mod deploy;
mod misc;
mod paths;
pub use command::*;
pub use deploy::{
    deploy_service2, DeployOutcome, Deployer, DeploymentError, HookDeployer, ServiceDeployment,
};
pub use misc::*;
pub use paths::*;
/// This reexport helps with dependency wrangling
pub use stacked_errors;
