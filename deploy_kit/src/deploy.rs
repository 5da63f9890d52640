use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::PathBuf,
};

use bstr::ByteSlice;
use serde::Serialize;
use stacked_errors::{Result, StackableErr};
use tracing::{debug, info, warn};

use crate::{Command, CommandResult};

/// Trailing bytes kept of each hook stream. Only the last stderr line is
/// needed for the verdict.
const HOOK_RECORD_LIMIT: usize = 64 * 1024;

/// The one recognized deployment failure. Displays as exactly its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DeploymentError {
    pub message: String,
}

impl DeploymentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The outcome of a deployment that ran to the point of a verdict. The outer
/// `stacked_errors::Result` that wraps this is reserved for infrastructure
/// failures that are not a [DeploymentError].
pub type DeployOutcome = std::result::Result<(), DeploymentError>;

/// Everything a [Deployer] needs to push one service to one cluster. Built
/// once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDeployment {
    /// Docker build context, the parent of the service directory
    pub docker_context_path: PathBuf,
    /// The service source directory
    pub service_path: PathBuf,
    pub service: String,
    pub ecr_endpoint: String,
    pub aws_region: String,
    /// ARN prefix that `context` is appended to
    pub eks_context: String,
    /// Bypasses the branch check
    pub force: bool,
    /// Target cluster, e.g. `prod-live1` or `prod-test3`
    pub context: String,
}

impl ServiceDeployment {
    /// The full ARN of the target cluster
    pub fn cluster_arn(&self) -> String {
        format!("{}{}", self.eks_context, self.context)
    }

    /// The environment a deploy hook receives, in a stable order
    pub fn hook_envs(&self) -> Vec<(&'static str, OsString)> {
        vec![
            (
                "DOCKER_CONTEXT_PATH",
                self.docker_context_path.clone().into_os_string(),
            ),
            ("SERVICE_PATH", self.service_path.clone().into_os_string()),
            ("SERVICE", self.service.clone().into()),
            ("ECR_ENDPOINT", self.ecr_endpoint.clone().into()),
            ("AWS_REGION", self.aws_region.clone().into()),
            ("EKS_CONTEXT", self.eks_context.clone().into()),
            ("EKS_CLUSTER_ARN", self.cluster_arn().into()),
            ("FORCE", self.force.to_string().into()),
            ("CONTEXT", self.context.clone().into()),
        ]
    }
}

impl fmt::Display for ServiceDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (force: {})",
            self.service,
            self.cluster_arn(),
            self.force
        )
    }
}

/// Performs the actual deployment. Implementors own image builds, registry
/// pushes, manifest application, and rollout checks.
#[allow(async_fn_in_trait)]
pub trait Deployer {
    async fn deploy_service2(&self, deployment: &ServiceDeployment) -> Result<DeployOutcome>;
}

/// The entry point that the CLI calls into
pub async fn deploy_service2<D: Deployer + ?Sized>(
    deployer: &D,
    deployment: &ServiceDeployment,
) -> Result<DeployOutcome> {
    info!("deploying {deployment}");
    let outcome = deployer
        .deploy_service2(deployment)
        .await
        .stack_err_with(|| format!("deploy_service2(service: {})", deployment.service))?;
    match &outcome {
        Ok(()) => info!("deployed {} to {}", deployment.service, deployment.context),
        Err(e) => warn!("deployment of {} failed: {e}", deployment.service),
    }
    Ok(outcome)
}

/// A [Deployer] that hands the deployment to an external hook program.
///
/// The hook is run as `<program> [args..] <context>` from the service
/// directory, with the [ServiceDeployment::hook_envs] added to the inherited
/// environment. Its standard streams are forwarded while being recorded.
#[derive(Debug, Clone)]
pub struct HookDeployer {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Forward the hook's standard streams to this process
    pub debug: bool,
}

impl HookDeployer {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().into(),
            args: vec![],
            debug: true,
        }
    }

    /// Adds arguments placed before the context
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().into()));
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn command(&self, deployment: &ServiceDeployment) -> Command {
        Command::new_os_str(&self.program)
            .args(&self.args)
            .arg(&deployment.context)
            .envs(deployment.hook_envs())
            .cwd(&deployment.service_path)
            .debug(self.debug)
            .record_limit(Some(HOOK_RECORD_LIMIT))
    }
}

/// Turns a finished hook into a verdict. The last nonempty stderr line is
/// the failure message.
fn hook_outcome(comres: &CommandResult) -> DeployOutcome {
    if comres.successful() {
        return Ok(())
    }
    let lines: Vec<&[u8]> = comres.stderr.lines().map(|line| line.trim()).collect();
    let last_line = lines
        .into_iter()
        .rev()
        .find(|line| !line.is_empty())
        .map(|line| line.to_str_lossy().into_owned());
    let message = last_line.unwrap_or_else(|| match comres.status {
        Some(status) => format!(
            "{} exited with {status}",
            comres.command.program.to_string_lossy()
        ),
        None => format!(
            "{} was terminated",
            comres.command.program.to_string_lossy()
        ),
    });
    Err(DeploymentError { message })
}

impl Deployer for HookDeployer {
    async fn deploy_service2(&self, deployment: &ServiceDeployment) -> Result<DeployOutcome> {
        let command = self.command(deployment);
        debug!("running deploy hook {command:?}");
        let comres = command
            .run_to_completion()
            .await
            .stack_err_with(|| format!("HookDeployer -> could not run {:?}", self.program))?;
        Ok(hook_outcome(&comres))
    }
}
