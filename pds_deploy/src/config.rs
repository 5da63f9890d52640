//! Fixed deployment settings for the pds service

use std::path::{Path, PathBuf};

use deploy_kit::{acquire_dir_path, acquire_parent_dir_path, ServiceDeployment};
use stacked_errors::{Result, StackableErr};

pub const AWS_ACCOUNT_ID: &str = "211125355925";
pub const AWS_REGION: &str = "us-east-2";
pub const SERVICE: &str = "pds";

/// `{account}.dkr.ecr.{region}.amazonaws.com`
pub fn ecr_endpoint() -> String {
    format!("{AWS_ACCOUNT_ID}.dkr.ecr.{AWS_REGION}.amazonaws.com")
}

/// The cluster ARN prefix, the context name gets appended to it
pub fn eks_context() -> String {
    format!("arn:aws:eks:{AWS_REGION}:{AWS_ACCOUNT_ID}:cluster/")
}

/// The values that do not depend on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub docker_context_path: PathBuf,
    pub service_path: PathBuf,
    pub service: String,
    pub ecr_endpoint: String,
    pub aws_region: String,
    pub eks_context: String,
}

impl DeployConfig {
    /// Resolves the config for the pds service invoked from `invocation_dir`.
    /// The docker context is the parent of the service directory.
    pub async fn pds(invocation_dir: impl AsRef<Path>) -> Result<Self> {
        let invocation_dir = invocation_dir.as_ref();
        let service_path = acquire_dir_path(invocation_dir)
            .await
            .stack_err("DeployConfig::pds -> service path")?;
        let docker_context_path = acquire_parent_dir_path(&service_path)
            .await
            .stack_err("DeployConfig::pds -> docker context path")?;
        Ok(Self {
            docker_context_path,
            service_path,
            service: SERVICE.to_owned(),
            ecr_endpoint: ecr_endpoint(),
            aws_region: AWS_REGION.to_owned(),
            eks_context: eks_context(),
        })
    }

    pub fn deployment(&self, force: bool, context: &str) -> ServiceDeployment {
        ServiceDeployment {
            docker_context_path: self.docker_context_path.clone(),
            service_path: self.service_path.clone(),
            service: self.service.clone(),
            ecr_endpoint: self.ecr_endpoint.clone(),
            aws_region: self.aws_region.clone(),
            eks_context: self.eks_context.clone(),
            force,
            context: context.to_owned(),
        }
    }
}
