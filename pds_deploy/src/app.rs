use std::{io::Write, path::Path, process::ExitCode};

use deploy_kit::{deploy_service2, Deployer, DeploymentError};
use stacked_errors::{Result, StackableErr};
use tracing::info;

use crate::{env::apply_service_env, usage, Cli, DeployConfig};

/// How a deployment attempt ended, for everything short of an unrecognized
/// error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    Deployed,
    /// The collaborator returned a [DeploymentError]
    Failed,
}

impl DeployStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            DeployStatus::Deployed => ExitCode::SUCCESS,
            DeployStatus::Failed => ExitCode::from(1),
        }
    }
}

/// Prints the error message followed by the usage block
pub fn report_failure<W: Write>(out: &mut W, e: &DeploymentError) -> std::io::Result<()> {
    writeln!(out, "{e}")?;
    write!(out, "{}", usage())?;
    out.flush()
}

/// Writes the service environment, resolves the deployment from
/// `invocation_dir`, and dispatches it to `deployer`. Failure output goes to
/// `out`.
pub async fn run<D: Deployer, W: Write>(
    cli: &Cli,
    invocation_dir: &Path,
    deployer: &D,
    out: &mut W,
) -> Result<DeployStatus> {
    apply_service_env(&cli.context);
    let config = DeployConfig::pds(invocation_dir).await.stack()?;
    let deployment = config.deployment(cli.force, &cli.context);

    if cli.dry_run {
        info!("dry run, not deploying {deployment}");
        let plan = serde_json::to_string_pretty(&deployment).stack()?;
        writeln!(out, "{plan}").stack()?;
        return Ok(DeployStatus::Deployed)
    }

    match deploy_service2(deployer, &deployment).await.stack()? {
        Ok(()) => Ok(DeployStatus::Deployed),
        Err(e) => {
            report_failure(out, &e).stack()?;
            Ok(DeployStatus::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use clap::Parser;
    use deploy_kit::{DeployOutcome, ServiceDeployment};
    use stacked_errors::bail;

    use super::*;

    /// Records each call along with the service environment seen at call time
    struct RecordingDeployer {
        calls: Mutex<Vec<(ServiceDeployment, Option<String>, Option<String>)>>,
        outcome: DeployOutcome,
    }

    impl RecordingDeployer {
        fn new(outcome: DeployOutcome) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                outcome,
            }
        }
    }

    impl Deployer for RecordingDeployer {
        async fn deploy_service2(&self, deployment: &ServiceDeployment) -> Result<DeployOutcome> {
            self.calls.lock().unwrap().push((
                deployment.clone(),
                std::env::var("SUB_DOMAIN").ok(),
                std::env::var("PUBLIC_URL").ok(),
            ));
            Ok(self.outcome.clone())
        }
    }

    struct BrokenDeployer;

    impl Deployer for BrokenDeployer {
        async fn deploy_service2(&self, _: &ServiceDeployment) -> Result<DeployOutcome> {
            bail!("registry unreachable")
        }
    }

    /// Holds [crate::env::ENV_LOCK] for the whole run, since `run` writes the
    /// service environment
    async fn run_args<D: Deployer>(args: &[&str], deployer: &D) -> (Result<DeployStatus>, String) {
        let _env = crate::env::ENV_LOCK.lock().await;
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        let mut out = vec![];
        let res = run(
            &cli,
            Path::new(env!("CARGO_MANIFEST_DIR")),
            deployer,
            &mut out,
        )
        .await;
        (res, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn deploys_without_force() {
        let deployer = RecordingDeployer::new(Ok(()));
        let (res, out) = run_args(&["deploy", "prod-test3"], &deployer).await;
        assert_eq!(res.unwrap(), DeployStatus::Deployed);
        assert!(out.is_empty());

        let calls = deployer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (deployment, sub_domain, public_url) = &calls[0];
        assert!(!deployment.force);
        assert_eq!(deployment.context, "prod-test3");
        assert_eq!(sub_domain.as_deref(), Some("test"));
        assert_eq!(
            public_url.as_deref(),
            Some("https://pds.test.waverly.social")
        );
    }

    #[tokio::test]
    async fn forced_production_deploy_gets_test_env() {
        let deployer = RecordingDeployer::new(Ok(()));
        let (res, _) = run_args(&["deploy", "--force", "prod-live1"], &deployer).await;
        assert_eq!(res.unwrap(), DeployStatus::Deployed);

        let calls = deployer.calls.lock().unwrap();
        let (deployment, sub_domain, _) = &calls[0];
        assert!(deployment.force);
        assert_eq!(deployment.context, "prod-live1");
        assert_eq!(sub_domain.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn derived_paths() {
        let deployer = RecordingDeployer::new(Ok(()));
        run_args(&["deploy", "prod-test3"], &deployer)
            .await
            .0
            .unwrap();
        let service_path = std::fs::canonicalize(env!("CARGO_MANIFEST_DIR")).unwrap();
        let calls = deployer.calls.lock().unwrap();
        let deployment = &calls[0].0;
        assert_eq!(deployment.service_path, service_path);
        assert_eq!(
            Some(deployment.docker_context_path.as_path()),
            service_path.parent()
        );
        assert_eq!(deployment.service, "pds");
        assert_eq!(deployment.aws_region, "us-east-2");
    }

    #[tokio::test]
    async fn deployment_error_prints_message_then_usage() {
        let deployer = RecordingDeployer::new(Err(DeploymentError::new("branch check failed")));
        let (res, out) = run_args(&["deploy", "prod-live1"], &deployer).await;
        let status = res.unwrap();
        assert_eq!(status, DeployStatus::Failed);
        assert_eq!(out, format!("branch check failed\n{}", usage()));
    }

    #[tokio::test]
    async fn other_errors_propagate() {
        let (res, out) = run_args(&["deploy", "prod-live1"], &BrokenDeployer).await;
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn dry_run_skips_the_deployer() {
        let deployer = RecordingDeployer::new(Ok(()));
        let (res, out) = run_args(&["deploy", "--dry-run", "prod-test3"], &deployer).await;
        assert_eq!(res.unwrap(), DeployStatus::Deployed);
        assert!(deployer.calls.lock().unwrap().is_empty());
        let plan: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(plan["context"], "prod-test3");
        assert_eq!(plan["force"], false);
        assert_eq!(plan["service"], "pds");
    }
}
