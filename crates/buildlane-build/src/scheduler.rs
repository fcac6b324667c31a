//! Generic build scheduler
//!
//! Owns the build descriptor, runs the injected [`TaskDriver`] to assemble the
//! workload, submits it, and maps the observed workload status back into the
//! descriptor's phase.

use crate::context::BuildContext;
use crate::driver::{Assembly, TaskDriver};
use crate::error::{BuildError, Result};
use buildlane_core::{
    BuildPhase, ContainerBuild, PlatformClient, Resource, Submission, Workload, WorkloadPhase,
    WorkloadStatus,
};
use chrono::Utc;

pub const BUILD_LABEL: &str = "buildlane.io/build";
pub const STRATEGY_LABEL: &str = "buildlane.io/strategy";

pub struct Scheduler {
    build: ContainerBuild,
    context: BuildContext,
    driver: Box<dyn TaskDriver>,
    resources: Vec<Resource>,
}

impl Scheduler {
    pub fn new(build: ContainerBuild, context: BuildContext, driver: Box<dyn TaskDriver>) -> Self {
        Self {
            build,
            context,
            driver,
            resources: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &ContainerBuild {
        &self.build
    }

    pub fn into_descriptor(self) -> ContainerBuild {
        self.build
    }

    /// Strategy name of the injected driver
    pub fn strategy(&self) -> &str {
        self.driver.name()
    }

    /// Resources assembled by the last `schedule` call, workload last
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    fn skeleton(&self) -> Workload {
        Workload::new(self.build.namespace(), self.build.name())
            .with_label(BUILD_LABEL, self.build.name())
            .with_label(STRATEGY_LABEL, self.driver.name())
    }

    /// Assemble and submit the build workload
    ///
    /// Only a descriptor still in `Scheduling` is submitted; any other phase is
    /// returned untouched.
    pub async fn schedule(&mut self) -> Result<ContainerBuild> {
        if self.build.phase() != BuildPhase::Scheduling {
            tracing::debug!(
                "Build {}/{} already in phase {}, skipping submission",
                self.build.namespace(),
                self.build.name(),
                self.build.phase()
            );
            return Ok(self.build.clone());
        }

        let mut assembly = Assembly::new(self.skeleton());
        if let Err(e) = self
            .driver
            .configure(&self.context, &self.build, &mut assembly)
            .await
        {
            tracing::warn!(
                "Build {}/{} could not be assembled: {}",
                self.build.namespace(),
                self.build.name(),
                e
            );
            self.build.transition(BuildPhase::Error, Some(e.to_string()));
            return Err(e);
        }

        self.build.bind_task(self.driver.task());
        self.resources = assembly.into_resources();

        for resource in &self.resources {
            match self.context.client.create_if_absent(resource).await {
                Ok(Submission::Created) => {
                    tracing::debug!("Created {}", resource.key());
                }
                Ok(Submission::AlreadyExists) => {
                    tracing::debug!("{} already exists, keeping it", resource.key());
                }
                Err(e) => {
                    let err = BuildError::Submission(format!("{}: {}", resource.key(), e));
                    tracing::warn!("{}", err);
                    self.build.transition(BuildPhase::Error, Some(err.to_string()));
                    return Err(err);
                }
            }
        }

        self.build.metadata.created_at = Some(Utc::now());
        self.build.transition(BuildPhase::Pending, None);
        tracing::info!(
            "Scheduled build {}/{} with {} on {}",
            self.build.namespace(),
            self.build.name(),
            self.driver.name(),
            self.context.client.name()
        );

        Ok(self.build.clone())
    }

    /// Refresh the descriptor's phase from the platform
    pub async fn reconcile(&mut self) -> Result<ContainerBuild> {
        reconcile_build(self.context.client.as_ref(), &mut self.build).await?;
        Ok(self.build.clone())
    }
}

/// Refresh `build` from the live status of its workload
///
/// Terminal builds are never touched. A timeout breach forces `Error` without
/// asking the platform. A transport failure is returned with `build` left as
/// it was, so the caller can simply retry on its next poll.
pub async fn reconcile_build(client: &dyn PlatformClient, build: &mut ContainerBuild) -> Result<()> {
    if build.is_finished() {
        return Ok(());
    }

    // nothing submitted yet
    if build.phase() == BuildPhase::Scheduling {
        return Ok(());
    }

    if build.is_timed_out(Utc::now()) {
        let err = BuildError::Timeout(build.spec.timeout);
        tracing::warn!("Build {}/{}: {}", build.namespace(), build.name(), err);
        build.transition(BuildPhase::Error, Some(err.to_string()));
        return Ok(());
    }

    let status = client
        .workload_status(build.namespace(), build.name())
        .await?;

    let (phase, detail) = match status {
        Some(status) => map_status(&status),
        None => (
            BuildPhase::Error,
            Some(format!(
                "workload {}/{} not found",
                build.namespace(),
                build.name()
            )),
        ),
    };

    let previous = build.phase();
    if build.transition(phase, detail) {
        tracing::info!(
            "Build {}/{}: {} -> {}",
            build.namespace(),
            build.name(),
            previous,
            phase
        );
    }
    Ok(())
}

/// Workload status to build phase, with the error detail for unhappy endings
fn map_status(status: &WorkloadStatus) -> (BuildPhase, Option<String>) {
    match status.phase {
        WorkloadPhase::Pending => (BuildPhase::Pending, None),
        WorkloadPhase::Running => (BuildPhase::Running, None),
        WorkloadPhase::Succeeded => (BuildPhase::Succeeded, None),
        WorkloadPhase::Failed => {
            let detail = match (status.exit_code, &status.message) {
                (Some(code), Some(message)) => format!("exit code {}: {}", code, message),
                (Some(code), None) => format!("exit code {}", code),
                (None, Some(message)) => message.clone(),
                (None, None) => "workload failed".to_string(),
            };
            (BuildPhase::Failed, Some(detail))
        }
        WorkloadPhase::Unknown => (
            BuildPhase::Error,
            Some(
                status
                    .message
                    .clone()
                    .unwrap_or_else(|| "workload status unknown".to_string()),
            ),
        ),
    }
}
