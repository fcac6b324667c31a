//! Scheduler handler registry
//!
//! Picks the strategy that matches the platform configuration and builds a
//! scheduler with that strategy's driver injected.

use crate::context::BuildContext;
use crate::driver::jib::{DEFAULT_JIB_CONTEXT_DIR, JIB_TASK_NAME};
use crate::driver::kaniko::{DEFAULT_KANIKO_CONTEXT_DIR, KANIKO_TASK_NAME};
use crate::driver::{JibDriver, KanikoDriver};
use crate::error::{BuildError, Result};
use crate::scheduler::Scheduler;
use buildlane_core::{
    BuildStrategy, ContainerBuild, ContainerBuildBaseTask, ContainerBuildSpec, ContainerBuildTask,
    JibTask, KanikoTask, PlatformBuild, PublishStrategy, PublishTask,
};
use tracing::{debug, instrument};

/// What the caller wants built, and on which platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBuilderInfo {
    /// Target image, `name:tag`
    pub final_image_name: String,
    /// Name of the build descriptor and its workload
    pub build_unique_name: String,
    pub platform: PlatformBuild,
}

impl ContainerBuilderInfo {
    pub fn new(
        final_image_name: impl Into<String>,
        build_unique_name: impl Into<String>,
        platform: PlatformBuild,
    ) -> Self {
        Self {
            final_image_name: final_image_name.into(),
            build_unique_name: build_unique_name.into(),
            platform,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.final_image_name.is_empty() {
            return Err(BuildError::Configuration("target image name is empty".to_string()));
        }
        if self.build_unique_name.is_empty() {
            return Err(BuildError::Configuration("build name is empty".to_string()));
        }
        let timeout = self.platform.spec.timeout;
        if timeout.is_zero() {
            return Err(BuildError::Configuration(
                "build timeout must be greater than zero".to_string(),
            ));
        }
        // descriptors store the timeout in whole seconds
        if timeout.subsec_nanos() != 0 {
            return Err(BuildError::Configuration(format!(
                "build timeout must be a whole number of seconds, got {:?}",
                timeout
            )));
        }
        Ok(())
    }

    fn publish_task(&self, context_dir: &str) -> PublishTask {
        PublishTask {
            context_dir: context_dir.to_string(),
            base_image: self.platform.spec.base_image.clone(),
            image: self.final_image_name.clone(),
            registry: self.platform.spec.registry.clone(),
            resources: Default::default(),
        }
    }

    fn descriptor(&self, task: ContainerBuildTask) -> ContainerBuild {
        ContainerBuild::new(
            &self.platform.namespace,
            &self.build_unique_name,
            ContainerBuildSpec {
                tasks: vec![task],
                strategy: self.platform.spec.build_strategy,
                timeout: self.platform.spec.timeout,
            },
        )
    }
}

/// One build/publish strategy combination
pub trait SchedulerHandler: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, info: &ContainerBuilderInfo) -> bool;

    fn create_scheduler(&self, info: &ContainerBuilderInfo, ctx: BuildContext) -> Result<Scheduler>;
}

pub struct JibSchedulerHandler;

impl SchedulerHandler for JibSchedulerHandler {
    fn name(&self) -> &str {
        "jib"
    }

    fn can_handle(&self, info: &ContainerBuilderInfo) -> bool {
        info.platform.spec.build_strategy == BuildStrategy::Pod
            && info.platform.spec.publish_strategy == PublishStrategy::Jib
    }

    fn create_scheduler(&self, info: &ContainerBuilderInfo, ctx: BuildContext) -> Result<Scheduler> {
        info.validate()?;

        let task = JibTask {
            base: ContainerBuildBaseTask {
                name: JIB_TASK_NAME.to_string(),
                publish: info.publish_task(DEFAULT_JIB_CONTEXT_DIR),
            },
        };
        let build = info.descriptor(task.clone().into());
        let driver = JibDriver::new(task, info.platform.spec.builder_image.clone());

        Ok(Scheduler::new(build, ctx, Box::new(driver)))
    }
}

pub struct KanikoSchedulerHandler;

impl SchedulerHandler for KanikoSchedulerHandler {
    fn name(&self) -> &str {
        "kaniko"
    }

    fn can_handle(&self, info: &ContainerBuilderInfo) -> bool {
        info.platform.spec.build_strategy == BuildStrategy::Pod
            && info.platform.spec.publish_strategy == PublishStrategy::Kaniko
    }

    fn create_scheduler(&self, info: &ContainerBuilderInfo, ctx: BuildContext) -> Result<Scheduler> {
        info.validate()?;

        let task = KanikoTask {
            base: ContainerBuildBaseTask {
                name: KANIKO_TASK_NAME.to_string(),
                publish: info.publish_task(DEFAULT_KANIKO_CONTEXT_DIR),
            },
            ..Default::default()
        };
        let build = info.descriptor(task.clone().into());
        let driver = KanikoDriver::new(task, info.platform.spec.builder_image.clone());

        Ok(Scheduler::new(build, ctx, Box::new(driver)))
    }
}

pub struct HandlerRegistry {
    handlers: Vec<Box<dyn SchedulerHandler>>,
}

impl HandlerRegistry {
    /// Registry without any handler
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Registry with the jib and kaniko handlers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JibSchedulerHandler);
        registry.register(KanikoSchedulerHandler);
        registry
    }

    pub fn register(&mut self, handler: impl SchedulerHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// The single handler able to serve `info`
    ///
    /// No match and more than one match are both configuration errors.
    #[instrument(level = "debug", skip(self, info), fields(
        build = %info.platform.spec.build_strategy,
        publish = %info.platform.spec.publish_strategy,
    ))]
    pub fn select(&self, info: &ContainerBuilderInfo) -> Result<&dyn SchedulerHandler> {
        let matching: Vec<&dyn SchedulerHandler> = self
            .handlers
            .iter()
            .filter(|h| h.can_handle(info))
            .map(|h| &**h)
            .collect();

        match matching.as_slice() {
            [] => Err(BuildError::Configuration(format!(
                "no scheduler handler for build strategy '{}' with publish strategy '{}'",
                info.platform.spec.build_strategy, info.platform.spec.publish_strategy
            ))),
            [handler] => {
                debug!(handler = handler.name(), "handler selected");
                Ok(*handler)
            }
            many => {
                let names: Vec<&str> = many.iter().map(|h| h.name()).collect();
                Err(BuildError::Configuration(format!(
                    "ambiguous platform configuration, handlers [{}] all match",
                    names.join(", ")
                )))
            }
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
