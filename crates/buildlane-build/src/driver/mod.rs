//! Task drivers
//!
//! A driver turns one strategy-specific task into a fully wired builder
//! container. The generic [`Scheduler`](crate::scheduler::Scheduler) only sees
//! the [`TaskDriver`] trait, so strategy details never leak into it.

pub mod common;
pub mod jib;
pub mod kaniko;

pub use jib::JibDriver;
pub use kaniko::KanikoDriver;

use crate::context::BuildContext;
use crate::error::Result;
use async_trait::async_trait;
use buildlane_core::{ContainerBuild, ContainerBuildTask, Resource, Workload};

/// Resources a driver contributes to, submitted by the scheduler
///
/// Drivers only ever append to the workload's containers, volumes, env and
/// mounts, and to `resources`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub workload: Workload,
    /// Supporting resources submitted before the workload
    pub resources: Vec<Resource>,
}

impl Assembly {
    pub fn new(workload: Workload) -> Self {
        Self {
            workload,
            resources: Vec::new(),
        }
    }

    /// Everything to submit, supporting resources first and the workload last
    pub fn into_resources(self) -> Vec<Resource> {
        let mut resources = self.resources;
        resources.push(Resource::Workload(self.workload));
        resources
    }
}

/// Strategy-specific part of a scheduler
#[async_trait]
pub trait TaskDriver: Send + Sync {
    /// Strategy name, e.g. "jib"
    fn name(&self) -> &str;

    /// Current task, including anything resolved during `configure`
    fn task(&self) -> ContainerBuildTask;

    /// Add this task's builder container and its wiring to `assembly`
    async fn configure(
        &mut self,
        ctx: &BuildContext,
        build: &ContainerBuild,
        assembly: &mut Assembly,
    ) -> Result<()>;
}
