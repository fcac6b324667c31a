//! Orchestration platform client trait definition

use crate::error::Result;
use crate::workload::{ConfigMap, Secret, Workload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Orchestration platform abstraction trait
///
/// Every backend (in-memory, local Docker engine, ...) implements this trait
/// so the build scheduler never depends on how workloads are actually run.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Returns the platform name (e.g., "memory", "docker")
    fn name(&self) -> &str;

    /// Submit a resource unless one with the same identity already exists
    async fn create_if_absent(&self, resource: &Resource) -> Result<Submission>;

    /// Observe the status of a submitted workload
    ///
    /// `Ok(None)` means the workload does not exist on the platform.
    async fn workload_status(&self, namespace: &str, name: &str) -> Result<Option<WorkloadStatus>>;

    /// Fetch a secret, `Ok(None)` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Find the address of the platform's internal image registry
    async fn lookup_internal_registry(&self, namespace: &str) -> Result<Option<String>>;
}

/// Resource submitted to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Workload(Workload),
    ConfigMap(ConfigMap),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Workload(_) => "Workload",
            Resource::ConfigMap(_) => "ConfigMap",
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Resource::Workload(w) => &w.namespace,
            Resource::ConfigMap(c) => &c.namespace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Workload(w) => &w.name,
            Resource::ConfigMap(c) => &c.name,
        }
    }

    /// Get the full resource key (kind/namespace/name)
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.kind(), self.namespace(), self.name())
    }
}

/// Outcome of a create-if-absent submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Created,
    AlreadyExists,
}

/// Phase reported by the platform for a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Observed workload status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub phase: WorkloadPhase,
    /// Exit code of the build container once it terminated
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}

impl WorkloadStatus {
    pub fn pending() -> Self {
        Self {
            phase: WorkloadPhase::Pending,
            exit_code: None,
            message: None,
        }
    }

    pub fn running() -> Self {
        Self {
            phase: WorkloadPhase::Running,
            exit_code: None,
            message: None,
        }
    }

    /// Terminated container; zero is success, anything else is a failure
    pub fn exited(code: i32) -> Self {
        Self {
            phase: if code == 0 {
                WorkloadPhase::Succeeded
            } else {
                WorkloadPhase::Failed
            },
            exit_code: Some(code),
            message: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            phase: WorkloadPhase::Unknown,
            exit_code: None,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
