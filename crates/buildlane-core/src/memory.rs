//! In-memory platform
//!
//! Keeps every submitted resource in process memory. Workload status, secrets
//! and the internal registry are driven by the caller, which makes it the
//! backend of choice for tests and dry runs.

use crate::client::{PlatformClient, Resource, Submission, WorkloadStatus};
use crate::error::{PlatformError, Result};
use crate::workload::{ConfigMap, Secret, Workload};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    /// Resources indexed by kind/namespace/name
    resources: BTreeMap<String, Resource>,
    statuses: HashMap<(String, String), WorkloadStatus>,
    secrets: HashMap<(String, String), Secret>,
    internal_registry: Option<String>,
    submission_failure: Option<String>,
    status_failure: Option<String>,
    create_calls: usize,
}

/// Platform backed by process memory
#[derive(Default)]
pub struct InMemoryPlatform {
    inner: Mutex<Inner>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Address returned by `lookup_internal_registry`
    pub fn with_internal_registry(self, address: impl Into<String>) -> Self {
        self.set_internal_registry(address);
        self
    }

    pub fn set_internal_registry(&self, address: impl Into<String>) {
        self.lock().internal_registry = Some(address.into());
    }

    pub fn with_secret(self, secret: Secret) -> Self {
        self.insert_secret(secret);
        self
    }

    pub fn insert_secret(&self, secret: Secret) {
        let key = (secret.namespace.clone(), secret.name.clone());
        self.lock().secrets.insert(key, secret);
    }

    /// Set the status reported for a workload
    pub fn set_workload_status(&self, namespace: &str, name: &str, status: WorkloadStatus) {
        self.lock()
            .statuses
            .insert((namespace.to_string(), name.to_string()), status);
    }

    /// Make every subsequent submission fail with `message`
    pub fn fail_submissions(&self, message: impl Into<String>) {
        self.lock().submission_failure = Some(message.into());
    }

    /// Make every subsequent status query fail with `message`
    pub fn fail_status_queries(&self, message: impl Into<String>) {
        self.lock().status_failure = Some(message.into());
    }

    /// Remove a workload, as if it had been deleted behind our back
    pub fn delete_workload(&self, namespace: &str, name: &str) {
        let key = Resource::Workload(Workload::new(namespace, name)).key();
        self.lock().resources.remove(&key);
    }

    /// Snapshot of all stored resources
    pub fn resources(&self) -> Vec<Resource> {
        self.lock().resources.values().cloned().collect()
    }

    pub fn workload(&self, namespace: &str, name: &str) -> Option<Workload> {
        let key = Resource::Workload(Workload::new(namespace, name)).key();
        match self.lock().resources.get(&key) {
            Some(Resource::Workload(w)) => Some(w.clone()),
            _ => None,
        }
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        let key = Resource::ConfigMap(ConfigMap::new(namespace, name)).key();
        match self.lock().resources.get(&key) {
            Some(Resource::ConfigMap(c)) => Some(c.clone()),
            _ => None,
        }
    }

    /// Number of `create_if_absent` calls, including ones that found an existing resource
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_if_absent(&self, resource: &Resource) -> Result<Submission> {
        let mut inner = self.lock();
        inner.create_calls += 1;

        if let Some(message) = &inner.submission_failure {
            return Err(PlatformError::Api(message.clone()));
        }

        let key = resource.key();
        if inner.resources.contains_key(&key) {
            return Ok(Submission::AlreadyExists);
        }

        inner.resources.insert(key, resource.clone());
        Ok(Submission::Created)
    }

    async fn workload_status(&self, namespace: &str, name: &str) -> Result<Option<WorkloadStatus>> {
        let inner = self.lock();

        if let Some(message) = &inner.status_failure {
            return Err(PlatformError::Api(message.clone()));
        }

        let key = Resource::Workload(Workload::new(namespace, name)).key();
        if !inner.resources.contains_key(&key) {
            return Ok(None);
        }

        let status = inner
            .statuses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_else(WorkloadStatus::pending);
        Ok(Some(status))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self
            .lock()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn lookup_internal_registry(&self, _namespace: &str) -> Result<Option<String>> {
        Ok(self.lock().internal_registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WorkloadPhase;

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let platform = InMemoryPlatform::new();
        let resource = Resource::Workload(Workload::new("builds", "greetings"));

        assert_eq!(
            platform.create_if_absent(&resource).await.unwrap(),
            Submission::Created
        );
        assert_eq!(
            platform.create_if_absent(&resource).await.unwrap(),
            Submission::AlreadyExists
        );
        assert_eq!(platform.resources().len(), 1);
        assert_eq!(platform.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_workload_status_defaults_to_pending() {
        let platform = InMemoryPlatform::new();
        assert!(platform.workload_status("builds", "greetings").await.unwrap().is_none());

        platform
            .create_if_absent(&Resource::Workload(Workload::new("builds", "greetings")))
            .await
            .unwrap();
        let status = platform.workload_status("builds", "greetings").await.unwrap().unwrap();
        assert_eq!(status.phase, WorkloadPhase::Pending);

        platform.set_workload_status("builds", "greetings", WorkloadStatus::exited(0));
        let status = platform.workload_status("builds", "greetings").await.unwrap().unwrap();
        assert_eq!(status.phase, WorkloadPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_submission_failure() {
        let platform = InMemoryPlatform::new();
        platform.fail_submissions("quota exceeded");

        let err = platform
            .create_if_absent(&Resource::Workload(Workload::new("builds", "greetings")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(platform.resources().is_empty());
    }

    #[test]
    fn test_secret_and_registry_lookup() {
        let platform = InMemoryPlatform::new()
            .with_internal_registry("10.0.0.1:5000")
            .with_secret(Secret::new("builds", "regcred").with_entry("username", "bob"));

        let secret = tokio_test::block_on(platform.get_secret("builds", "regcred")).unwrap();
        assert!(secret.unwrap().contains_key("username"));
        let missing = tokio_test::block_on(platform.get_secret("other", "regcred")).unwrap();
        assert!(missing.is_none());

        let registry = tokio_test::block_on(platform.lookup_internal_registry("builds")).unwrap();
        assert_eq!(registry.as_deref(), Some("10.0.0.1:5000"));
    }
}
