//! ドライバ共通の処理

use super::Assembly;
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::mount;
use buildlane_core::{
    Container, ContainerBuild, ContainerBuildBaseTask, PullPolicy, RegistrySpec, SecurityContext,
};

/// レジストリアドレスが空なら内部レジストリを探索して書き戻す
pub async fn resolve_registry_address(
    ctx: &BuildContext,
    namespace: &str,
    registry: &mut RegistrySpec,
) -> Result<()> {
    if registry.has_address() {
        return Ok(());
    }

    tracing::debug!("No registry address configured, looking up internal registry");
    let address = ctx
        .client
        .lookup_internal_registry(namespace)
        .await
        .map_err(|e| {
            tracing::warn!("Internal registry lookup failed: {}", e);
            BuildError::ResourceResolution(format!("internal registry lookup failed: {}", e))
        })?
        .ok_or_else(|| {
            tracing::warn!("No internal registry found in namespace {}", namespace);
            BuildError::ResourceResolution(format!(
                "no registry address configured and no internal registry found in namespace {}",
                namespace
            ))
        })?;

    tracing::debug!("Resolved internal registry: {}", address);
    registry.address = address;
    Ok(())
}

/// タスク名から決まるビルダーコンテナの骨組み
///
/// セキュリティコンテキストは戦略に関わらず常に制限付き。
pub fn builder_container(task: &ContainerBuildBaseTask, image: impl Into<String>) -> Container {
    Container {
        name: task.name.to_lowercase(),
        image: image.into(),
        image_pull_policy: PullPolicy::IfNotPresent,
        resources: task.publish.resources.clone(),
        security_context: SecurityContext::restricted(),
        ..Default::default()
    }
}

/// ビルドリソースをコンテキストディレクトリにマウントする
pub fn attach_context(
    ctx: &BuildContext,
    build: &ContainerBuild,
    context_dir: &str,
    container: &mut Container,
    assembly: &mut Assembly,
) -> Result<()> {
    let mounted =
        mount::mount_resources(build.namespace(), build.name(), context_dir, &ctx.resources)?;

    assembly.workload.spec.volumes.push(mounted.volume);
    container.volume_mounts.push(mounted.mount);
    if let Some(config_map) = mounted.config_map {
        assembly.resources.push(config_map);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlane_core::{InMemoryPlatform, PublishTask};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_configured_address_is_kept() {
        let ctx = BuildContext::new(Arc::new(
            InMemoryPlatform::new().with_internal_registry("10.0.0.1:5000"),
        ));
        let mut registry = RegistrySpec {
            address: "quay.io/acme".to_string(),
            ..Default::default()
        };

        resolve_registry_address(&ctx, "builds", &mut registry)
            .await
            .unwrap();
        assert_eq!(registry.address, "quay.io/acme");
    }

    #[tokio::test]
    async fn test_empty_address_uses_internal_registry() {
        let ctx = BuildContext::new(Arc::new(
            InMemoryPlatform::new().with_internal_registry("10.0.0.1:5000"),
        ));
        let mut registry = RegistrySpec::default();

        resolve_registry_address(&ctx, "builds", &mut registry)
            .await
            .unwrap();
        assert_eq!(registry.address, "10.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_missing_internal_registry_aborts() {
        let ctx = BuildContext::new(Arc::new(InMemoryPlatform::new()));
        let mut registry = RegistrySpec::default();

        let err = resolve_registry_address(&ctx, "builds", &mut registry)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::ResourceResolution(_)));
    }

    #[test]
    fn test_builder_container_is_restricted() {
        let task = ContainerBuildBaseTask {
            name: "JibTask".to_string(),
            publish: PublishTask::default(),
        };
        let container = builder_container(&task, "builder:latest");
        assert_eq!(container.name, "jibtask");
        assert_eq!(container.image_pull_policy, PullPolicy::IfNotPresent);
        assert_eq!(container.security_context, SecurityContext::restricted());
    }
}
