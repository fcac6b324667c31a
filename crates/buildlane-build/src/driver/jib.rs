//! JVM イメージ組み立て戦略
//!
//! ビルダーイメージ内のビルドスクリプトが、埋め込みのビルドツールで
//! イメージを組み立ててレジストリへのプッシュまで行う。

use super::{Assembly, TaskDriver, common};
use crate::context::BuildContext;
use crate::error::Result;
use async_trait::async_trait;
use buildlane_core::{ContainerBuild, ContainerBuildTask, EnvVar, JibTask};

pub const JIB_TASK_NAME: &str = "JibTask";

/// ビルドリソースを配置するディレクトリ
pub const DEFAULT_JIB_CONTEXT_DIR: &str = "/home/kogito/serverless-workflow-project/resources";

/// ビルダーイメージ内の起動スクリプト
pub const DEFAULT_JIB_BUILD_SCRIPT: &str = "/home/kogito/launch/build-app.sh";

pub const DEFAULT_JIB_BUILDER_IMAGE: &str = "quay.io/kiegroup/kogito-swf-builder:latest";

pub struct JibDriver {
    task: JibTask,
    builder_image: String,
}

impl JibDriver {
    pub fn new(task: JibTask, builder_image: Option<String>) -> Self {
        Self {
            task,
            builder_image: builder_image.unwrap_or_else(|| DEFAULT_JIB_BUILDER_IMAGE.to_string()),
        }
    }

    /// ビルドツールに渡す環境変数（順序固定）
    fn env(&self, ctx: &BuildContext) -> Vec<EnvVar> {
        let publish = &self.task.base.publish;
        let registry = &publish.registry;

        let mut env = vec![EnvVar::literal(
            "QUARKUS_CONTAINER_IMAGE_IMAGE",
            registry.destination(&publish.image),
        )];

        if registry.insecure {
            env.push(EnvVar::literal("QUARKUS_CONTAINER_IMAGE_INSECURE", "true"));
        }

        // 認証情報は値をコピーせずシークレットを参照する
        if registry.has_secret() {
            env.push(EnvVar::from_secret(
                "QUARKUS_CONTAINER_IMAGE_USERNAME",
                &registry.secret,
                "username",
            ));
            env.push(EnvVar::from_secret(
                "QUARKUS_CONTAINER_IMAGE_PASSWORD",
                &registry.secret,
                "password",
            ));
        }

        env.extend(ctx.proxy.env());
        env.push(EnvVar::literal("CONTAINER_BUILD", "true"));
        env.push(EnvVar::literal("QUARKUS_CONTAINER_IMAGE_PUSH", "true"));
        env
    }
}

#[async_trait]
impl TaskDriver for JibDriver {
    fn name(&self) -> &str {
        "jib"
    }

    fn task(&self) -> ContainerBuildTask {
        self.task.clone().into()
    }

    async fn configure(
        &mut self,
        ctx: &BuildContext,
        build: &ContainerBuild,
        assembly: &mut Assembly,
    ) -> Result<()> {
        common::resolve_registry_address(ctx, build.namespace(), &mut self.task.base.publish.registry)
            .await?;

        let context_dir = self.task.base.publish.context_dir.clone();
        let mut container = common::builder_container(&self.task.base, &self.builder_image);
        container.command = vec!["sh".to_string()];
        container.args = vec![DEFAULT_JIB_BUILD_SCRIPT.to_string(), context_dir.clone()];
        container.env.extend(self.env(ctx));

        common::attach_context(ctx, build, &context_dir, &mut container, assembly)?;

        tracing::debug!(
            "Jib builder container {} publishes {}",
            container.name,
            self.task.base.publish.registry.destination(&self.task.base.publish.image)
        );
        assembly.workload.spec.containers.push(container);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProxySettings;
    use buildlane_core::{
        BuildStrategy, ContainerBuildBaseTask, ContainerBuildSpec, EnvVarSource, InMemoryPlatform,
        PublishTask, RegistrySpec, Workload,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn task(registry: RegistrySpec) -> JibTask {
        JibTask {
            base: ContainerBuildBaseTask {
                name: JIB_TASK_NAME.to_string(),
                publish: PublishTask {
                    context_dir: DEFAULT_JIB_CONTEXT_DIR.to_string(),
                    image: "greetings:latest".to_string(),
                    registry,
                    ..Default::default()
                },
            },
        }
    }

    fn build() -> ContainerBuild {
        ContainerBuild::new(
            "builds",
            "greetings",
            ContainerBuildSpec {
                tasks: vec![],
                strategy: BuildStrategy::Pod,
                timeout: Duration::from_secs(60),
            },
        )
    }

    fn ctx() -> BuildContext {
        BuildContext::new(Arc::new(
            InMemoryPlatform::new().with_internal_registry("10.0.0.1:5000"),
        ))
        .with_proxy(ProxySettings::default())
    }

    async fn configure(driver: &mut JibDriver, ctx: &BuildContext) -> Assembly {
        let build = build();
        let mut assembly = Assembly::new(Workload::new("builds", "greetings"));
        driver.configure(ctx, &build, &mut assembly).await.unwrap();
        assembly
    }

    #[tokio::test]
    async fn test_env_order_with_secret_and_insecure() {
        let mut driver = JibDriver::new(
            task(RegistrySpec {
                address: "quay.io/acme".to_string(),
                insecure: true,
                secret: "regcred".to_string(),
            }),
            None,
        );
        let assembly = configure(&mut driver, &ctx()).await;

        let container = &assembly.workload.spec.containers[0];
        let names: Vec<&str> = container.env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "QUARKUS_CONTAINER_IMAGE_IMAGE",
                "QUARKUS_CONTAINER_IMAGE_INSECURE",
                "QUARKUS_CONTAINER_IMAGE_USERNAME",
                "QUARKUS_CONTAINER_IMAGE_PASSWORD",
                "CONTAINER_BUILD",
                "QUARKUS_CONTAINER_IMAGE_PUSH",
            ]
        );

        let password = container.env_var("QUARKUS_CONTAINER_IMAGE_PASSWORD").unwrap();
        assert!(password.value.is_none());
        assert_eq!(
            password.value_from,
            Some(EnvVarSource::SecretKeyRef {
                name: "regcred".to_string(),
                key: "password".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_invocation_and_mounts() {
        let mut driver = JibDriver::new(task(RegistrySpec::default()), None);
        let assembly = configure(&mut driver, &ctx()).await;

        let container = &assembly.workload.spec.containers[0];
        assert_eq!(container.name, "jibtask");
        assert_eq!(container.image, DEFAULT_JIB_BUILDER_IMAGE);
        assert_eq!(container.command, vec!["sh"]);
        assert_eq!(
            container.args,
            vec![DEFAULT_JIB_BUILD_SCRIPT, DEFAULT_JIB_CONTEXT_DIR]
        );
        assert_eq!(container.volume_mounts[0].mount_path, DEFAULT_JIB_CONTEXT_DIR);
        assert_eq!(assembly.workload.spec.volumes.len(), 1);
        assert!(assembly.resources.is_empty());
    }

    #[tokio::test]
    async fn test_resolved_registry_is_written_back() {
        let mut driver = JibDriver::new(task(RegistrySpec::default()), None);
        configure(&mut driver, &ctx()).await;

        assert_eq!(driver.task().publish().registry.address, "10.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_proxy_passthrough_sits_before_markers() {
        let ctx = ctx().with_proxy(ProxySettings {
            https_proxy: Some("http://proxy.local:3128".to_string()),
            ..Default::default()
        });
        let mut driver = JibDriver::new(
            task(RegistrySpec {
                address: "quay.io/acme".to_string(),
                ..Default::default()
            }),
            Some("registry.local/builder:1.0".to_string()),
        );
        let assembly = configure(&mut driver, &ctx).await;

        let container = &assembly.workload.spec.containers[0];
        assert_eq!(container.image, "registry.local/builder:1.0");
        let names: Vec<&str> = container.env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "QUARKUS_CONTAINER_IMAGE_IMAGE",
                "HTTPS_PROXY",
                "CONTAINER_BUILD",
                "QUARKUS_CONTAINER_IMAGE_PUSH",
            ]
        );
    }
}
