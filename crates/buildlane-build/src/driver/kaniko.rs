//! デーモンレスビルダー戦略
//!
//! executor がコンテキストディレクトリの Dockerfile からイメージをビルドし、
//! 公開先へプッシュする。認証情報はカタログに従ってマウントする。

use super::{Assembly, TaskDriver, common};
use crate::context::BuildContext;
use crate::error::Result;
use crate::secret::RegistrySecretResolver;
use async_trait::async_trait;
use buildlane_core::{
    ContainerBuild, ContainerBuildTask, KanikoTask, Volume, VolumeMount, VolumeSource,
};

pub const KANIKO_TASK_NAME: &str = "KanikoTask";

pub const DEFAULT_KANIKO_CONTEXT_DIR: &str = "/kaniko/context";

pub const DEFAULT_KANIKO_EXECUTOR_IMAGE: &str = "gcr.io/kaniko-project/executor:v1.9.1";

/// レイヤーキャッシュのマウント先
pub const KANIKO_CACHE_DIR: &str = "/kaniko/cache";

const CACHE_VOLUME: &str = "kaniko-cache";

pub struct KanikoDriver {
    task: KanikoTask,
    executor_image: String,
    resolver: RegistrySecretResolver,
}

impl KanikoDriver {
    pub fn new(task: KanikoTask, executor_image: Option<String>) -> Self {
        Self {
            task,
            executor_image: executor_image
                .unwrap_or_else(|| DEFAULT_KANIKO_EXECUTOR_IMAGE.to_string()),
            resolver: RegistrySecretResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: RegistrySecretResolver) -> Self {
        self.resolver = resolver;
        self
    }

    fn cache_claim(&self) -> Option<&str> {
        if !self.task.cache.enabled {
            return None;
        }
        self.task.cache.persistent_volume_claim.as_deref()
    }

    fn args(&self) -> Vec<String> {
        let publish = &self.task.base.publish;

        let mut args = vec![
            "--dockerfile=Dockerfile".to_string(),
            format!("--context=dir://{}", publish.context_dir),
            format!("--destination={}", publish.registry.destination(&publish.image)),
        ];

        if !publish.base_image.is_empty() {
            args.push(format!("--build-arg=BASE_IMAGE={}", publish.base_image));
        }

        if self.cache_claim().is_some() {
            args.push("--cache=true".to_string());
            args.push(format!("--cache-dir={}", KANIKO_CACHE_DIR));
        }

        if publish.registry.insecure {
            args.push("--insecure".to_string());
            args.push("--insecure-pull".to_string());
            args.push("--skip-tls-verify".to_string());
        }

        args.extend(self.task.additional_flags.iter().cloned());
        args
    }
}

#[async_trait]
impl TaskDriver for KanikoDriver {
    fn name(&self) -> &str {
        "kaniko"
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
        let mut container = common::builder_container(&self.task.base, &self.executor_image);
        container.args = self.args();

        if let Some(mount) = self
            .resolver
            .resolve(
                ctx.client.as_ref(),
                build.namespace(),
                &self.task.base.publish.registry,
            )
            .await?
        {
            mount.apply(
                &mut container.env,
                &mut assembly.workload.spec.volumes,
                &mut container.volume_mounts,
            );
        }

        if let Some(claim) = self.cache_claim() {
            assembly.workload.spec.volumes.push(Volume {
                name: CACHE_VOLUME.to_string(),
                source: VolumeSource::PersistentVolumeClaim {
                    claim_name: claim.to_string(),
                },
            });
            container
                .volume_mounts
                .push(VolumeMount::new(CACHE_VOLUME, KANIKO_CACHE_DIR));
        }

        container.env.extend(ctx.proxy.env());

        common::attach_context(ctx, build, &context_dir, &mut container, assembly)?;

        tracing::debug!(
            "Kaniko executor container {} with {} args",
            container.name,
            container.args.len()
        );
        assembly.workload.spec.containers.push(container);
        Ok(())
    }
}
