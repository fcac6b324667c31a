use crate::context::{BuildContext, BuildResource, ProxySettings};
use crate::error::{BuildError, Result};
use crate::registry::{ContainerBuilderInfo, HandlerRegistry};
use crate::scheduler::{self, Scheduler};
use buildlane_core::{ContainerBuild, PlatformClient};
use std::sync::Arc;

/// 新しいビルドを組み立てる
pub fn new_build(info: ContainerBuilderInfo) -> Builder {
    Builder {
        info,
        resources: Vec::new(),
        client: None,
        registry: None,
        proxy: None,
    }
}

/// 既存のビルド記述子を再観測する
pub fn from_build(build: ContainerBuild) -> FromBuild {
    FromBuild {
        build,
        client: None,
    }
}

pub struct Builder {
    info: ContainerBuilderInfo,
    resources: Vec<BuildResource>,
    client: Option<Arc<dyn PlatformClient>>,
    registry: Option<HandlerRegistry>,
    proxy: Option<ProxySettings>,
}

impl Builder {
    /// コンテキストディレクトリに配置するファイルを追加
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources.push(BuildResource::new(name, content));
        self
    }

    pub fn with_client(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// 既定の jib / kaniko 以外のハンドラを使う場合
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// プロセス環境から読み取る代わりに明示的なプロキシ設定を使う
    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// ハンドラを選択し、スケジューラを作る（投入はしない）
    pub fn scheduler(self) -> Result<Scheduler> {
        let client = self.client.ok_or_else(|| {
            BuildError::Configuration("no platform client configured".to_string())
        })?;

        let mut ctx = BuildContext::new(client).with_resources(self.resources);
        if let Some(proxy) = self.proxy {
            ctx = ctx.with_proxy(proxy);
        }

        let registry = self.registry.unwrap_or_default();
        let handler = registry.select(&self.info)?;
        tracing::debug!(
            "Creating {} scheduler for build {}",
            handler.name(),
            self.info.build_unique_name
        );
        handler.create_scheduler(&self.info, ctx)
    }

    /// ワークロードを組み立てて投入する
    ///
    /// 組み立て・投入に失敗した場合、フェーズが `Error` になった記述子は
    /// 破棄され、エラーだけが返る。失敗時にも記述子が必要な場合は
    /// [`Builder::scheduler`] で得た [`Scheduler`] の
    /// [`Scheduler::schedule`] と [`Scheduler::descriptor`] を使う。
    pub async fn schedule(self) -> Result<ContainerBuild> {
        let mut scheduler = self.scheduler()?;
        scheduler.schedule().await
    }
}

pub struct FromBuild {
    build: ContainerBuild,
    client: Option<Arc<dyn PlatformClient>>,
}

impl FromBuild {
    pub fn with_client(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// プラットフォームの状態からフェーズを更新する
    pub async fn reconcile(self) -> Result<ContainerBuild> {
        let client = self.client.ok_or_else(|| {
            BuildError::Configuration("no platform client configured".to_string())
        })?;

        let mut build = self.build;
        scheduler::reconcile_build(client.as_ref(), &mut build).await?;
        Ok(build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlane_core::{BuildPhase, InMemoryPlatform, PlatformBuild};

    #[tokio::test]
    async fn test_schedule_without_client_is_configuration_error() {
        let info = ContainerBuilderInfo::new("greetings:latest", "greetings", PlatformBuild::default());
        let err = new_build(info).schedule().await.unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reconcile_without_client_is_configuration_error() {
        let info = ContainerBuilderInfo::new("greetings:latest", "greetings", PlatformBuild::default());
        let scheduler = new_build(info)
            .with_client(Arc::new(InMemoryPlatform::new()))
            .scheduler()
            .unwrap();

        let err = from_build(scheduler.into_descriptor())
            .reconcile()
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_failed_schedule_keeps_error_descriptor_on_scheduler() {
        // 内部レジストリが無いので組み立てに失敗する
        let platform = Arc::new(InMemoryPlatform::new());
        let info = ContainerBuilderInfo::new("greetings:latest", "greetings", PlatformBuild::default());

        let err = new_build(info.clone())
            .with_client(platform.clone())
            .schedule()
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::ResourceResolution(_)));

        let mut scheduler = new_build(info).with_client(platform).scheduler().unwrap();
        let err = scheduler.schedule().await.unwrap_err();
        assert_eq!(scheduler.descriptor().phase(), BuildPhase::Error);
        assert_eq!(
            scheduler.descriptor().status.error.as_deref(),
            Some(err.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_resources_reach_the_platform() {
        let platform = Arc::new(InMemoryPlatform::new().with_internal_registry("10.0.0.1:5000"));
        let info = ContainerBuilderInfo::new("greetings:latest", "greetings", PlatformBuild::default());

        let build = new_build(info)
            .with_resource("greetings.sw.json", b"{}".to_vec())
            .with_client(platform.clone())
            .with_proxy(ProxySettings::default())
            .schedule()
            .await
            .unwrap();

        assert_eq!(build.phase(), BuildPhase::Pending);
        let cm = platform.config_map("default", "greetings-context").unwrap();
        assert_eq!(cm.get("greetings.sw.json"), Some(&b"{}"[..]));
    }
}
