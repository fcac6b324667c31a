//! ローカル Docker エンジンをビルドプラットフォームとして使う

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::converter::{self, VolumeBinding, WORKLOAD_LABEL};
use crate::error::{ContainerError, Result};
use crate::staging::{LocalSecretStore, Staging};
use async_trait::async_trait;
use bollard::Docker;
use buildlane_core::{
    Container, EnvVarSource, PlatformClient, PullPolicy, Resource, Secret, Submission,
    VolumeSource, Workload, WorkloadStatus,
};
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;

/// 内部レジストリのアドレスを指定する環境変数
pub const INTERNAL_REGISTRY_ENV: &str = "BUILDLANE_INTERNAL_REGISTRY";
/// シークレットストアのディレクトリを指定する環境変数
pub const SECRETS_DIR_ENV: &str = "BUILDLANE_SECRETS_DIR";

/// Docker エンジン上でワークロードを実行するプラットフォーム
pub struct DockerPlatform {
    docker: Docker,
    secrets: LocalSecretStore,
    staging: Staging,
    internal_registry: Option<String>,
}

impl DockerPlatform {
    pub fn new(docker: Docker, secrets: LocalSecretStore, staging: Staging) -> Self {
        Self {
            docker,
            secrets,
            staging,
            internal_registry: None,
        }
    }

    pub fn with_internal_registry(mut self, address: impl Into<String>) -> Self {
        self.internal_registry = Some(address.into());
        self
    }

    /// ローカルの Docker に接続し、環境変数から設定を読み込む
    pub fn from_env() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))?;

        let secrets_dir = std::env::var(SECRETS_DIR_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::config_dir().map(|d| d.join("buildlane").join("secrets")))
            .unwrap_or_else(|| PathBuf::from(".buildlane/secrets"));
        let staging_dir = std::env::temp_dir().join("buildlane");

        let mut platform = Self::new(
            docker,
            LocalSecretStore::new(secrets_dir),
            Staging::new(staging_dir),
        );
        if let Ok(address) = std::env::var(INTERNAL_REGISTRY_ENV)
            && !address.is_empty()
        {
            platform.internal_registry = Some(address);
        }
        Ok(platform)
    }

    /// 接続確認
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }

    /// イメージの取得ポリシーに従ってイメージを用意
    async fn ensure_image(&self, image: &str, policy: PullPolicy) -> Result<()> {
        match policy {
            PullPolicy::Always => self.pull_image(image).await,
            PullPolicy::Never => Ok(()),
            PullPolicy::IfNotPresent => match self.docker.inspect_image(image).await {
                Ok(_) => Ok(()),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => self.pull_image(image).await,
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let (from_image, tag) = parse_image_tag(image);
        tracing::info!("Pulling image {}", image);

        let options = bollard::image::CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(
            Some(options),
            None,
            None::<bollard::auth::DockerCredentials>,
        );
        while let Some(info) = stream.next().await {
            match info {
                Ok(bollard::models::CreateImageInfo {
                    status: Some(status),
                    ..
                }) => tracing::trace!("{}: {}", image, status),
                Ok(_) => {}
                Err(e) => {
                    return Err(ContainerError::ImagePullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// 環境変数を KEY=value 形式に解決（シークレット参照はストアから読む）
    fn resolve_env(&self, namespace: &str, container: &Container) -> Result<Vec<String>> {
        container
            .env
            .iter()
            .map(|var| {
                let value = match (&var.value, &var.value_from) {
                    (_, Some(EnvVarSource::SecretKeyRef { name, key })) => {
                        let bytes = self.secrets.value(namespace, name, key)?;
                        String::from_utf8_lossy(&bytes).into_owned()
                    }
                    (Some(value), None) => value.clone(),
                    (None, None) => String::new(),
                };
                Ok(format!("{}={}", var.name, value))
            })
            .collect()
    }

    /// ボリューム定義をホスト上の実体に変換
    fn materialise_volumes(&self, workload: &Workload) -> Result<HashMap<String, VolumeBinding>> {
        let mut bindings = HashMap::new();

        for volume in &workload.spec.volumes {
            let binding = match &volume.source {
                VolumeSource::Secret { secret_name, items } => {
                    let secret = self
                        .secrets
                        .read(&workload.namespace, secret_name)?
                        .ok_or_else(|| ContainerError::SecretKeyNotFound {
                            namespace: workload.namespace.clone(),
                            name: secret_name.clone(),
                            key: "*".to_string(),
                        })?;
                    let files = select_items(&workload.namespace, secret_name, &secret.data, items)?;
                    VolumeBinding::Bind(self.staging.project(
                        &workload.namespace,
                        &workload.name,
                        &volume.name,
                        &files,
                    )?)
                }
                VolumeSource::ConfigMap { name, items } => {
                    let config_map = self.staging.load_config_map(&workload.namespace, name)?;
                    let files = select_items(&workload.namespace, name, &config_map.binary_data, items)?;
                    VolumeBinding::Bind(self.staging.project(
                        &workload.namespace,
                        &workload.name,
                        &volume.name,
                        &files,
                    )?)
                }
                VolumeSource::EmptyDir {} => VolumeBinding::Anonymous,
                VolumeSource::PersistentVolumeClaim { claim_name } => {
                    VolumeBinding::Named(claim_name.clone())
                }
            };
            bindings.insert(volume.name.clone(), binding);
        }

        Ok(bindings)
    }

    /// ワークロードの全コンテナを作成して起動
    async fn create_workload(&self, workload: &Workload) -> Result<Submission> {
        if workload.spec.containers.is_empty() {
            return Err(ContainerError::Unsupported(format!(
                "workload {}/{} has no containers",
                workload.namespace, workload.name
            )));
        }
        if self
            .workload_status_inner(&workload.namespace, &workload.name)
            .await?
            .is_some()
        {
            return Ok(Submission::AlreadyExists);
        }

        let volumes = self.materialise_volumes(workload)?;

        for container in &workload.spec.containers {
            self.ensure_image(&container.image, container.image_pull_policy)
                .await?;

            let env = self.resolve_env(&workload.namespace, container)?;
            let (config, options) =
                converter::container_to_config(workload, container, env, &volumes)?;
            let name = options.name.clone();

            match self.docker.create_container(Some(options), config).await {
                Ok(_) => tracing::debug!("Created container {}", name),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 409, ..
                }) => {
                    tracing::debug!("Container {} already exists", name);
                    return Ok(Submission::AlreadyExists);
                }
                Err(e) => return Err(e.into()),
            }

            self.docker
                .start_container(&name, None::<bollard::query_parameters::StartContainerOptions>)
                .await?;
            tracing::info!("Started container {}", name);
        }

        Ok(Submission::Created)
    }

    async fn workload_status_inner(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!(
                "{}={}",
                WORKLOAD_LABEL,
                converter::workload_label_value(namespace, name)
            )],
        );

        let options = bollard::container::ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        let mut statuses = Vec::with_capacity(containers.len());
        for summary in containers {
            let Some(id) = summary.id else { continue };
            let status = match self
                .docker
                .inspect_container(
                    &id,
                    None::<bollard::query_parameters::InspectContainerOptions>,
                )
                .await
            {
                Ok(details) => details
                    .state
                    .as_ref()
                    .map(converter::state_to_status)
                    .unwrap_or_else(|| WorkloadStatus::unknown("container state unavailable")),
                // 一覧取得後に削除されたコンテナ
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => continue,
                Err(e) => return Err(e.into()),
            };
            statuses.push(status);
        }

        Ok(converter::aggregate(statuses))
    }
}

#[async_trait]
impl PlatformClient for DockerPlatform {
    fn name(&self) -> &str {
        "docker"
    }

    async fn create_if_absent(&self, resource: &Resource) -> buildlane_core::Result<Submission> {
        let submission = match resource {
            Resource::ConfigMap(config_map) => self.staging.store_config_map(config_map)?,
            Resource::Workload(workload) => self.create_workload(workload).await?,
        };
        Ok(submission)
    }

    async fn workload_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> buildlane_core::Result<Option<WorkloadStatus>> {
        Ok(self.workload_status_inner(namespace, name).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> buildlane_core::Result<Option<Secret>> {
        Ok(self.secrets.read(namespace, name)?)
    }

    async fn lookup_internal_registry(
        &self,
        _namespace: &str,
    ) -> buildlane_core::Result<Option<String>> {
        Ok(self.internal_registry.clone())
    }
}

/// 指定されたキーだけをファイルとして取り出す（items が空なら全キー）
fn select_items(
    namespace: &str,
    name: &str,
    data: &std::collections::BTreeMap<String, Vec<u8>>,
    items: &[buildlane_core::KeyToPath],
) -> Result<Vec<(String, Vec<u8>)>> {
    if items.is_empty() {
        return Ok(data.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    }

    items
        .iter()
        .map(|item| {
            data.get(&item.key)
                .map(|value| (item.path.clone(), value.clone()))
                .ok_or_else(|| ContainerError::SecretKeyNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    key: item.key.clone(),
                })
        })
        .collect()
}

/// イメージ名とタグを分離
///
/// レジストリのポート番号（`localhost:5000/app`）はタグとして扱わない。
pub fn parse_image_tag(image: &str) -> (String, String) {
    if let Some((name, tag)) = image.rsplit_once(':')
        && !tag.contains('/')
    {
        return (name.to_string(), tag.to_string());
    }
    (image.to_string(), "latest".to_string())
}
