//! レジストリ認証情報の解決
//!
//! 既知の認証シークレットの形（サービスアカウント JSON、docker config）を
//! 順序付きカタログとして持ち、参照されたシークレットに含まれるキーから
//! マウント方法を決める。

use crate::error::{BuildError, Result};
use buildlane_core::{
    EnvVar, KeyToPath, PlatformClient, RegistrySpec, Volume, VolumeMount, VolumeSource,
};

/// 認証シークレットの形の記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySecret {
    /// シークレット内で期待するキー
    pub key: &'static str,
    /// マウント先ディレクトリ
    pub mount_path: &'static str,
    /// マウント先でのファイル名
    pub destination: &'static str,
    /// マウントしたファイルの絶対パスを設定する環境変数
    pub ref_env: Option<&'static str>,
}

impl RegistrySecret {
    /// マウントされたファイルの絶対パス
    pub fn file_path(&self) -> String {
        format!("{}/{}", self.mount_path.trim_end_matches('/'), self.destination)
    }
}

/// 順序付きの認証シークレットカタログ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySecretCatalogue {
    entries: Vec<RegistrySecret>,
}

impl RegistrySecretCatalogue {
    pub fn new(entries: Vec<RegistrySecret>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RegistrySecret] {
        &self.entries
    }
}

impl Default for RegistrySecretCatalogue {
    fn default() -> Self {
        Self::new(vec![
            RegistrySecret {
                key: "kaniko-secret.json",
                mount_path: "/secret",
                destination: "kaniko-secret.json",
                ref_env: Some("GOOGLE_APPLICATION_CREDENTIALS"),
            },
            RegistrySecret {
                key: "config.json",
                mount_path: "/kaniko/.docker",
                destination: "config.json",
                ref_env: None,
            },
            RegistrySecret {
                key: ".dockerconfigjson",
                mount_path: "/kaniko/.docker",
                destination: "config.json",
                ref_env: None,
            },
        ])
    }
}

/// 解決結果：ワークロードに追加するボリューム・マウント・環境変数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMount {
    pub volume: Volume,
    pub mount: VolumeMount,
    pub env: Option<EnvVar>,
}

impl SecretMount {
    /// 既存のエントリを置き換えず、末尾に追加する
    pub fn apply(
        self,
        env: &mut Vec<EnvVar>,
        volumes: &mut Vec<Volume>,
        mounts: &mut Vec<VolumeMount>,
    ) {
        volumes.push(self.volume);
        mounts.push(self.mount);
        if let Some(var) = self.env {
            env.push(var);
        }
    }
}

pub struct RegistrySecretResolver {
    catalogue: RegistrySecretCatalogue,
}

impl RegistrySecretResolver {
    pub fn new(catalogue: RegistrySecretCatalogue) -> Self {
        Self { catalogue }
    }

    /// `registry.secret` を読み取り、カタログの先頭から一致する形を探す
    ///
    /// シークレット名が空の場合は `Ok(None)`。
    pub async fn resolve(
        &self,
        client: &dyn PlatformClient,
        namespace: &str,
        registry: &RegistrySpec,
    ) -> Result<Option<SecretMount>> {
        if !registry.has_secret() {
            return Ok(None);
        }

        let secret = client
            .get_secret(namespace, &registry.secret)
            .await
            .map_err(|e| {
                BuildError::ResourceResolution(format!(
                    "failed to read registry secret {}/{}: {}",
                    namespace, registry.secret, e
                ))
            })?
            .ok_or_else(|| {
                BuildError::ResourceResolution(format!(
                    "registry secret {}/{} not found",
                    namespace, registry.secret
                ))
            })?;

        let Some(entry) = self
            .catalogue
            .entries()
            .iter()
            .find(|entry| secret.contains_key(entry.key))
        else {
            let expected: Vec<&str> = self.catalogue.entries().iter().map(|e| e.key).collect();
            tracing::warn!(
                "Registry secret {}/{} has none of the expected keys",
                namespace,
                registry.secret
            );
            return Err(BuildError::ResourceResolution(format!(
                "registry secret {}/{} must contain one of: {}",
                namespace,
                registry.secret,
                expected.join(", ")
            )));
        };

        tracing::debug!(
            "Registry secret {} resolved as {} at {}",
            registry.secret,
            entry.key,
            entry.file_path()
        );

        let volume_name = "registry-secret".to_string();
        Ok(Some(SecretMount {
            volume: Volume {
                name: volume_name.clone(),
                source: VolumeSource::Secret {
                    secret_name: registry.secret.clone(),
                    items: vec![KeyToPath::new(entry.key, entry.destination)],
                },
            },
            mount: VolumeMount::new(volume_name, entry.mount_path).read_only(),
            env: entry
                .ref_env
                .map(|name| EnvVar::literal(name, entry.file_path())),
        }))
    }
}

impl Default for RegistrySecretResolver {
    fn default() -> Self {
        Self::new(RegistrySecretCatalogue::default())
    }
}
