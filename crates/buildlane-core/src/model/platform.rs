//! プラットフォーム設定
//!
//! どのハンドラ（ビルド戦略 × 公開戦略）を使うかを決める読み取り専用の入力。
//!
//! YAML形式：
//! ```yaml
//! namespace: sonataflow-builder
//! name: platform
//! spec:
//!   buildStrategy: pod
//!   publishStrategy: jib
//!   registry:
//!     insecure: true
//!   timeoutSeconds: 300
//! ```

use super::build::BuildStrategy;
use super::task::RegistrySpec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// デフォルトのビルドタイムアウト（5分）
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// イメージの公開方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStrategy {
    /// JVM イメージ組み立て（ビルドツール内でプッシュまで行う）
    #[default]
    Jib,
    /// デーモンレスビルダー
    Kaniko,
}

impl PublishStrategy {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jib" => Some(PublishStrategy::Jib),
            "kaniko" => Some(PublishStrategy::Kaniko),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishStrategy::Jib => write!(f, "jib"),
            PublishStrategy::Kaniko => write!(f, "kaniko"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformBuildSpec {
    pub build_strategy: BuildStrategy,
    pub publish_strategy: PublishStrategy,
    pub registry: RegistrySpec,
    #[serde(rename = "timeoutSeconds", with = "super::duration_secs")]
    pub timeout: Duration,
    /// ビルドするイメージのベースイメージ
    pub base_image: String,
    /// ビルダーコンテナのイメージ。未指定の場合は戦略ごとのデフォルト
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder_image: Option<String>,
}

impl Default for PlatformBuildSpec {
    fn default() -> Self {
        Self {
            build_strategy: BuildStrategy::default(),
            publish_strategy: PublishStrategy::default(),
            registry: RegistrySpec::default(),
            timeout: DEFAULT_BUILD_TIMEOUT,
            base_image: String::new(),
            builder_image: None,
        }
    }
}

/// ビルドを実行するプラットフォームの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformBuild {
    pub namespace: String,
    pub name: String,
    pub spec: PlatformBuildSpec,
}

impl Default for PlatformBuild {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name: "platform".to_string(),
            spec: PlatformBuildSpec::default(),
        }
    }
}
