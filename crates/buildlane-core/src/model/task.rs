//! ビルドタスク定義
//!
//! タスクは戦略ごとの直和型として表現する。1 エントリに複数の戦略が
//! 同時に入ることは型の上で起こり得ない。

use crate::workload::ResourceRequirements;
use serde::{Deserialize, Serialize};

/// イメージの公開先レジストリ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    /// レジストリアドレス（例: `quay.io/myorg`）。空の場合は内部レジストリを探索する
    #[serde(default)]
    pub address: String,
    /// TLS 検証を行わない
    #[serde(default)]
    pub insecure: bool,
    /// 認証情報を持つシークレット名。空の場合は認証なし
    #[serde(default)]
    pub secret: String,
}

impl RegistrySpec {
    pub fn has_address(&self) -> bool {
        !self.address.is_empty()
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }

    /// `<address>/<image:tag>` 形式の公開先
    pub fn destination(&self, image: &str) -> String {
        format!("{}/{}", self.address.trim_end_matches('/'), image)
    }
}

/// 全戦略共通の公開設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTask {
    /// ビルドリソースを配置するコンテナ内ディレクトリ
    pub context_dir: String,
    #[serde(default)]
    pub base_image: String,
    /// 公開するイメージ名（`name:tag`）
    pub image: String,
    #[serde(default)]
    pub registry: RegistrySpec,
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuildBaseTask {
    pub name: String,
    #[serde(flatten)]
    pub publish: PublishTask,
}

/// JVM イメージ組み立て戦略のタスク
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JibTask {
    #[serde(flatten)]
    pub base: ContainerBuildBaseTask,
}

/// デーモンレスビルダー戦略のタスク
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanikoTask {
    #[serde(flatten)]
    pub base: ContainerBuildBaseTask,
    #[serde(default)]
    pub cache: KanikoCache,
    /// executor にそのまま渡す追加フラグ
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanikoCache {
    #[serde(default)]
    pub enabled: bool,
    /// レイヤーキャッシュを保持する PVC 名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<String>,
}

/// 戦略ごとのタスク
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerBuildTask {
    Jib(JibTask),
    Kaniko(KanikoTask),
}

impl ContainerBuildTask {
    /// ルーティングやログ用の短い識別子
    pub fn kind(&self) -> &'static str {
        match self {
            ContainerBuildTask::Jib(_) => "jib",
            ContainerBuildTask::Kaniko(_) => "kaniko",
        }
    }

    pub fn base(&self) -> &ContainerBuildBaseTask {
        match self {
            ContainerBuildTask::Jib(task) => &task.base,
            ContainerBuildTask::Kaniko(task) => &task.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ContainerBuildBaseTask {
        match self {
            ContainerBuildTask::Jib(task) => &mut task.base,
            ContainerBuildTask::Kaniko(task) => &mut task.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn publish(&self) -> &PublishTask {
        &self.base().publish
    }

    /// 同じ戦略のタスクかどうか
    pub fn same_variant(&self, other: &ContainerBuildTask) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<JibTask> for ContainerBuildTask {
    fn from(task: JibTask) -> Self {
        ContainerBuildTask::Jib(task)
    }
}

impl From<KanikoTask> for ContainerBuildTask {
    fn from(task: KanikoTask) -> Self {
        ContainerBuildTask::Kaniko(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jib(name: &str) -> ContainerBuildTask {
        JibTask {
            base: ContainerBuildBaseTask {
                name: name.to_string(),
                ..Default::default()
            },
        }
        .into()
    }

    #[test]
    fn test_destination() {
        let registry = RegistrySpec {
            address: "registry.local:5000/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            registry.destination("greetings:latest"),
            "registry.local:5000/greetings:latest"
        );
    }

    #[test]
    fn test_same_variant() {
        let kaniko: ContainerBuildTask = KanikoTask::default().into();
        assert!(jib("a").same_variant(&jib("b")));
        assert!(!jib("a").same_variant(&kaniko));
    }

    #[test]
    fn test_task_serializes_as_tagged_variant() {
        let json = serde_json::to_value(jib("JibTask")).unwrap();
        assert_eq!(json["jib"]["name"], "JibTask");

        let back: ContainerBuildTask = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), "jib");
        assert_eq!(back.name(), "JibTask");
    }
}
