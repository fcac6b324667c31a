//! ビルド記述子（ContainerBuild）

use super::phase::BuildPhase;
use super::task::ContainerBuildTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// ビルドの実行方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// プラットフォーム上の短命ワークロードとして実行
    #[default]
    Pod,
    /// プロセス内で実行（このクレートのハンドラは対応しない）
    Routine,
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStrategy::Pod => write!(f, "pod"),
            BuildStrategy::Routine => write!(f, "routine"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    /// ワークロードを投入した時刻。タイムアウト判定の起点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuildSpec {
    #[serde(default)]
    pub tasks: Vec<ContainerBuildTask>,
    #[serde(default)]
    pub strategy: BuildStrategy,
    #[serde(rename = "timeoutSeconds", with = "super::duration_secs")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuildStatus {
    #[serde(default)]
    pub phase: BuildPhase,
    /// 直近のエラー詳細
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 何をどうビルドするか、そして現在どの段階にあるかの記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBuild {
    pub metadata: ObjectMeta,
    pub spec: ContainerBuildSpec,
    #[serde(default)]
    pub status: ContainerBuildStatus,
}

impl ContainerBuild {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: ContainerBuildSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                created_at: None,
            },
            spec,
            status: ContainerBuildStatus::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn phase(&self) -> BuildPhase {
        self.status.phase
    }

    pub fn is_finished(&self) -> bool {
        self.status.phase.is_terminal()
    }

    /// 先頭のタスク（論理ビルド 1 つにつきタスクは 1 つ）
    pub fn task(&self) -> Option<&ContainerBuildTask> {
        self.spec.tasks.first()
    }

    /// 同じ戦略のタスクを置き換える。存在しなければ追加する
    pub fn bind_task(&mut self, task: ContainerBuildTask) {
        match self.spec.tasks.iter_mut().find(|t| t.same_variant(&task)) {
            Some(slot) => *slot = task,
            None => self.spec.tasks.push(task),
        }
    }

    /// フェーズを前方向にのみ進める
    ///
    /// 遷移できた場合は `true`。後退・終端からの遷移は無視して `false` を返す。
    pub fn transition(&mut self, phase: BuildPhase, error: Option<String>) -> bool {
        if !self.status.phase.can_transition_to(phase) {
            return false;
        }

        tracing::debug!(
            "Build {}/{} phase {} -> {}",
            self.metadata.namespace,
            self.metadata.name,
            self.status.phase,
            phase
        );
        self.status.phase = phase;
        if error.is_some() {
            self.status.error = error;
        }
        true
    }

    /// 投入からの経過時間
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.metadata
            .created_at
            .and_then(|created| (now - created).to_std().ok())
    }

    /// 非終端のまま `spec.timeout` を超過しているか
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        !self.is_finished()
            && self
                .elapsed(now)
                .is_some_and(|elapsed| elapsed > self.spec.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{ContainerBuildBaseTask, JibTask, KanikoTask, PublishTask};

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

    fn jib_task(image: &str) -> ContainerBuildTask {
        JibTask {
            base: ContainerBuildBaseTask {
                name: "JibTask".to_string(),
                publish: PublishTask {
                    image: image.to_string(),
                    ..Default::default()
                },
            },
        }
        .into()
    }

    #[test]
    fn test_bind_task_replaces_same_variant() {
        let mut build = build();
        build.bind_task(jib_task("a:1"));
        build.bind_task(jib_task("a:2"));

        assert_eq!(build.spec.tasks.len(), 1);
        assert_eq!(build.task().unwrap().publish().image, "a:2");
    }

    #[test]
    fn test_bind_task_appends_other_variant() {
        let mut build = build();
        build.bind_task(jib_task("a:1"));
        build.bind_task(KanikoTask::default().into());

        assert_eq!(build.spec.tasks.len(), 2);
    }

    #[test]
    fn test_transition_only_forward() {
        let mut build = build();
        assert!(build.transition(BuildPhase::Pending, None));
        assert!(build.transition(BuildPhase::Running, None));
        assert!(!build.transition(BuildPhase::Pending, None));
        assert_eq!(build.phase(), BuildPhase::Running);

        assert!(build.transition(BuildPhase::Failed, Some("exit code 17".to_string())));
        assert!(!build.transition(BuildPhase::Error, Some("late".to_string())));
        assert_eq!(build.phase(), BuildPhase::Failed);
        assert_eq!(build.status.error.as_deref(), Some("exit code 17"));
    }

    #[test]
    fn test_timeout_detection() {
        let mut build = build();
        let now = Utc::now();
        assert!(!build.is_timed_out(now));

        build.metadata.created_at = Some(now - chrono::Duration::seconds(61));
        assert!(build.is_timed_out(now));

        build.metadata.created_at = Some(now - chrono::Duration::seconds(30));
        assert!(!build.is_timed_out(now));
    }

    #[test]
    fn test_terminal_build_never_times_out() {
        let mut build = build();
        build.metadata.created_at = Some(Utc::now() - chrono::Duration::hours(1));
        build.status.phase = BuildPhase::Succeeded;
        assert!(!build.is_timed_out(Utc::now()));
    }

    #[test]
    fn test_serde_round_trip_keeps_timeout_seconds() {
        let json = serde_json::to_value(build()).unwrap();
        assert_eq!(json["spec"]["timeoutSeconds"], 60);
        assert_eq!(json["status"]["phase"], "Scheduling");
    }
}
