//! Workload から Docker API パラメータへの変換

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::error::{ContainerError, Result};
use bollard::container::{Config, CreateContainerOptions};
use bollard::models::{
    ContainerState, ContainerStateStatusEnum, HostConfig, Mount, MountTypeEnum,
};
use buildlane_core::{Container, Workload, WorkloadPhase, WorkloadStatus};
use std::collections::HashMap;
use std::path::PathBuf;

/// コンテナに付与するワークロード識別ラベル
pub const WORKLOAD_LABEL: &str = "buildlane.io/workload";

/// 非 root 実行時のユーザー
pub const NON_ROOT_USER: &str = "1000";

/// ボリュームの Docker 上での実体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeBinding {
    /// ホスト上に展開したディレクトリ
    Bind(PathBuf),
    /// 名前付きボリューム（永続ボリューム要求）
    Named(String),
    /// コンテナ寿命の匿名ボリューム
    Anonymous,
}

/// コンテナ名を生成: {namespace}-{workload}-{container}
pub fn container_name(namespace: &str, workload: &str, container: &str) -> String {
    format!("{}-{}-{}", namespace, workload, container)
}

/// ワークロードを識別するラベル値
pub fn workload_label_value(namespace: &str, workload: &str) -> String {
    format!("{}/{}", namespace, workload)
}

/// WorkloadのContainerをDockerのコンテナ設定に変換
///
/// `env` は参照を解決済みの `KEY=value` 形式、`volumes` はボリューム名ごとの実体。
pub fn container_to_config(
    workload: &Workload,
    container: &Container,
    env: Vec<String>,
    volumes: &HashMap<String, VolumeBinding>,
) -> Result<(Config<String>, CreateContainerOptions<String>)> {
    let mut binds = Vec::new();
    let mut mounts = Vec::new();

    for mount in &container.volume_mounts {
        let binding = volumes.get(&mount.name).ok_or_else(|| {
            ContainerError::Unsupported(format!(
                "container {} mounts unknown volume {}",
                container.name, mount.name
            ))
        })?;
        let mode = if mount.read_only { "ro" } else { "rw" };

        match binding {
            VolumeBinding::Bind(host) => {
                binds.push(format!("{}:{}:{}", host.display(), mount.mount_path, mode));
            }
            VolumeBinding::Named(name) => {
                binds.push(format!("{}:{}:{}", name, mount.mount_path, mode));
            }
            VolumeBinding::Anonymous => mounts.push(Mount {
                target: Some(mount.mount_path.clone()),
                typ: Some(MountTypeEnum::VOLUME),
                read_only: Some(mount.read_only),
                ..Default::default()
            }),
        }
    }

    // セキュリティコンテキスト
    let security = &container.security_context;
    let mut security_opt = Vec::new();
    if !security.allow_privilege_escalation {
        security_opt.push("no-new-privileges:true".to_string());
    }

    // リソース制限
    let memory = container
        .resources
        .limits
        .get("memory")
        .map(|v| parse_memory(v).ok_or_else(|| invalid_quantity("memory", v)))
        .transpose()?;
    let nano_cpus = container
        .resources
        .limits
        .get("cpu")
        .map(|v| parse_cpu(v).ok_or_else(|| invalid_quantity("cpu", v)))
        .transpose()?;

    let host_config = Some(HostConfig {
        binds: Some(binds),
        mounts: Some(mounts),
        cap_drop: Some(security.capabilities_drop.clone()),
        security_opt: Some(security_opt),
        privileged: Some(security.privileged),
        memory,
        nano_cpus,
        ..Default::default()
    });

    let mut labels: HashMap<String, String> = workload
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    labels.insert(
        WORKLOAD_LABEL.to_string(),
        workload_label_value(&workload.namespace, &workload.name),
    );

    // Kubernetes の command/args は entrypoint/cmd に対応
    let config = Config {
        image: Some(container.image.clone()),
        env: Some(env),
        entrypoint: (!container.command.is_empty()).then(|| container.command.clone()),
        cmd: (!container.args.is_empty()).then(|| container.args.clone()),
        user: security.run_as_non_root.then(|| NON_ROOT_USER.to_string()),
        labels: Some(labels),
        host_config,
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: container_name(&workload.namespace, &workload.name, &container.name),
        platform: None,
    };

    Ok((config, options))
}

fn invalid_quantity(resource: &str, value: &str) -> ContainerError {
    ContainerError::Unsupported(format!("invalid {} limit '{}'", resource, value))
}

/// メモリ量をバイト数に変換（例: 512Mi, 1Gi, 100M, 1024）
pub fn parse_memory(value: &str) -> Option<i64> {
    const UNITS: [(&str, i64); 8] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("K", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];

    let value = value.trim();
    for (suffix, factor) in UNITS {
        if let Some(number) = value.strip_suffix(suffix) {
            return number.parse::<i64>().ok()?.checked_mul(factor);
        }
    }
    value.parse().ok()
}

/// CPU 量をナノ CPU に変換（例: 500m, 1, 1.5）
pub fn parse_cpu(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Some(millis) = value.strip_suffix('m') {
        return millis.parse::<i64>().ok()?.checked_mul(1_000_000);
    }
    let cores: f64 = value.parse().ok()?;
    if !cores.is_finite() || cores <= 0.0 {
        return None;
    }
    Some((cores * 1_000_000_000.0).round() as i64)
}

/// コンテナの状態をワークロードの状態に変換
pub fn state_to_status(state: &ContainerState) -> WorkloadStatus {
    match state.status {
        Some(ContainerStateStatusEnum::CREATED) => WorkloadStatus::pending(),
        Some(ContainerStateStatusEnum::RUNNING)
        | Some(ContainerStateStatusEnum::RESTARTING)
        | Some(ContainerStateStatusEnum::PAUSED) => WorkloadStatus::running(),
        Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD) => {
            let code = state.exit_code.unwrap_or(-1);
            let mut status = WorkloadStatus::exited(i32::try_from(code).unwrap_or(-1));
            if state.oom_killed == Some(true) {
                status = status.with_message("OOMKilled");
            } else if let Some(error) = state.error.as_ref().filter(|e| !e.is_empty()) {
                status = status.with_message(error.clone());
            }
            status
        }
        ref other => WorkloadStatus::unknown(format!("container state {:?}", other)),
    }
}

/// 複数コンテナの状態を 1 つにまとめる
///
/// 1 つでも失敗・不明なら全体もそれ、全て成功なら成功、1 つでも実行中なら実行中。
pub fn aggregate(statuses: Vec<WorkloadStatus>) -> Option<WorkloadStatus> {
    if statuses.is_empty() {
        return None;
    }

    for phase in [WorkloadPhase::Failed, WorkloadPhase::Unknown] {
        if let Some(status) = statuses.iter().find(|s| s.phase == phase) {
            return Some(status.clone());
        }
    }

    if statuses.iter().all(|s| s.phase == WorkloadPhase::Succeeded) {
        return Some(WorkloadStatus::exited(0));
    }
    if statuses.iter().any(|s| s.phase != WorkloadPhase::Pending) {
        return Some(WorkloadStatus::running());
    }
    Some(WorkloadStatus::pending())
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlane_core::{ResourceRequirements, SecurityContext, VolumeMount};

    fn workload() -> (Workload, Container) {
        let container = Container {
            name: "jibtask".to_string(),
            image: "quay.io/kiegroup/kogito-swf-builder:latest".to_string(),
            command: vec!["sh".to_string()],
            args: vec![
                "/home/kogito/launch/build-app.sh".to_string(),
                "/workspace".to_string(),
            ],
            volume_mounts: vec![
                VolumeMount::new("build-context", "/workspace"),
                VolumeMount::new("registry-secret", "/kaniko/.docker").read_only(),
            ],
            resources: ResourceRequirements {
                limits: [
                    ("memory".to_string(), "512Mi".to_string()),
                    ("cpu".to_string(), "500m".to_string()),
                ]
                .into(),
                ..Default::default()
            },
            security_context: SecurityContext::restricted(),
            ..Default::default()
        };
        let workload = Workload::new("builds", "greetings").with_label("buildlane.io/build", "greetings");
        (workload, container)
    }

    #[test]
    fn test_container_to_config() {
        let (workload, container) = workload();
        let volumes: HashMap<String, VolumeBinding> = [
            ("build-context".to_string(), VolumeBinding::Anonymous),
            (
                "registry-secret".to_string(),
                VolumeBinding::Bind(PathBuf::from("/tmp/buildlane/registry-secret")),
            ),
        ]
        .into();

        let (config, options) = container_to_config(
            &workload,
            &container,
            vec!["CONTAINER_BUILD=true".to_string()],
            &volumes,
        )
        .unwrap();

        assert_eq!(options.name, "builds-greetings-jibtask");
        assert_eq!(config.entrypoint, Some(vec!["sh".to_string()]));
        assert_eq!(config.user.as_deref(), Some(NON_ROOT_USER));
        assert_eq!(
            config.labels.as_ref().unwrap().get(WORKLOAD_LABEL).map(String::as_str),
            Some("builds/greetings")
        );

        let host = config.host_config.unwrap();
        assert_eq!(
            host.binds,
            Some(vec![
                "/tmp/buildlane/registry-secret:/kaniko/.docker:ro".to_string()
            ])
        );
        assert_eq!(host.mounts.unwrap()[0].target.as_deref(), Some("/workspace"));
        assert_eq!(host.cap_drop, Some(vec!["ALL".to_string()]));
        assert_eq!(host.security_opt, Some(vec!["no-new-privileges:true".to_string()]));
        assert_eq!(host.privileged, Some(false));
        assert_eq!(host.memory, Some(512 * 1024 * 1024));
        assert_eq!(host.nano_cpus, Some(500_000_000));
    }

    #[test]
    fn test_unknown_volume_is_rejected() {
        let (workload, container) = workload();
        let result = container_to_config(&workload, &container, vec![], &HashMap::new());
        assert!(matches!(result, Err(ContainerError::Unsupported(_))));
    }

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_memory("1Gi"), Some(1 << 30));
        assert_eq!(parse_memory("100M"), Some(100_000_000));
        assert_eq!(parse_memory("2048"), Some(2048));
        assert_eq!(parse_memory("lots"), None);
        assert_eq!(parse_cpu("1.5"), Some(1_500_000_000));
        assert_eq!(parse_cpu("250m"), Some(250_000_000));
        assert_eq!(parse_cpu("-1"), None);
    }

    #[test]
    fn test_state_to_status() {
        let exited = |code| ContainerState {
            status: Some(ContainerStateStatusEnum::EXITED),
            exit_code: Some(code),
            ..Default::default()
        };

        assert_eq!(state_to_status(&exited(0)).phase, WorkloadPhase::Succeeded);
        let failed = state_to_status(&exited(17));
        assert_eq!(failed.phase, WorkloadPhase::Failed);
        assert_eq!(failed.exit_code, Some(17));

        let running = ContainerState {
            status: Some(ContainerStateStatusEnum::RUNNING),
            ..Default::default()
        };
        assert_eq!(state_to_status(&running).phase, WorkloadPhase::Running);

        let created = ContainerState {
            status: Some(ContainerStateStatusEnum::CREATED),
            ..Default::default()
        };
        assert_eq!(state_to_status(&created).phase, WorkloadPhase::Pending);
        assert_eq!(
            state_to_status(&ContainerState::default()).phase,
            WorkloadPhase::Unknown
        );
    }

    #[test]
    fn test_aggregate() {
        assert!(aggregate(vec![]).is_none());
        assert_eq!(
            aggregate(vec![WorkloadStatus::exited(0), WorkloadStatus::running()])
                .unwrap()
                .phase,
            WorkloadPhase::Running
        );
        assert_eq!(
            aggregate(vec![WorkloadStatus::exited(0), WorkloadStatus::exited(2)])
                .unwrap()
                .exit_code,
            Some(2)
        );
        assert_eq!(
            aggregate(vec![WorkloadStatus::pending(), WorkloadStatus::pending()])
                .unwrap()
                .phase,
            WorkloadPhase::Pending
        );
    }
}
