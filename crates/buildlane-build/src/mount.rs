use crate::context::BuildResource;
use crate::error::{BuildError, Result};
use buildlane_core::{ConfigMap, KeyToPath, Resource, Volume, VolumeMount, VolumeSource};
use std::collections::BTreeMap;

/// コンテキストボリュームの名前
pub const CONTEXT_VOLUME: &str = "build-context";

/// コンテキストディレクトリに配置するボリューム一式
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMount {
    pub volume: Volume,
    pub mount: VolumeMount,
    /// ワークロードより先に投入する ConfigMap
    pub config_map: Option<Resource>,
}

/// ビルドリソースをコンテキストディレクトリにマウントする
///
/// リソースがあれば `<build>-context` という ConfigMap にまとめ、各リソースを
/// 相対パスのまま投影する。リソースが無ければ空のディレクトリを用意する。
pub fn mount_resources(
    namespace: &str,
    build_name: &str,
    context_dir: &str,
    resources: &[BuildResource],
) -> Result<ContextMount> {
    let mount = VolumeMount::new(CONTEXT_VOLUME, context_dir);

    if resources.is_empty() {
        tracing::debug!("No build resources, mounting an empty context at {}", context_dir);
        return Ok(ContextMount {
            volume: Volume {
                name: CONTEXT_VOLUME.to_string(),
                source: VolumeSource::EmptyDir {},
            },
            mount,
            config_map: None,
        });
    }

    let config_map_name = format!("{}-context", build_name);
    let mut config_map = ConfigMap::new(namespace, &config_map_name);
    config_map
        .labels
        .insert("buildlane.io/build".to_string(), build_name.to_string());

    let mut items = Vec::with_capacity(resources.len());
    let mut keys: BTreeMap<String, &str> = BTreeMap::new();

    for resource in resources {
        validate_resource_name(&resource.name)?;

        let key = config_map_key(&resource.name);
        if let Some(previous) = keys.insert(key.clone(), &resource.name) {
            return Err(BuildError::ResourceResolution(format!(
                "build resources '{}' and '{}' collide",
                previous, resource.name
            )));
        }

        config_map
            .binary_data
            .insert(key.clone(), resource.content.clone());
        items.push(KeyToPath::new(key, &resource.name));
    }

    tracing::debug!(
        "Mounting {} build resources from config map {} at {}",
        items.len(),
        config_map_name,
        context_dir
    );

    Ok(ContextMount {
        volume: Volume {
            name: CONTEXT_VOLUME.to_string(),
            source: VolumeSource::ConfigMap {
                name: config_map_name,
                items,
            },
        },
        mount,
        config_map: Some(Resource::ConfigMap(config_map)),
    })
}

/// 空でない相対パスで、`..` や空のセグメントを含まないこと
fn validate_resource_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(BuildError::ResourceResolution(format!(
            "invalid build resource name '{}': {}",
            name, reason
        )))
    };

    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.starts_with('/') {
        return invalid("must be a relative path");
    }
    for segment in name.split('/') {
        match segment {
            "" => return invalid("empty path segment"),
            "." | ".." => return invalid("path must not contain '.' or '..' segments"),
            _ => {}
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return invalid("only ASCII letters, digits, '-', '_' and '.' are allowed");
        }
    }
    Ok(())
}

/// ConfigMap のキーにはスラッシュを使えないため置き換える
fn config_map_key(name: &str) -> String {
    name.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_resources_mounts_empty_dir() {
        let mount = mount_resources("builds", "greetings", "/workspace", &[]).unwrap();
        assert_eq!(mount.volume.source, VolumeSource::EmptyDir {});
        assert_eq!(mount.mount.mount_path, "/workspace");
        assert!(mount.config_map.is_none());
    }

    #[test]
    fn test_resources_become_config_map() {
        let resources = vec![
            BuildResource::new("greetings.sw.json", b"{}".to_vec()),
            BuildResource::new("src/main/resources/application.properties", b"a=b".to_vec()),
        ];
        let mount = mount_resources("builds", "greetings", "/workspace", &resources).unwrap();

        let Some(Resource::ConfigMap(cm)) = mount.config_map else {
            panic!("expected a config map");
        };
        assert_eq!(cm.name, "greetings-context");
        assert_eq!(cm.namespace, "builds");
        assert_eq!(cm.get("greetings.sw.json"), Some(&b"{}"[..]));
        assert_eq!(
            cm.get("src_main_resources_application.properties"),
            Some(&b"a=b"[..])
        );

        match mount.volume.source {
            VolumeSource::ConfigMap { name, items } => {
                assert_eq!(name, "greetings-context");
                assert_eq!(items[1].path, "src/main/resources/application.properties");
            }
            other => panic!("unexpected volume source {:?}", other),
        }
    }

    #[test]
    fn test_rejects_escaping_paths() {
        for name in ["", "/etc/passwd", "../secret", "a//b", "a/./b", "a b"] {
            let resources = vec![BuildResource::new(name, Vec::new())];
            let err = mount_resources("builds", "greetings", "/workspace", &resources).unwrap_err();
            assert!(
                matches!(err, BuildError::ResourceResolution(_)),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_rejects_colliding_keys() {
        let resources = vec![
            BuildResource::new("a/b.txt", Vec::new()),
            BuildResource::new("a_b.txt", Vec::new()),
        ];
        let err = mount_resources("builds", "greetings", "/workspace", &resources).unwrap_err();
        assert!(err.to_string().contains("collide"));
    }
}
