//! ローカルファイルシステム上のシークレット・ConfigMap ストア
//!
//! Docker には Secret や ConfigMap に相当する仕組みがないため、
//! ホスト上のディレクトリに展開してバインドマウントする。
//!
//! ```text
//! <secrets>/<namespace>/<secret>/<key>
//! <staging>/<namespace>/configmaps/<name>/<key>
//! <staging>/<namespace>/<workload>/<volume>/<path>
//! ```

use crate::error::{ContainerError, Result};
use buildlane_core::{ConfigMap, Secret, Submission};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// ディレクトリ単位でシークレットを保持するストア
#[derive(Debug, Clone)]
pub struct LocalSecretStore {
    root: PathBuf,
}

impl LocalSecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// シークレットを読み込む（存在しなければ None）
    pub fn read(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let dir = self.root.join(file_name(namespace)?).join(file_name(name)?);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut secret = Secret::new(namespace, name);
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().into_owned();
            secret.data.insert(key, fs::read(entry.path())?);
        }
        Ok(Some(secret))
    }

    /// シークレットの 1 キーの値
    pub fn value(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>> {
        self.read(namespace, name)?
            .and_then(|mut secret| secret.data.remove(key))
            .ok_or_else(|| ContainerError::SecretKeyNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}

/// ConfigMap とボリューム展開用の作業ディレクトリ
#[derive(Debug, Clone)]
pub struct Staging {
    root: PathBuf,
}

impl Staging {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn config_map_dir(&self, namespace: &str, name: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(file_name(namespace)?)
            .join("configmaps")
            .join(file_name(name)?))
    }

    /// ConfigMap を保存する（既に存在すれば何もしない）
    pub fn store_config_map(&self, config_map: &ConfigMap) -> Result<Submission> {
        let dir = self.config_map_dir(&config_map.namespace, &config_map.name)?;
        if dir.exists() {
            return Ok(Submission::AlreadyExists);
        }

        fs::create_dir_all(&dir)?;
        let entries = config_map
            .data
            .iter()
            .map(|(k, v)| (k, v.as_bytes()))
            .chain(config_map.binary_data.iter().map(|(k, v)| (k, v.as_slice())));
        for (key, value) in entries {
            fs::write(dir.join(file_name(key)?), value)?;
        }

        tracing::debug!(
            "Stored config map {}/{} at {}",
            config_map.namespace,
            config_map.name,
            dir.display()
        );
        Ok(Submission::Created)
    }

    /// 保存済みの ConfigMap を読み込む
    pub fn load_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        let dir = self.config_map_dir(namespace, name)?;
        if !dir.is_dir() {
            return Err(ContainerError::ConfigMapNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        let mut config_map = ConfigMap::new(namespace, name);
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let key = entry.file_name().to_string_lossy().into_owned();
            config_map.binary_data.insert(key, fs::read(entry.path())?);
        }
        Ok(config_map)
    }

    /// ボリュームの内容をワークロード用ディレクトリに書き出す
    ///
    /// 以前の内容は置き換えられる。戻り値はバインドマウント元のパス。
    pub fn project(
        &self,
        namespace: &str,
        workload: &str,
        volume: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<PathBuf> {
        let dir = self
            .root
            .join(file_name(namespace)?)
            .join(file_name(workload)?)
            .join(file_name(volume)?);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        for (path, content) in files {
            let target = dir.join(relative_path(path)?);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }
        Ok(dir)
    }
}

/// 1 階層分のファイル名として使えるか確認
fn file_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ContainerError::Unsupported(format!(
            "'{}' cannot be used as a file name",
            name
        )));
    }
    Ok(name)
}

/// ボリューム内の相対パスか確認
fn relative_path(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let valid = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !valid {
        return Err(ContainerError::Unsupported(format!(
            "volume item path '{}' must be relative",
            path
        )));
    }
    Ok(candidate)
}
