pub mod error;

pub use error::*;

use buildlane_core::{PlatformBuild, PublishStrategy};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルの候補（優先順）
const CANDIDATES: [&str; 2] = ["buildlane.local.yaml", "buildlane.yaml"];

/// グローバル設定のファイル名
const GLOBAL_FILE: &str = "platform.yaml";

/// buildlane の設定ディレクトリ（~/.config/buildlane）
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("buildlane"))
}

/// プラットフォーム設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 BUILDLANE_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: buildlane.local.yaml, buildlane.yaml
/// 3. ./.buildlane/ ディレクトリ内: 同様の順序
/// 4. ~/.config/buildlane/platform.yaml (グローバル設定)
pub fn find_platform_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("BUILDLANE_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "BUILDLANE_CONFIG_PATH points to a missing file: {}",
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    if let Some(path) = first_existing(&current_dir) {
        return Ok(path);
    }

    // 3. ./.buildlane/ ディレクトリで検索
    let local_dir = current_dir.join(".buildlane");
    if local_dir.is_dir()
        && let Some(path) = first_existing(&local_dir)
    {
        return Ok(path);
    }

    // 4. グローバル設定ファイル
    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join(GLOBAL_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::PlatformFileNotFound)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// YAML ファイルからプラットフォーム設定を読み込む
pub fn load_platform(path: &Path) -> Result<PlatformBuild> {
    let content = std::fs::read_to_string(path)?;
    parse_platform(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// YAML 文字列をパース。空文字列はデフォルト設定として扱う
pub fn parse_platform(content: &str) -> std::result::Result<PlatformBuild, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(PlatformBuild::default());
    }
    serde_yaml::from_str(content)
}

/// 環境変数による上書きを適用
///
/// - BUILDLANE_NAMESPACE
/// - BUILDLANE_REGISTRY
/// - BUILDLANE_REGISTRY_SECRET
/// - BUILDLANE_REGISTRY_INSECURE (true/false/1/0/yes/no)
/// - BUILDLANE_PUBLISH_STRATEGY (jib/kaniko)
/// - BUILDLANE_TIMEOUT (秒)
pub fn apply_env_overrides(platform: &mut PlatformBuild) -> Result<()> {
    if let Some(namespace) = env("BUILDLANE_NAMESPACE") {
        platform.namespace = namespace;
    }
    if let Some(address) = env("BUILDLANE_REGISTRY") {
        platform.spec.registry.address = address;
    }
    if let Some(secret) = env("BUILDLANE_REGISTRY_SECRET") {
        platform.spec.registry.secret = secret;
    }
    if let Some(insecure) = env("BUILDLANE_REGISTRY_INSECURE") {
        platform.spec.registry.insecure = parse_bool(&insecure).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "BUILDLANE_REGISTRY_INSECURE must be a boolean, got '{}'",
                insecure
            ))
        })?;
    }
    if let Some(strategy) = env("BUILDLANE_PUBLISH_STRATEGY") {
        platform.spec.publish_strategy = PublishStrategy::parse(&strategy).ok_or_else(|| {
            ConfigError::Invalid(format!("unknown publish strategy '{}'", strategy))
        })?;
    }
    if let Some(timeout) = env("BUILDLANE_TIMEOUT") {
        let secs: u64 = timeout.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "BUILDLANE_TIMEOUT must be a number of seconds, got '{}'",
                timeout
            ))
        })?;
        platform.spec.timeout = Duration::from_secs(secs);
    }
    Ok(())
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// 設定値の検証
pub fn validate(platform: &PlatformBuild) -> Result<()> {
    if platform.namespace.trim().is_empty() {
        return Err(ConfigError::Invalid("namespace must not be empty".to_string()));
    }
    if platform.spec.timeout.is_zero() {
        return Err(ConfigError::Invalid(
            "timeoutSeconds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// 設定を解決する
///
/// `path` が指定されていればそのファイルを、なければ `find_platform_file` で
/// 見つけたファイルを読み込む。どこにも無い場合はデフォルト設定を使う。
/// その後、環境変数の上書きと検証を行う。
pub fn load(path: Option<&Path>) -> Result<PlatformBuild> {
    let mut platform = match path {
        Some(path) => load_platform(path)?,
        None => match find_platform_file() {
            Ok(found) => {
                tracing::debug!("Using platform configuration {}", found.display());
                load_platform(&found)?
            }
            Err(ConfigError::PlatformFileNotFound) => {
                tracing::debug!("No platform configuration file found, using defaults");
                PlatformBuild::default()
            }
            Err(e) => return Err(e),
        },
    };

    apply_env_overrides(&mut platform)?;
    validate(&platform)?;
    Ok(platform)
}
