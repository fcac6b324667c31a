//! ビルドコンテキスト
//!
//! スケジューラとドライバが共有する実行時の入力。プラットフォーム
//! クライアント、コンテキストディレクトリに配置するリソース、
//! ビルダーに引き継ぐプロキシ設定を保持する。

use buildlane_core::{EnvVar, PlatformClient};
use std::fmt;
use std::sync::Arc;

/// ビルダーのコンテキストディレクトリに配置するファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResource {
    /// コンテキストディレクトリからの相対パス
    pub name: String,
    pub content: Vec<u8>,
}

impl BuildResource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// ビルダーに引き継ぐプロキシ設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// 自プロセスの環境変数から読み取る（大文字・小文字どちらも可）
    pub fn from_env() -> Self {
        Self {
            http_proxy: proxy_var("HTTP_PROXY"),
            https_proxy: proxy_var("HTTPS_PROXY"),
            no_proxy: proxy_var("NO_PROXY"),
        }
    }

    /// 設定されている値だけを環境変数として返す
    pub fn env(&self) -> Vec<EnvVar> {
        [
            ("HTTP_PROXY", &self.http_proxy),
            ("HTTPS_PROXY", &self.https_proxy),
            ("NO_PROXY", &self.no_proxy),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| EnvVar::literal(name, v)))
        .collect()
    }
}

fn proxy_var(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| std::env::var(name.to_lowercase()))
        .ok()
        .filter(|v| !v.is_empty())
}

/// スケジューラ生成時に渡される実行コンテキスト
#[derive(Clone)]
pub struct BuildContext {
    pub client: Arc<dyn PlatformClient>,
    pub resources: Vec<BuildResource>,
    pub proxy: ProxySettings,
}

impl BuildContext {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            client,
            resources: Vec::new(),
            proxy: ProxySettings::from_env(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<BuildResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("client", &self.client.name())
            .field("resources", &self.resources.len())
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_proxy_from_env_accepts_lowercase() {
        let proxy = temp_env::with_vars(
            [
                ("HTTP_PROXY", None),
                ("http_proxy", Some("http://proxy.local:3128")),
                ("HTTPS_PROXY", Some("http://secure-proxy.local:3128")),
                ("NO_PROXY", None),
                ("no_proxy", None),
            ],
            ProxySettings::from_env,
        );

        assert_eq!(proxy.http_proxy.as_deref(), Some("http://proxy.local:3128"));
        assert_eq!(
            proxy.https_proxy.as_deref(),
            Some("http://secure-proxy.local:3128")
        );
        assert!(proxy.no_proxy.is_none());
    }

    #[test]
    fn test_proxy_env_skips_unset_values() {
        let proxy = ProxySettings {
            no_proxy: Some("localhost,.svc".to_string()),
            ..Default::default()
        };
        let env = proxy.env();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "NO_PROXY");
        assert_eq!(env[0].value.as_deref(), Some("localhost,.svc"));
    }
}
