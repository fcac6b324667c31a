use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "プラットフォーム設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: buildlane.local.yaml, buildlane.yaml\n\
        - ./.buildlane/ ディレクトリ\n\
        - ~/.config/buildlane/platform.yaml\n\
        または BUILDLANE_CONFIG_PATH 環境変数で直接指定できます"
    )]
    PlatformFileNotFound,

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("不正な設定値: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
