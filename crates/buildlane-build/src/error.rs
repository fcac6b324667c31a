use buildlane_core::PlatformError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The descriptor is left in `Error` with this detail; use
    /// [`Builder::scheduler`](crate::Builder::scheduler) and
    /// [`Scheduler::descriptor`](crate::Scheduler::descriptor) to keep it.
    #[error("Resource resolution failed: {0}")]
    ResourceResolution(String),

    /// The descriptor is left in `Error` with this detail, see
    /// [`BuildError::ResourceResolution`].
    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Build exceeded its timeout of {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Configuration(msg) => {
                format!(
                    "ビルド設定に問題があります: {}\n\
                     \n\
                     解決方法:\n\
                     1. buildStrategy と publishStrategy の組み合わせを確認してください\n\
                        (pod + jib, pod + kaniko のみ対応)\n\
                     2. timeoutSeconds が 0 より大きいことを確認してください",
                    msg
                )
            }
            BuildError::ResourceResolution(msg) => {
                format!(
                    "ビルドに必要なリソースを解決できませんでした: {}\n\
                     \n\
                     解決方法:\n\
                     1. registry.address を設定するか、内部レジストリが利用可能か確認してください\n\
                     2. registry.secret が存在し、認証情報のキーを含んでいるか確認してください",
                    msg
                )
            }
            BuildError::Submission(msg) => {
                format!(
                    "ワークロードの投入に失敗しました: {}\n\
                     \n\
                     プラットフォームへの接続と権限を確認してください。",
                    msg
                )
            }
            BuildError::Timeout(timeout) => {
                format!(
                    "ビルドが {} 秒以内に完了しませんでした。\n\
                     \n\
                     timeoutSeconds を増やすか、ビルダーのログを確認してください。",
                    timeout.as_secs()
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
