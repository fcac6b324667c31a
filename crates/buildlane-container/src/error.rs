use buildlane_core::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error(
        "イメージ '{image}' を取得できません: {reason}\n\nヒント:\n  • イメージ名とタグを確認してください\n  • docker pull {image} でイメージをダウンロードしてください"
    )]
    ImagePullFailed { image: String, reason: String },

    #[error("シークレット '{namespace}/{name}' のキー '{key}' が見つかりません")]
    SecretKeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("ConfigMap '{namespace}/{name}' が見つかりません")]
    ConfigMapNotFound { namespace: String, name: String },

    #[error("サポートされていないワークロード定義: {0}")]
    Unsupported(String),

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError { .. } => {
                // 404/409 は呼び出し側で適切に処理されるべき
                ContainerError::DockerApiError(err.to_string())
            }
            _ => {
                // 接続エラーの可能性をチェック
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                {
                    ContainerError::DockerConnectionFailed(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

impl From<ContainerError> for PlatformError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::Io(e) => PlatformError::Io(e),
            e @ (ContainerError::SecretKeyNotFound { .. } | ContainerError::ConfigMapNotFound { .. }) => {
                PlatformError::NotFound(e.to_string())
            }
            e @ ContainerError::Unsupported(_) => PlatformError::InvalidResource(e.to_string()),
            e => PlatformError::Api(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
