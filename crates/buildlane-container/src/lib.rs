//! buildlane container
//!
//! ローカルの Docker エンジンを `PlatformClient` として使うためのバックエンド。
//! ワークロードはコンテナに、Secret と ConfigMap はホスト上のディレクトリに対応する。

pub mod converter;
pub mod docker;
pub mod error;
pub mod staging;

pub use converter::*;
pub use docker::*;
pub use error::*;
pub use staging::*;
