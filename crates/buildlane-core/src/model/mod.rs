//! ビルドのデータモデル

pub mod build;
pub mod phase;
pub mod platform;
pub mod task;

pub use build::*;
pub use phase::*;
pub use platform::*;
pub use task::*;

/// `Duration` を秒数の整数としてシリアライズする
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
