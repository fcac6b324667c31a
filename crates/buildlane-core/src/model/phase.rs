//! ビルドのライフサイクルフェーズ

use serde::{Deserialize, Serialize};
use std::fmt;

/// ビルドの現在のフェーズ
///
/// 遷移は前方向のみ:
/// `Scheduling` → `Pending` → `Running` → (`Succeeded` | `Failed` | `Error`)
///
/// 非終端フェーズからはいつでも `Error` に遷移できる（タイムアウト・基盤障害）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildPhase {
    /// 初期状態。まだワークロードを投入していない
    #[default]
    Scheduling,
    /// ワークロード投入済み、まだ実行が始まっていない
    Pending,
    /// ワークロード実行中
    Running,
    /// 終了コード 0 で完了
    Succeeded,
    /// 基盤側の障害（投入失敗・観測不能・タイムアウト）
    Error,
    /// ワークロードが 0 以外の終了コードで終了
    Failed,
}

impl BuildPhase {
    /// 終端フェーズかどうか
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildPhase::Succeeded | BuildPhase::Error | BuildPhase::Failed
        )
    }

    fn rank(self) -> u8 {
        match self {
            BuildPhase::Scheduling => 0,
            BuildPhase::Pending => 1,
            BuildPhase::Running => 2,
            BuildPhase::Succeeded | BuildPhase::Error | BuildPhase::Failed => 3,
        }
    }

    /// `self` から `next` へ遷移できるか
    ///
    /// 終端フェーズからは遷移できず、同じ段階や後退する遷移も認めない。
    pub fn can_transition_to(self, next: BuildPhase) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildPhase::Scheduling => "Scheduling",
            BuildPhase::Pending => "Pending",
            BuildPhase::Running => "Running",
            BuildPhase::Succeeded => "Succeeded",
            BuildPhase::Error => "Error",
            BuildPhase::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(!BuildPhase::Scheduling.is_terminal());
        assert!(!BuildPhase::Pending.is_terminal());
        assert!(!BuildPhase::Running.is_terminal());
        assert!(BuildPhase::Succeeded.is_terminal());
        assert!(BuildPhase::Error.is_terminal());
        assert!(BuildPhase::Failed.is_terminal());
    }

    #[test]
    fn test_forward_transitions() {
        assert!(BuildPhase::Scheduling.can_transition_to(BuildPhase::Pending));
        assert!(BuildPhase::Scheduling.can_transition_to(BuildPhase::Error));
        assert!(BuildPhase::Pending.can_transition_to(BuildPhase::Running));
        assert!(BuildPhase::Running.can_transition_to(BuildPhase::Succeeded));
        assert!(BuildPhase::Running.can_transition_to(BuildPhase::Failed));
        // 観測が飛んだ場合（Pending のまま完了）も前進なので許可
        assert!(BuildPhase::Pending.can_transition_to(BuildPhase::Succeeded));
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        assert!(!BuildPhase::Running.can_transition_to(BuildPhase::Pending));
        assert!(!BuildPhase::Pending.can_transition_to(BuildPhase::Pending));
        assert!(!BuildPhase::Succeeded.can_transition_to(BuildPhase::Error));
        assert!(!BuildPhase::Failed.can_transition_to(BuildPhase::Succeeded));
        assert!(!BuildPhase::Error.can_transition_to(BuildPhase::Running));
    }

    #[test]
    fn test_display() {
        assert_eq!(BuildPhase::Scheduling.to_string(), "Scheduling");
        assert_eq!(BuildPhase::Failed.to_string(), "Failed");
    }
}
