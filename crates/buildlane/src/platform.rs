use buildlane_container::DockerPlatform;
use colored::Colorize;

/// Docker に接続し、失敗時は対処方法を表示する
pub async fn init_docker_with_error_handling() -> anyhow::Result<DockerPlatform> {
    let platform = match DockerPlatform::from_env() {
        Ok(platform) => platform,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            return Err(e.into());
        }
    };

    if let Err(e) = platform.ping().await {
        eprintln!();
        eprintln!("{}", "✗ Dockerに接続できません".red().bold());
        eprintln!();
        eprintln!("{}", "解決方法:".yellow());
        eprintln!("  • Docker Desktop / OrbStack が起動しているか確認してください");
        eprintln!("  • DOCKER_HOST の設定を確認してください");
        eprintln!("  • 投入内容だけ確認する場合は --dry-run を使用してください");
        return Err(e.into());
    }

    Ok(platform)
}
