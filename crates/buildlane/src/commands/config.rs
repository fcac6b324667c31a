use colored::Colorize;
use std::path::Path;

pub fn handle(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => println!("📄 設定ファイル: {}", path.display().to_string().cyan()),
        None => match buildlane_config::find_platform_file() {
            Ok(found) => println!("📄 設定ファイル: {}", found.display().to_string().cyan()),
            Err(_) => println!("{}", "設定ファイルが見つかりません（デフォルト設定）".dimmed()),
        },
    }

    let platform = buildlane_config::load(path)?;
    println!();
    print!("{}", serde_yaml::to_string(&platform)?);
    Ok(())
}
