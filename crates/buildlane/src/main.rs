mod commands;
mod platform;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lane")]
#[command(about = "コンテナイメージのビルドをワークロードとして実行する", long_about = None)]
#[command(version)]
struct Cli {
    /// デバッグログを表示（RUST_LOG が優先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルドして完了まで待つ
    Build {
        /// ビルドするイメージ (name:tag)
        #[arg(short, long)]
        image: String,
        /// ビルド名（省略時はイメージ名から生成）
        #[arg(short, long)]
        name: Option<String>,
        /// ビルドコンテキストに配置するファイル（複数指定可）
        #[arg(short, long = "resource")]
        resources: Vec<PathBuf>,
        /// プラットフォーム設定ファイル
        #[arg(short, long, env = "BUILDLANE_CONFIG_PATH")]
        config: Option<PathBuf>,
        /// 状態確認の間隔（秒）
        #[arg(long, default_value = "2")]
        interval: u64,
        /// 投入せず、組み立てたワークロードを表示
        #[arg(long)]
        dry_run: bool,
    },
    /// 解決済みのプラットフォーム設定を表示
    Config {
        /// プラットフォーム設定ファイル
        #[arg(short, long, env = "BUILDLANE_CONFIG_PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            image,
            name,
            resources,
            config,
            interval,
            dry_run,
        } => {
            let args = commands::build::BuildArgs {
                image,
                name,
                resources,
                config,
                interval: std::time::Duration::from_secs(interval.max(1)),
                dry_run,
            };
            commands::build::handle(args).await
        }
        Commands::Config { config } => commands::config::handle(config.as_deref()),
    }
}
