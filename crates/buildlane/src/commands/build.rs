use crate::platform;
use buildlane_build::{
    BuildError, BuildProgress, Builder, ContainerBuilderInfo, from_build, new_build,
};
use buildlane_core::{BuildPhase, ContainerBuild, InMemoryPlatform, PlatformClient};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// ドライラン時に内部レジストリとして表示するアドレス
const DRY_RUN_REGISTRY: &str = "registry.local:5000";

pub struct BuildArgs {
    pub image: String,
    pub name: Option<String>,
    pub resources: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub interval: Duration,
    pub dry_run: bool,
}

pub async fn handle(args: BuildArgs) -> anyhow::Result<()> {
    let platform_config = buildlane_config::load(args.config.as_deref())?;
    let name = match args.name {
        Some(name) => name,
        None => unique_build_name(&args.image)
            .ok_or_else(|| anyhow::anyhow!("イメージ名 '{}' からビルド名を生成できません", args.image))?,
    };

    println!("{}", "ビルドを準備中...".blue());
    println!("  イメージ: {}", args.image.cyan());
    println!("  ビルド名: {}", name.cyan());
    println!(
        "  戦略: {} / {}",
        platform_config.spec.build_strategy,
        platform_config.spec.publish_strategy
    );

    let info = ContainerBuilderInfo::new(&args.image, &name, platform_config);
    let mut builder = new_build(info);
    for path in &args.resources {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("リソースのパスが不正です: {}", path.display()))?;
        let content = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("リソース {} を読み込めません: {}", path.display(), e))?;
        println!("  リソース: {}", file_name.cyan());
        builder = builder.with_resource(file_name, content);
    }

    if args.dry_run {
        return dry_run(builder).await;
    }

    let client: Arc<dyn PlatformClient> = Arc::new(platform::init_docker_with_error_handling().await?);
    let build = builder
        .with_client(client.clone())
        .schedule()
        .await
        .map_err(report)?;

    let build = follow(build, client, args.interval).await;
    match build.phase() {
        BuildPhase::Succeeded => {
            println!();
            println!("{}", format!("✓ {} をビルドしました", args.image).green().bold());
            Ok(())
        }
        phase => {
            let detail = build.status.error.as_deref().unwrap_or("no detail");
            anyhow::bail!("ビルドが {} で終了しました: {}", phase, detail)
        }
    }
}

/// 終端フェーズになるまで状態を確認し続ける
async fn follow(
    mut build: ContainerBuild,
    client: Arc<dyn PlatformClient>,
    interval: Duration,
) -> ContainerBuild {
    let progress = BuildProgress::new(build.name());

    while !build.is_finished() {
        progress.update(&build);
        tokio::time::sleep(interval).await;

        match from_build(build.clone())
            .with_client(client.clone())
            .reconcile()
            .await
        {
            Ok(next) => build = next,
            // 記述子は変更されないので次の確認で再試行
            Err(e) => tracing::warn!("Could not observe build {}: {}", build.name(), e),
        }
    }

    progress.finish(&build);
    build
}

/// インメモリのプラットフォームで組み立て、投入される内容を表示
async fn dry_run(builder: Builder) -> anyhow::Result<()> {
    let client = Arc::new(InMemoryPlatform::new().with_internal_registry(DRY_RUN_REGISTRY));
    let mut scheduler = builder.with_client(client).scheduler().map_err(report)?;
    let build = scheduler.schedule().await.map_err(report)?;

    println!();
    println!("{}", "# ビルド記述子".dimmed());
    print!("{}", serde_yaml::to_string(&build)?);
    for resource in scheduler.resources() {
        println!("---");
        println!("{}", format!("# {}", resource.key()).dimmed());
        print!("{}", serde_yaml::to_string(resource)?);
    }
    Ok(())
}

fn report(err: BuildError) -> anyhow::Error {
    eprintln!("{}", err.user_message().red());
    err.into()
}

/// イメージ名から実行ごとに異なるビルド名を生成
///
/// 同名のワークロードが既にあると投入済みとみなされるため、
/// 毎回ランダムな接尾辞を付ける。`greetings:latest` → `greetings-1a2b3c4d`
fn unique_build_name(image: &str) -> Option<String> {
    let base = build_name_from_image(image)?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Some(format!("{}-{}", base, &suffix[..8]))
}

/// イメージ名からビルド名の基になる部分を取り出す
///
/// `quay.io/acme/greetings:1.0` → `greetings`
fn build_name_from_image(image: &str) -> Option<String> {
    let without_digest = image.split('@').next().unwrap_or(image);
    let repository = without_digest.rsplit('/').next().unwrap_or(without_digest);
    let base = repository.split(':').next().unwrap_or(repository);

    let name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let name = name.trim_matches('-').to_string();
    (!name.is_empty()).then_some(name)
}
