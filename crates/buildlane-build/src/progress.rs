use buildlane_core::{BuildPhase, ContainerBuild};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(build_name: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Scheduling {}...", build_name));

        Self { progress_bar: pb }
    }

    /// 現在のフェーズを表示
    pub fn update(&self, build: &ContainerBuild) {
        self.progress_bar
            .set_message(format!("{} {}", build.name(), phase_label(build.phase())));
    }

    pub fn finish(&self, build: &ContainerBuild) {
        match build.phase() {
            BuildPhase::Succeeded => self.finish_success(),
            _ => self.finish_error(
                build
                    .status
                    .error
                    .as_deref()
                    .unwrap_or_else(|| phase_label(build.phase())),
            ),
        }
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_with_message("Build completed ✓");
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("Build failed: {}", error));
    }
}

fn phase_label(phase: BuildPhase) -> &'static str {
    match phase {
        BuildPhase::Scheduling => "scheduling",
        BuildPhase::Pending => "waiting for the builder to start",
        BuildPhase::Running => "building",
        BuildPhase::Succeeded => "succeeded",
        BuildPhase::Error => "errored",
        BuildPhase::Failed => "failed",
    }
}
