use crate::models::operation::ExtractProgress;
use crate::utils::path_display::truncate_middle;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.cyan} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>3}% {msg}";
const NAME_WIDTH: usize = 40;

/// 압축 해제 진행 표시줄 (stderr)
pub struct ExtractProgressBar {
    bar: ProgressBar,
}

impl ExtractProgressBar {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    /// 프롬프트가 출력을 잠시 멈출 때 쓰는 핸들
    pub fn handle(&self) -> ProgressBar {
        self.bar.clone()
    }

    pub fn update(&self, progress: &ExtractProgress) {
        self.bar.set_position(u64::from(progress.percentage()));
        if progress.total_files > 0 {
            self.bar.set_message(format!(
                "{} ({}/{})",
                truncate_middle(&progress.current_file, NAME_WIDTH),
                progress.files_completed,
                progress.total_files
            ));
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ExtractProgressBar {
    fn default() -> Self {
        Self::new()
    }
}
