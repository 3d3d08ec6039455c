//! 압축 해제 흐름
//!
//! 소스마다 `열기 → 임시 폴더 → 추출 → 배치 → 후처리` 순서로 진행하고,
//! 결과를 [`BatchSummary`] 로 모은다. 취소와 실패는 해당 소스에서 끝나고 다음 소스로 넘어간다.

use super::destination::{DestinationQuery, PathExplorer};
use crate::models::{BatchSummary, ExtractSettings, ExtractState, OverwriteMethod, SourceResult};
use crate::system::{
    archive_base_name, is_tar_content, ArchiveProgressEvent, ArchiveReader, FileInfo, FileSystem,
    MoveOutcome, PasswordQuery, StagedEntry,
};
use crate::utils::error::{IceError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use tempfile::TempDir;

/// 단일 엔트리 tar 를 다시 여는 최대 횟수
pub const MAX_UNWRAP_DEPTH: usize = 8;

const STAGING_PREFIX: &str = ".ice-";

/// 대상 위치에 같은 이름이 있을 때 처리 방법을 묻는다. 충돌 한 쌍마다 한 번 호출된다.
pub trait OverwriteQuery: Send + Sync {
    fn resolve(&self, existing: &FileInfo, incoming: &FileInfo) -> OverwriteMethod;
}

impl<F> OverwriteQuery for F
where
    F: Fn(&FileInfo, &FileInfo) -> OverwriteMethod + Send + Sync,
{
    fn resolve(&self, existing: &FileInfo, incoming: &FileInfo) -> OverwriteMethod {
        self(existing, incoming)
    }
}

/// 압축 해제 후 폴더 열기
pub trait OpenAction: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

impl<F> OpenAction for F
where
    F: Fn(&Path) -> Result<()> + Send + Sync,
{
    fn open(&self, path: &Path) -> Result<()> {
        self(path)
    }
}

/// OS 기본 파일 관리자로 연다.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpen;

impl OpenAction for SystemOpen {
    fn open(&self, path: &Path) -> Result<()> {
        FileSystem::new().open_with_default_app(path)
    }
}

pub struct ExtractFacade {
    settings: ExtractSettings,
    password: Arc<dyn PasswordQuery>,
    overwrite: Arc<dyn OverwriteQuery>,
    destination: Arc<dyn DestinationQuery>,
    open_action: Arc<dyn OpenAction>,
    progress_tx: Sender<ArchiveProgressEvent>,
    cancel_flag: Arc<AtomicBool>,
    fs: FileSystem,
}

impl ExtractFacade {
    pub fn new(
        settings: ExtractSettings,
        password: Arc<dyn PasswordQuery>,
        overwrite: Arc<dyn OverwriteQuery>,
    ) -> Self {
        let (progress_tx, _) = mpsc::channel();
        Self {
            settings,
            password,
            overwrite,
            destination: Arc::new(|_: &Path| -> Option<PathBuf> { None }),
            open_action: Arc::new(SystemOpen),
            progress_tx,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            fs: FileSystem::new(),
        }
    }

    pub fn with_destination(mut self, query: Arc<dyn DestinationQuery>) -> Self {
        self.destination = query;
        self
    }

    pub fn with_open_action(mut self, action: Arc<dyn OpenAction>) -> Self {
        self.open_action = action;
        self
    }

    /// 진행 상태 채널과 취소 플래그 연결
    ///
    /// 취소 플래그는 처리 중인 소스만 중단시키고, 그 소스가 취소로 기록된 뒤에 내려간다.
    pub fn with_progress(
        mut self,
        progress_tx: Sender<ArchiveProgressEvent>,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        self.progress_tx = progress_tx;
        self.cancel_flag = cancel_flag;
        self
    }

    /// 소스를 순서대로 하나씩 처리
    pub fn run(&self, sources: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for source in sources {
            let mut result = SourceResult::new(source.clone());
            match self.extract_source(source, &mut result) {
                Ok(()) => {
                    result.state = ExtractState::Done;
                    tracing::info!(
                        source = %source.display(),
                        placed = result.placed,
                        skipped = result.skipped,
                        filtered = result.filtered,
                        "archive extracted"
                    );
                }
                Err(IceError::Cancelled) => {
                    tracing::debug!(
                        source = %source.display(),
                        state = result.state.name(),
                        "extraction cancelled"
                    );
                    result.state = ExtractState::Cancelled;
                    self.cancel_flag.store(false, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source.display(),
                        state = result.state.name(),
                        error = %e,
                        "extraction failed"
                    );
                    result.state = ExtractState::Failed;
                    result.error = Some(e.to_string());
                }
            }
            summary.push(result);
        }
        summary
    }

    fn extract_source(&self, source: &Path, result: &mut SourceResult) -> Result<()> {
        self.enter(result, ExtractState::Opening);
        let mut explorer = PathExplorer::resolve(source, &self.settings, self.destination.as_ref())?;
        let reader = ArchiveReader::open(source, Arc::clone(&self.password))?;
        self.check_cancel()?;

        self.enter(result, ExtractState::Staging);
        let staging = create_staging(explorer.root_directory())?;

        self.enter(result, ExtractState::Extracting);
        let entries = self.extract(reader, staging.path(), result)?;
        self.check_cancel()?;

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        let save = explorer
            .invoke(&archive_base_name(source), &paths)
            .to_path_buf();
        result.destination = Some(save.clone());

        self.enter(result, ExtractState::Placing);
        self.place(&entries, &save, result)?;

        drop(staging);
        self.post_process(source, &explorer);
        Ok(())
    }

    /// 엔트리가 하나면 그것만 풀고, 그 결과가 tar 면 다시 열어 반복한다.
    fn extract(
        &self,
        mut reader: ArchiveReader,
        staging: &Path,
        result: &mut SourceResult,
    ) -> Result<Vec<StagedEntry>> {
        let mut depth = 0usize;
        loop {
            let level = staging.join(format!("level-{}", depth));
            let items = reader.items()?;
            let single_file = items.len() == 1 && !items.get(0)?.is_directory()?;
            if !single_file {
                reader.set_filters(self.settings.filter_patterns());
                let report = reader.invoke(&level, &self.progress_tx, &self.cancel_flag)?;
                tracing::debug!(
                    files = report.files().count(),
                    bytes = report.bytes,
                    filtered = report.filtered,
                    "entries staged"
                );
                result.filtered = report.filtered;
                return Ok(report.entries);
            }

            let entry = items
                .get(0)?
                .invoke(&level, &self.progress_tx, &self.cancel_flag)?;
            if !is_tar_content(&entry.staged) {
                return Ok(vec![entry]);
            }
            if depth >= MAX_UNWRAP_DEPTH {
                tracing::warn!(entry = %entry.path, depth, "nesting too deep, keeping tar as is");
                return Ok(vec![entry]);
            }

            depth += 1;
            result.unwrap_depth = depth;
            reader.dispose();
            reader = ArchiveReader::open(&entry.staged, Arc::clone(&self.password))?;
            tracing::debug!(
                entry = %entry.path,
                depth,
                format = reader.format().display_name(),
                "unwrapping nested tar"
            );
        }
    }

    /// 인덱스 순서대로 저장 폴더에 옮긴다.
    fn place(&self, entries: &[StagedEntry], save: &Path, result: &mut SourceResult) -> Result<()> {
        for entry in entries {
            self.check_cancel()?;
            let dest = self.fs.combine(save, &entry.path);
            if entry.is_dir {
                if dest.exists() && !dest.is_dir() {
                    return Err(IceError::DestinationConflictUnresolved { path: dest });
                }
                fs::create_dir_all(&dest)?;
                continue;
            }
            if !entry.staged.exists() {
                tracing::warn!(entry = %entry.path, "staged file is missing, skipping");
                result.skipped += 1;
                continue;
            }

            let outcome = if dest.exists() {
                let existing = self.fs.get(&dest);
                let incoming = self.fs.get(&entry.staged);
                let method = self.overwrite.resolve(&existing, &incoming);
                tracing::debug!(dest = %dest.display(), method = method.name(), "destination exists");
                self.fs.move_to(&entry.staged, &dest, method)?
            } else {
                self.fs.move_file(&entry.staged, &dest)?;
                MoveOutcome::Placed(dest)
            };
            match outcome {
                MoveOutcome::Placed(_) => result.placed += 1,
                MoveOutcome::Skipped => result.skipped += 1,
            }
        }
        Ok(())
    }

    fn post_process(&self, source: &Path, explorer: &PathExplorer) {
        if let Some(dir) = explorer.open_directory() {
            if let Err(e) = self.open_action.open(&dir) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to open directory");
            }
        }
        if self.settings.delete_source && !self.fs.try_delete(source) {
            tracing::warn!(source = %source.display(), "source archive was not deleted");
        }
    }

    fn enter(&self, result: &mut SourceResult, state: ExtractState) {
        tracing::debug!(source = %result.source.display(), state = state.name(), "state");
        result.state = state;
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            Err(IceError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 같은 볼륨에서 옮기도록 루트 폴더 안에 만들고, 안 되면 시스템 임시 폴더를 쓴다.
fn create_staging(root: &Path) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX);
    if root.is_dir() {
        match builder.tempdir_in(root) {
            Ok(dir) => return Ok(dir),
            Err(e) => {
                tracing::debug!(root = %root.display(), error = %e, "staging in system temp dir");
            }
        }
    }
    Ok(builder.tempdir()?)
}
