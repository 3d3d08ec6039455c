use super::engine::{copy_with_progress, ArchiveEngine, ItemInfo, NativeEngine, SharedHandle};
use super::list::ArchiveList;
use super::password::{ArchivePasswordCallback, PasswordQuery};
use super::{is_current_dir_entry, sanitize_extract_path, ArchiveFormat, ArchiveProgressEvent};
use crate::utils::error::{IceError, Result};
use crate::utils::glob::matches_any_component;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// 임시 폴더에 풀린 엔트리 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub index: usize,
    /// 압축 파일 안의 경로 (`/` 구분)
    pub path: String,
    pub staged: PathBuf,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// 인덱스 순서
    pub entries: Vec<StagedEntry>,
    /// 필터에 걸려 제외된 엔트리 수
    pub filtered: usize,
    pub bytes: u64,
}

impl ExtractReport {
    pub fn files(&self) -> impl Iterator<Item = &StagedEntry> {
        self.entries.iter().filter(|entry| !entry.is_dir)
    }
}

/// 압축 파일 하나의 핸들을 소유하고 추출을 진행한다.
pub struct ArchiveReader {
    source: PathBuf,
    format: ArchiveFormat,
    handle: SharedHandle,
    count: usize,
    filters: Vec<String>,
    disposed: bool,
}

impl ArchiveReader {
    pub fn open(path: &Path, query: Arc<dyn PasswordQuery>) -> Result<Self> {
        Self::open_with(&NativeEngine, path, query)
    }

    pub fn open_with(
        engine: &dyn ArchiveEngine,
        path: &Path,
        query: Arc<dyn PasswordQuery>,
    ) -> Result<Self> {
        let callback = ArchivePasswordCallback::new(path, query);
        let handle = engine.open(path, callback)?;
        let format = handle.format();
        let count = handle.item_count();
        tracing::debug!(
            path = %path.display(),
            format = format.display_name(),
            count,
            "archive opened"
        );
        Ok(Self {
            source: path.to_path_buf(),
            format,
            handle: SharedHandle::new(handle),
            count,
            filters: Vec::new(),
            disposed: false,
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn items(&self) -> Result<ArchiveList> {
        self.ensure_open()?;
        Ok(ArchiveList::new(self.handle.clone(), self.count))
    }

    /// 추출에서 제외할 엔트리 이름 패턴 (경로의 각 구성요소와 비교)
    pub fn set_filters(&mut self, patterns: Vec<String>) {
        self.filters = patterns;
    }

    /// 필터에 걸리지 않은 모든 엔트리를 인덱스 순서로 `staging` 아래에 추출
    pub fn invoke(
        &self,
        staging: &Path,
        progress_tx: &Sender<ArchiveProgressEvent>,
        cancel_flag: &Arc<AtomicBool>,
    ) -> Result<ExtractReport> {
        self.ensure_open()?;

        let mut selected = Vec::with_capacity(self.count);
        let mut filtered = 0usize;
        for index in 0..self.count {
            let info = self.handle.with(|h| h.item_info(index))?;
            if matches_any_component(&self.filters, &info.path) {
                tracing::debug!(entry = %info.path, "entry filtered");
                filtered += 1;
                continue;
            }
            selected.push((index, info));
        }

        let mut report = stage_entries(&self.handle, selected, staging, progress_tx, cancel_flag)?;
        report.filtered = filtered;
        Ok(report)
    }

    /// 핸들 해제. 이후 리더와 아이템 접근은 실패한다.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.handle.release();
            tracing::debug!(path = %self.source.display(), "archive released");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed {
            Err(IceError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for ArchiveReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// 주어진 엔트리를 `staging` 아래에 만든다. 디렉터리는 먼저 만들고 파일은 한 번의 순회로 푼다.
pub(crate) fn stage_entries(
    handle: &SharedHandle,
    entries: Vec<(usize, ItemInfo)>,
    staging: &Path,
    progress_tx: &Sender<ArchiveProgressEvent>,
    cancel_flag: &Arc<AtomicBool>,
) -> Result<ExtractReport> {
    let entries: Vec<(usize, ItemInfo)> = entries
        .into_iter()
        .filter(|(_, info)| {
            let current = is_current_dir_entry(&info.path);
            if current {
                tracing::debug!(entry = %info.path, "skipping current directory entry");
            }
            !current
        })
        .collect();
    let total_files = entries.len();
    let total_bytes: u64 = entries
        .iter()
        .filter(|(_, info)| !info.is_dir)
        .map(|(_, info)| info.size)
        .sum();

    let mut staged = Vec::with_capacity(total_files);
    let mut pending: HashMap<usize, (PathBuf, ItemInfo)> = HashMap::new();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut order = Vec::new();
    let mut files_completed = 0usize;
    let mut bytes_processed = 0u64;

    for (index, info) in entries {
        if should_cancel(cancel_flag) {
            return Err(IceError::Cancelled);
        }
        let target = sanitize_extract_path(staging, Path::new(&info.path)).ok_or_else(|| {
            IceError::UnsafePath {
                entry: info.path.clone(),
            }
        })?;
        if info.is_dir {
            fs::create_dir_all(&target)?;
            claimed.insert(target.clone());
            files_completed += 1;
            send_progress(
                progress_tx,
                &info.path,
                files_completed,
                total_files,
                bytes_processed,
                total_bytes,
            );
            staged.push(StagedEntry {
                index,
                path: info.path,
                staged: target,
                is_dir: true,
                size: 0,
            });
        } else {
            // 같은 경로가 다시 나오면 임시 이름으로 풀고, 배치 단계에서 덮어쓰기 질의를 거친다.
            let target = if claimed.contains(&target) {
                duplicate_target(&target, index, &claimed)
            } else {
                target
            };
            claimed.insert(target.clone());
            order.push(index);
            pending.insert(index, (target, info));
        }
    }

    let mut cancelled = false;
    handle.with(|h| {
        h.extract_items(&order, &mut |index: usize, reader: &mut dyn Read| {
            if should_cancel(cancel_flag) {
                cancelled = true;
                return Ok(false);
            }
            let Some((target, info)) = pending.remove(&index) else {
                return Ok(true);
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = BufWriter::new(File::create(&target)?);
            let written = copy_with_progress(reader, &mut out, &mut |n| {
                bytes_processed += n;
                send_progress(
                    progress_tx,
                    &info.path,
                    files_completed,
                    total_files,
                    bytes_processed,
                    total_bytes,
                );
            })?;
            files_completed += 1;
            send_progress(
                progress_tx,
                &info.path,
                files_completed,
                total_files,
                bytes_processed,
                total_bytes,
            );
            staged.push(StagedEntry {
                index,
                path: info.path,
                staged: target,
                is_dir: false,
                size: written,
            });
            Ok(true)
        })
    })?;

    if cancelled {
        return Err(IceError::Cancelled);
    }
    if let Some((_, info)) = pending.into_values().next() {
        return Err(IceError::ArchiveExtractFailed {
            path: handle.with(|h| Ok(h.source().to_path_buf()))?,
            reason: format!("{}: entry was not found in the archive stream", info.path),
        });
    }

    staged.sort_by_key(|entry| entry.index);
    Ok(ExtractReport {
        entries: staged,
        filtered: 0,
        bytes: bytes_processed,
    })
}

/// 중복 엔트리용 임시 이름 (`a.txt.~3`)
fn duplicate_target(target: &Path, index: usize, claimed: &HashSet<PathBuf>) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut suffix = index;
    loop {
        let candidate = target.with_file_name(format!("{}.~{}", name, suffix));
        if !claimed.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn should_cancel(cancel_flag: &Arc<AtomicBool>) -> bool {
    cancel_flag.load(Ordering::Relaxed)
}

fn send_progress(
    progress_tx: &Sender<ArchiveProgressEvent>,
    current_file: &str,
    files_completed: usize,
    total_files: usize,
    bytes_processed: u64,
    total_bytes: u64,
) {
    let _ = progress_tx.send(ArchiveProgressEvent {
        current_file: current_file.to_string(),
        files_completed,
        total_files,
        bytes_processed,
        total_bytes,
    });
}
