//! 앱 계층: 백그라운드 작업자에서 일괄 압축 해제를 돌리고 진행 상태를 모은다.

use crate::models::{BatchSummary, ExtractProgress, ExtractSettings};
use crate::system::{ArchiveProgressEvent, ArchiveReader, ItemInfo, PasswordQuery};
use crate::utils::error::{IceError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

mod destination;
mod facade;


pub use destination::DestinationQuery;
pub use facade::{ExtractFacade, OpenAction, OverwriteQuery, SystemOpen};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 작업자에 넘길 압축 해제 요청
#[derive(Clone)]
pub struct ExtractRequest {
    pub sources: Vec<PathBuf>,
    pub settings: ExtractSettings,
    pub password: Arc<dyn PasswordQuery>,
    pub overwrite: Arc<dyn OverwriteQuery>,
    pub destination: Arc<dyn DestinationQuery>,
    pub open_action: Arc<dyn OpenAction>,
}

/// 실행 중인 압축 해제 작업자
pub struct ExtractWorker {
    progress_rx: Receiver<ArchiveProgressEvent>,
    join_handle: Option<JoinHandle<BatchSummary>>,
    cancel_flag: Arc<AtomicBool>,
    progress: ExtractProgress,
    first_source: PathBuf,
}

impl ExtractWorker {
    pub fn spawn(request: ExtractRequest) -> Self {
        let (progress_tx, progress_rx) = mpsc::channel::<ArchiveProgressEvent>();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let cancel_for_worker = Arc::clone(&cancel_flag);
        let first_source = request.sources.first().cloned().unwrap_or_default();

        let handle = std::thread::spawn(move || {
            let facade = ExtractFacade::new(request.settings, request.password, request.overwrite)
                .with_destination(request.destination)
                .with_open_action(request.open_action)
                .with_progress(progress_tx, cancel_for_worker);
            facade.run(&request.sources)
        });

        Self {
            progress_rx,
            join_handle: Some(handle),
            cancel_flag,
            progress: ExtractProgress::default(),
            first_source,
        }
    }

    /// 처리 중인 소스를 중단시킨다. 남은 소스는 계속 진행된다.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn progress(&self) -> &ExtractProgress {
        &self.progress
    }

    /// 쌓인 진행 이벤트를 반영하고, 작업이 끝났으면 요약을 돌려준다.
    pub fn poll(&mut self) -> Option<Result<BatchSummary>> {
        while let Ok(event) = self.progress_rx.try_recv() {
            self.progress.apply(event);
        }

        let is_finished = self
            .join_handle
            .as_ref()
            .is_some_and(JoinHandle::is_finished);
        if !is_finished {
            return None;
        }

        let handle = self.join_handle.take()?;
        while let Ok(event) = self.progress_rx.try_recv() {
            self.progress.apply(event);
        }
        Some(handle.join().map_err(|_| IceError::ArchiveExtractFailed {
            path: self.first_source.clone(),
            reason: "Extraction worker thread panicked".to_string(),
        }))
    }
}

/// 작업자를 띄우고 끝날 때까지 기다린다.
///
/// 폴링할 때마다 `on_progress` 로 진행 상태를 넘기고, `cancel_requested` 가 `true` 면
/// 처리 중인 소스를 취소한다.
pub fn run_batch(
    request: ExtractRequest,
    mut on_progress: impl FnMut(&ExtractProgress),
    mut cancel_requested: impl FnMut() -> bool,
) -> Result<BatchSummary> {
    let mut worker = ExtractWorker::spawn(request);
    loop {
        if cancel_requested() {
            tracing::debug!("cancel requested");
            worker.cancel();
        }
        let finished = worker.poll();
        on_progress(worker.progress());
        if let Some(result) = finished {
            return result;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// 엔트리 목록 읽기 (인덱스 순서)
pub fn list_entries(path: &Path, password: Arc<dyn PasswordQuery>) -> Result<Vec<ItemInfo>> {
    let mut reader = ArchiveReader::open(path, password)?;
    let entries = reader
        .items()?
        .iter()
        .map(|item| item.info())
        .collect::<Result<Vec<_>>>();
    reader.dispose();
    entries
}
