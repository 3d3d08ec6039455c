//! 압축 해제 작업 모델
//!
//! 소스별 상태, 덮어쓰기 결정, 진행 상태와 일괄 작업 요약

use crate::system::archive::ArchiveProgressEvent;
use crate::utils::formatter::{percentage, pluralize};
use std::path::PathBuf;

/// 대상 경로에 같은 이름이 있을 때의 처리 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteMethod {
    /// 건너뛰기
    Skip,
    /// 덮어쓰기
    Overwrite,
    /// `name (n).ext` 로 이름 바꿔 저장
    Rename,
    /// 현재 소스 중단
    Cancel,
}

impl OverwriteMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OverwriteMethod::Skip => "skip",
            OverwriteMethod::Overwrite => "overwrite",
            OverwriteMethod::Rename => "rename",
            OverwriteMethod::Cancel => "cancel",
        }
    }
}

/// 소스 하나의 처리 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractState {
    Opening,
    Staging,
    Extracting,
    Placing,
    Done,
    Cancelled,
    Failed,
}

impl ExtractState {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractState::Opening => "opening",
            ExtractState::Staging => "staging",
            ExtractState::Extracting => "extracting",
            ExtractState::Placing => "placing",
            ExtractState::Done => "done",
            ExtractState::Cancelled => "cancelled",
            ExtractState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractState::Done | ExtractState::Cancelled | ExtractState::Failed
        )
    }
}

/// 작업 진행 상태 (진행 표시줄용)
#[derive(Debug, Clone, Default)]
pub struct ExtractProgress {
    /// 현재 처리 중인 엔트리
    pub current_file: String,
    pub files_completed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

impl ExtractProgress {
    pub fn apply(&mut self, event: ArchiveProgressEvent) {
        self.current_file = event.current_file;
        self.files_completed = event.files_completed;
        self.total_files = event.total_files;
        self.bytes_processed = event.bytes_processed;
        self.total_bytes = event.total_bytes;
    }

    /// 진행률 계산 (0-100)
    pub fn percentage(&self) -> u8 {
        percentage(
            self.bytes_processed,
            self.total_bytes,
            self.files_completed,
            self.total_files,
        )
    }
}

/// 소스 하나의 처리 결과
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: PathBuf,
    pub state: ExtractState,
    /// 최종 저장 폴더
    pub destination: Option<PathBuf>,
    /// 대상 위치로 옮긴 파일 수
    pub placed: usize,
    /// 덮어쓰기 질의에서 건너뛴 파일 수
    pub skipped: usize,
    /// 필터로 제외된 엔트리 수
    pub filtered: usize,
    /// 단일 엔트리 tar 를 다시 연 횟수
    pub unwrap_depth: usize,
    pub error: Option<String>,
}

impl SourceResult {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            state: ExtractState::Opening,
            destination: None,
            placed: 0,
            skipped: 0,
            filtered: 0,
            unwrap_depth: 0,
            error: None,
        }
    }
}

/// 일괄 작업 요약
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub results: Vec<SourceResult>,
}

impl BatchSummary {
    pub fn push(&mut self, result: SourceResult) {
        debug_assert!(result.state.is_terminal(), "source pushed before it finished");
        self.results.push(result);
    }

    pub fn completed(&self) -> usize {
        self.count(ExtractState::Done)
    }

    /// 사용자가 취소한 소스 수
    pub fn skipped(&self) -> usize {
        self.count(ExtractState::Cancelled)
    }

    pub fn failed(&self) -> usize {
        self.count(ExtractState::Failed)
    }

    pub fn errors(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (&r.source, e)))
    }

    fn count(&self, state: ExtractState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    pub fn describe(&self) -> String {
        format!(
            "{} extracted, {} skipped, {} failed",
            pluralize(self.completed(), "archive", "archives"),
            self.skipped(),
            self.failed()
        )
    }
}
