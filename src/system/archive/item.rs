use super::engine::{ItemInfo, SharedHandle};
use super::reader::{stage_entries, StagedEntry};
use super::{ArchiveFormat, ArchiveProgressEvent};
use crate::utils::error::{IceError, Result};
use std::fmt;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::SystemTime;

/// 압축 파일 안의 엔트리 하나 (`핸들, 인덱스` 쌍)
///
/// 핸들을 소유하지 않으며 속성은 접근할 때마다 핸들에서 읽는다.
#[derive(Clone)]
pub struct ArchiveItem {
    handle: SharedHandle,
    index: usize,
}

impl ArchiveItem {
    pub(crate) fn new(handle: SharedHandle, index: usize) -> Self {
        Self { handle, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> Result<ItemInfo> {
        self.handle.with(|h| h.item_info(self.index))
    }

    pub fn full_name(&self) -> Result<String> {
        Ok(self.info()?.path)
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.info()?.size)
    }

    pub fn last_modified(&self) -> Result<Option<SystemTime>> {
        Ok(self.info()?.modified)
    }

    pub fn is_directory(&self) -> Result<bool> {
        Ok(self.info()?.is_dir)
    }

    pub fn is_encrypted(&self) -> Result<bool> {
        Ok(self.info()?.encrypted)
    }

    /// 소속 압축 파일의 형식
    pub fn format(&self) -> Result<ArchiveFormat> {
        self.handle.with(|h| Ok(h.format()))
    }

    /// 이 엔트리 하나만 `staging` 아래에 추출
    pub fn invoke(
        &self,
        staging: &Path,
        progress_tx: &Sender<ArchiveProgressEvent>,
        cancel_flag: &Arc<AtomicBool>,
    ) -> Result<StagedEntry> {
        let info = self.info()?;
        let source = info.path.clone();
        let mut report = stage_entries(
            &self.handle,
            vec![(self.index, info)],
            staging,
            progress_tx,
            cancel_flag,
        )?;
        report
            .entries
            .pop()
            .ok_or(IceError::UnsafePath { entry: source })
    }
}

impl fmt::Debug for ArchiveItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveItem")
            .field("index", &self.index)
            .field("released", &self.handle.is_released())
            .finish()
    }
}
