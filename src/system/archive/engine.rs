//! 압축 엔진 경계
//!
//! 엔진은 압축 파일을 열어 [`ArchiveHandle`] 을 돌려주고, 핸들은 엔트리 개수와
//! 인덱스별 메타데이터, 인덱스별 스트림 추출을 제공한다.

use super::backend::{sevenz::SevenZHandle, stream::StreamHandle, tarball::TarHandle, zipfile::ZipHandle};
use super::password::ArchivePasswordCallback;
use super::{detect_format, ArchiveFormat};
use crate::utils::error::{IceError, Result};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// 엔트리 메타데이터 (경로 구분자는 항상 `/`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub path: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
    pub encrypted: bool,
}

/// 엔트리 스트림을 받는 방문자. `false` 를 돌려주면 남은 엔트리 방문을 멈춘다.
pub type EntryVisitor<'a> = dyn FnMut(usize, &mut dyn Read) -> Result<bool> + 'a;

pub trait ArchiveHandle {
    /// 열린 압축 파일 경로
    fn source(&self) -> &Path;

    fn format(&self) -> ArchiveFormat;

    fn item_count(&self) -> usize;

    fn item_info(&mut self, index: usize) -> Result<ItemInfo>;

    /// 엔트리 하나의 내용 스트림을 방문자에게 넘긴다.
    fn read_item(&mut self, index: usize, visitor: &mut EntryVisitor<'_>) -> Result<bool>;

    /// 여러 엔트리를 차례로 방문한다. 순차 스트림 형식은 한 번의 읽기로 처리하도록 재정의한다.
    fn extract_items(&mut self, indices: &[usize], visitor: &mut EntryVisitor<'_>) -> Result<()> {
        for &index in indices {
            if !self.read_item(index, visitor)? {
                break;
            }
        }
        Ok(())
    }

    /// 엔트리 하나를 `sink` 로 복사하고 쓴 바이트 수를 돌려준다.
    fn extract_item(
        &mut self,
        index: usize,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64> {
        let mut written = 0u64;
        self.read_item(index, &mut |_: usize, reader: &mut dyn Read| {
            written = copy_with_progress(reader, sink, progress)?;
            Ok(true)
        })?;
        Ok(written)
    }
}

pub trait ArchiveEngine {
    fn open(&self, path: &Path, callback: ArchivePasswordCallback)
        -> Result<Box<dyn ArchiveHandle>>;
}

/// 코덱 크레이트 기반 기본 엔진
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl ArchiveEngine for NativeEngine {
    fn open(
        &self,
        path: &Path,
        callback: ArchivePasswordCallback,
    ) -> Result<Box<dyn ArchiveHandle>> {
        let format = detect_format(path)?;
        tracing::debug!(path = %path.display(), format = format.display_name(), "opening archive");
        let handle: Box<dyn ArchiveHandle> = match format {
            ArchiveFormat::Zip => Box::new(ZipHandle::open(path, callback)?),
            ArchiveFormat::Tar => Box::new(TarHandle::open(path)?),
            ArchiveFormat::GZip | ArchiveFormat::Zstd => Box::new(StreamHandle::open(path, format)?),
            ArchiveFormat::SevenZ => Box::new(SevenZHandle::open(path, callback)?),
        };
        Ok(handle)
    }
}

/// 리더가 소유하고 아이템이 참조하는 핸들 슬롯
///
/// 리더가 해제하면 슬롯이 비고, 이후 접근은 `InvalidHandle` 로 실패한다.
#[derive(Clone)]
pub struct SharedHandle(Rc<RefCell<Option<Box<dyn ArchiveHandle>>>>);

impl SharedHandle {
    pub fn new(handle: Box<dyn ArchiveHandle>) -> Self {
        Self(Rc::new(RefCell::new(Some(handle))))
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut dyn ArchiveHandle) -> Result<T>) -> Result<T> {
        let mut slot = self.0.borrow_mut();
        let handle = slot.as_mut().ok_or(IceError::InvalidHandle)?;
        f(handle.as_mut())
    }

    /// 핸들 해제. 이미 비어 있으면 `false`
    pub fn release(&self) -> bool {
        self.0.borrow_mut().take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.0.borrow().is_none()
    }
}

pub(crate) fn copy_with_progress(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    progress: &mut dyn FnMut(u64),
) -> io::Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_all(&buffer[..read])?;
        total += read as u64;
        progress(read as u64);
    }
    sink.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemoryHandle {
        entries: Vec<(String, Vec<u8>)>,
    }

    impl ArchiveHandle for MemoryHandle {
        fn source(&self) -> &Path {
            Path::new("memory.zip")
        }

        fn format(&self) -> ArchiveFormat {
            ArchiveFormat::Zip
        }

        fn item_count(&self) -> usize {
            self.entries.len()
        }

        fn item_info(&mut self, index: usize) -> Result<ItemInfo> {
            let (path, data) = self.entries.get(index).ok_or(IceError::IndexOutOfRange {
                index,
                count: self.entries.len(),
            })?;
            Ok(ItemInfo {
                path: path.clone(),
                size: data.len() as u64,
                modified: None,
                is_dir: false,
                encrypted: false,
            })
        }

        fn read_item(&mut self, index: usize, visitor: &mut EntryVisitor<'_>) -> Result<bool> {
            let (_, data) = &self.entries[index];
            visitor(index, &mut data.as_slice())
        }
    }

    fn memory_handle() -> Box<dyn ArchiveHandle> {
        Box::new(MemoryHandle {
            entries: vec![
                ("a.txt".to_string(), b"alpha".to_vec()),
                ("b.txt".to_string(), b"beta".to_vec()),
                ("c.txt".to_string(), b"gamma".to_vec()),
            ],
        })
    }

    #[test]
    fn test_extract_item_reports_progress() {
        let mut handle = memory_handle();
        let mut sink = Vec::new();
        let mut reported = 0u64;
        let written = handle
            .extract_item(2, &mut sink, &mut |n| reported += n)
            .expect("extract item");
        assert_eq!(written, 5);
        assert_eq!(reported, 5);
        assert_eq!(sink, b"gamma");
    }

    #[test]
    fn test_default_extract_items_stops_when_visitor_declines() {
        let mut handle = memory_handle();
        let mut visited = Vec::new();
        handle
            .extract_items(&[0, 1, 2], &mut |index: usize, _reader: &mut dyn Read| {
                visited.push(index);
                Ok(index < 1)
            })
            .expect("extract items");
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn test_shared_handle_release_invalidates_access() {
        let shared = SharedHandle::new(memory_handle());
        let alias = shared.clone();
        assert_eq!(alias.with(|h| Ok(h.item_count())).expect("count"), 3);
        assert!(shared.release());
        assert!(!shared.release());
        assert!(alias.is_released());
        assert!(matches!(
            alias.with(|h| Ok(h.item_count())),
            Err(IceError::InvalidHandle)
        ));
    }
}
