use super::check_index;
use crate::system::archive::engine::{ArchiveHandle, EntryVisitor, ItemInfo};
use crate::system::archive::{is_current_dir_entry, normalize_entry_name, ArchiveFormat};
use crate::utils::error::{IceError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tar::Archive as TarArchive;

struct IndexedEntry {
    /// tar 스트림에서의 순번 (건너뛴 링크 등 포함)
    ordinal: usize,
    info: ItemInfo,
}

/// tar 핸들. 열 때 헤더를 한 번 훑어 목록을 만들고, 추출할 때 스트림을 다시 읽는다.
pub(crate) struct TarHandle {
    path: PathBuf,
    entries: Vec<IndexedEntry>,
}

impl TarHandle {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let mut archive = TarArchive::new(BufReader::new(File::open(path)?));
        let mut entries = Vec::new();
        let iter = archive.entries().map_err(|e| open_error(path, e))?;
        for (ordinal, entry) in iter.enumerate() {
            let entry = entry.map_err(|e| open_error(path, e))?;
            let kind = entry.header().entry_type();
            if !kind.is_file() && !kind.is_dir() {
                continue;
            }
            let raw_path = entry.path().map_err(|e| open_error(path, e))?;
            let name = normalize_entry_name(&raw_path.to_string_lossy());
            if is_current_dir_entry(&name) {
                continue;
            }
            let modified = entry
                .header()
                .mtime()
                .ok()
                .filter(|secs| *secs > 0)
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
            entries.push(IndexedEntry {
                ordinal,
                info: ItemInfo {
                    path: name,
                    size: entry.size(),
                    modified,
                    is_dir: kind.is_dir(),
                    encrypted: false,
                },
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }
}

impl ArchiveHandle for TarHandle {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn item_count(&self) -> usize {
        self.entries.len()
    }

    fn item_info(&mut self, index: usize) -> Result<ItemInfo> {
        check_index(index, self.entries.len())?;
        Ok(self.entries[index].info.clone())
    }

    fn read_item(&mut self, index: usize, visitor: &mut EntryVisitor<'_>) -> Result<bool> {
        let mut keep_going = true;
        self.extract_items(&[index], &mut |i: usize, reader: &mut dyn Read| {
            keep_going = visitor(i, reader)?;
            Ok(keep_going)
        })?;
        Ok(keep_going)
    }

    fn extract_items(&mut self, indices: &[usize], visitor: &mut EntryVisitor<'_>) -> Result<()> {
        let mut wanted = HashMap::with_capacity(indices.len());
        for &index in indices {
            check_index(index, self.entries.len())?;
            wanted.insert(self.entries[index].ordinal, index);
        }
        if wanted.is_empty() {
            return Ok(());
        }

        let path = self.path.as_path();
        let mut archive = TarArchive::new(BufReader::new(File::open(path)?));
        let mut remaining = wanted.len();
        let iter = archive.entries().map_err(|e| extract_error(path, e))?;
        for (ordinal, entry) in iter.enumerate() {
            let mut entry = entry.map_err(|e| extract_error(path, e))?;
            let Some(&index) = wanted.get(&ordinal) else {
                continue;
            };
            if !visitor(index, &mut entry)? {
                return Ok(());
            }
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        Ok(())
    }
}

fn open_error(path: &Path, error: std::io::Error) -> IceError {
    IceError::ArchiveOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

fn extract_error(path: &Path, error: std::io::Error) -> IceError {
    IceError::ArchiveExtractFailed {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
