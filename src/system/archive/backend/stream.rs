use super::check_index;
use crate::system::archive::engine::{ArchiveHandle, EntryVisitor, ItemInfo};
use crate::system::archive::{normalize_entry_name, ArchiveFormat};
use crate::utils::error::{IceError, Result};
use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zstd::stream::read::Decoder as ZstdDecoder;

/// gzip / zstd 처럼 파일 하나를 압축한 스트림. 엔트리는 항상 하나다.
pub(crate) struct StreamHandle {
    path: PathBuf,
    format: ArchiveFormat,
    info: ItemInfo,
}

impl StreamHandle {
    pub(crate) fn open(path: &Path, format: ArchiveFormat) -> Result<Self> {
        let file_modified = fs::metadata(path)?.modified().ok();
        let info = match format {
            ArchiveFormat::GZip => gzip_info(path, file_modified)?,
            ArchiveFormat::Zstd => zstd_info(path, file_modified)?,
            other => {
                return Err(IceError::ArchiveOpen {
                    path: path.to_path_buf(),
                    reason: format!("{} is not a single-stream format", other.display_name()),
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            format,
            info,
        })
    }

    fn decoder(&self) -> Result<Box<dyn Read>> {
        let file = BufReader::new(File::open(&self.path)?);
        let reader: Box<dyn Read> = match self.format {
            ArchiveFormat::Zstd => Box::new(ZstdDecoder::with_buffer(file)?),
            _ => Box::new(GzDecoder::new(file)),
        };
        Ok(reader)
    }
}

impl ArchiveHandle for StreamHandle {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn item_count(&self) -> usize {
        1
    }

    fn item_info(&mut self, index: usize) -> Result<ItemInfo> {
        check_index(index, 1)?;
        Ok(self.info.clone())
    }

    fn read_item(&mut self, index: usize, visitor: &mut EntryVisitor<'_>) -> Result<bool> {
        check_index(index, 1)?;
        let mut reader = self.decoder()?;
        visitor(index, &mut reader)
    }
}

fn gzip_info(path: &Path, file_modified: Option<SystemTime>) -> Result<ItemInfo> {
    let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let header = decoder.header().ok_or_else(|| IceError::ArchiveOpen {
        path: path.to_path_buf(),
        reason: "Invalid gzip header".to_string(),
    })?;
    let name = header
        .filename()
        .map(|raw| normalize_entry_name(&String::from_utf8_lossy(raw)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| stream_entry_name(path));
    let modified = match header.mtime() {
        0 => file_modified,
        secs => Some(UNIX_EPOCH + Duration::from_secs(u64::from(secs))),
    };

    Ok(ItemInfo {
        path: name,
        size: gzip_trailer_size(path)?,
        modified,
        is_dir: false,
        encrypted: false,
    })
}

/// gzip 트레일러의 ISIZE (원본 크기 mod 2^32)
fn gzip_trailer_size(path: &Path) -> Result<u64> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < 18 {
        return Err(IceError::ArchiveOpen {
            path: path.to_path_buf(),
            reason: "Truncated gzip stream".to_string(),
        });
    }
    file.seek(SeekFrom::End(-4))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)?;
    Ok(u64::from(u32::from_le_bytes(trailer)))
}

fn zstd_info(path: &Path, file_modified: Option<SystemTime>) -> Result<ItemInfo> {
    let mut decoder = ZstdDecoder::new(File::open(path)?)?;
    let size = io::copy(&mut decoder, &mut io::sink()).map_err(|e| IceError::ArchiveOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(ItemInfo {
        path: stream_entry_name(path),
        size,
        modified: file_modified,
        is_dir: false,
        encrypted: false,
    })
}

/// 압축 접미사를 뗀 엔트리 이름 (`.tgz`/`.tzst` 는 `.tar` 로 바꾼다)
fn stream_entry_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default();
    let lower = file_name.to_ascii_lowercase();
    for (suffix, replacement) in [(".tgz", ".tar"), (".tzst", ".tar"), (".gz", ""), (".zst", "")] {
        if lower.ends_with(suffix) && file_name.len() > suffix.len() {
            return format!("{}{}", &file_name[..file_name.len() - suffix.len()], replacement);
        }
    }
    path.file_stem()
        .and_then(OsStr::to_str)
        .filter(|stem| !stem.is_empty())
        .unwrap_or("data")
        .to_string()
}
