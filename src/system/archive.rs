use crate::utils::error::{IceError, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

mod backend;
pub mod engine;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod item;
pub mod list;
pub mod password;
pub mod reader;

pub use engine::ItemInfo;
pub use password::{CachedPassword, PasswordQuery, PasswordReply, PasswordRequest, StaticPassword};
pub use reader::{ArchiveReader, StagedEntry};

/// 압축 해제 중 재시도할 최대 비밀번호 입력 횟수
pub const MAX_PASSWORD_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    GZip,
    Zstd,
    SevenZ,
}

impl ArchiveFormat {
    pub fn display_name(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::GZip => "gzip",
            ArchiveFormat::Zstd => "zstd",
            ArchiveFormat::SevenZ => "7z",
        }
    }

    /// 압축 스트림 하나에 파일 하나만 담는 형식 (gzip, zstd)
    pub fn is_single_stream(&self) -> bool {
        matches!(self, ArchiveFormat::GZip | ArchiveFormat::Zstd)
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveProgressEvent {
    pub current_file: String,
    pub files_completed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

/// 확장자로 형식 판별
pub fn detect_archive_format(path: &Path) -> Option<ArchiveFormat> {
    match path
        .extension()
        .and_then(OsStr::to_str)?
        .to_lowercase()
        .as_str()
    {
        "zip" | "jar" | "war" => Some(ArchiveFormat::Zip),
        "tar" => Some(ArchiveFormat::Tar),
        "gz" | "tgz" => Some(ArchiveFormat::GZip),
        "zst" | "tzst" => Some(ArchiveFormat::Zstd),
        "7z" => Some(ArchiveFormat::SevenZ),
        _ => None,
    }
}

/// 파일 내용(매직 넘버)으로 형식 판별
pub fn detect_format_by_content(path: &Path) -> Result<Option<ArchiveFormat>> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 512];
    let mut filled = 0usize;
    while filled < head.len() {
        let read = file.read(&mut head[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(format_from_magic(&head[..filled]))
}

fn format_from_magic(head: &[u8]) -> Option<ArchiveFormat> {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return Some(ArchiveFormat::Zip);
    }
    if head.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some(ArchiveFormat::SevenZ);
    }
    if head.starts_with(&[0x1F, 0x8B]) {
        return Some(ArchiveFormat::GZip);
    }
    if head.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
        return Some(ArchiveFormat::Zstd);
    }
    if head.len() >= 262 && &head[257..262] == b"ustar" {
        return Some(ArchiveFormat::Tar);
    }
    None
}

/// 내용 기준 판별 후 실패하면 확장자로 판별
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    if let Some(format) = detect_format_by_content(path)? {
        return Ok(format);
    }
    detect_archive_format(path).ok_or_else(|| IceError::ArchiveUnsupportedFormat {
        path: path.to_path_buf(),
    })
}

/// tar 봉투인지 내용으로만 확인 (단일 엔트리 중첩 해제 판단용)
pub fn is_tar_content(path: &Path) -> bool {
    matches!(detect_format_by_content(path), Ok(Some(ArchiveFormat::Tar)))
}

/// 압축 파일 이름에서 저장 폴더 기본 이름을 계산
///
/// `foo.tar.gz` 처럼 tar 를 감싼 형식은 `.tar` 까지 제거한다.
pub fn archive_base_name(archive_path: &Path) -> String {
    let file_name = archive_path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("archive")
        .to_string();
    let lower = file_name.to_ascii_lowercase();

    let suffixes = [
        ".tar.gz", ".tar.zst", ".tgz", ".tzst", ".zip", ".7z", ".jar", ".war", ".tar", ".gz",
        ".zst",
    ];
    for suffix in suffixes {
        if lower.ends_with(suffix) && file_name.len() > suffix.len() {
            let base = &file_name[..file_name.len() - suffix.len()];
            if !base.trim().is_empty() {
                return base.to_string();
            }
        }
    }

    archive_path
        .file_stem()
        .and_then(OsStr::to_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("archive")
        .to_string()
}

pub(crate) fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/").trim_matches('/').to_string()
}

/// `./` 처럼 현재 폴더만 가리키는 엔트리 이름인지 확인
pub(crate) fn is_current_dir_entry(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|comp| matches!(comp, Component::CurDir))
}

pub(crate) fn sanitize_extract_path(dest_root: &Path, raw_path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for comp in raw_path.components() {
        match comp {
            Component::Normal(v) => clean.push(v),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    let out = dest_root.join(clean);
    if out.starts_with(dest_root) {
        Some(out)
    } else {
        None
    }
}
