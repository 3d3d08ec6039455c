use super::check_index;
use crate::system::archive::engine::{ArchiveHandle, EntryVisitor, ItemInfo};
use crate::system::archive::password::ArchivePasswordCallback;
use crate::system::archive::{normalize_entry_name, ArchiveFormat};
use crate::utils::error::{IceError, Result};
use chrono::{Local, NaiveDate, TimeZone};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use zip::result::ZipError;
use zip::ZipArchive;

/// zip 핸들. 임의 접근 가능하며 암호화 엔트리를 만나면 비밀번호를 묻는다.
pub(crate) struct ZipHandle {
    path: PathBuf,
    archive: ZipArchive<File>,
    callback: ArchivePasswordCallback,
    password: Option<String>,
}

impl ZipHandle {
    pub(crate) fn open(path: &Path, callback: ArchivePasswordCallback) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(|e| map_zip_open_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            callback,
            password: None,
        })
    }
}

impl ArchiveHandle for ZipHandle {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn item_count(&self) -> usize {
        self.archive.len()
    }

    fn item_info(&mut self, index: usize) -> Result<ItemInfo> {
        check_index(index, self.archive.len())?;
        let entry = self
            .archive
            .by_index_raw(index)
            .map_err(|e| map_zip_open_error(&self.path, e))?;
        Ok(ItemInfo {
            path: normalize_entry_name(entry.name()),
            size: entry.size(),
            modified: entry.last_modified().and_then(zip_time),
            is_dir: entry.is_dir(),
            encrypted: entry.encrypted(),
        })
    }

    fn read_item(&mut self, index: usize, visitor: &mut EntryVisitor<'_>) -> Result<bool> {
        check_index(index, self.archive.len())?;
        let Self {
            path,
            archive,
            callback,
            password,
        } = self;

        let encrypted = archive
            .by_index_raw(index)
            .map_err(|e| map_zip_extract_error(path, e))?
            .encrypted();
        if !encrypted {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| map_zip_extract_error(path, e))?;
            return visitor(index, &mut entry);
        }

        callback.retry(password, |pass| {
            let mut entry = archive
                .by_index_decrypt(index, pass.as_bytes())
                .map_err(|e| map_zip_extract_error(path, e))?;
            visitor(index, &mut entry)
        })
    }
}

fn zip_time(value: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(
        i32::from(value.year()),
        u32::from(value.month()),
        u32::from(value.day()),
    )?
    .and_hms_opt(
        u32::from(value.hour()),
        u32::from(value.minute()),
        u32::from(value.second()),
    )?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(local.into())
}

fn map_zip_open_error(path: &Path, error: ZipError) -> IceError {
    match error {
        ZipError::Io(e) => IceError::Io(e),
        other => IceError::ArchiveOpen {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn map_zip_extract_error(path: &Path, error: ZipError) -> IceError {
    match error {
        ZipError::UnsupportedArchive(detail) if detail == ZipError::PASSWORD_REQUIRED => {
            IceError::ArchivePasswordRequired {
                path: path.to_path_buf(),
            }
        }
        ZipError::InvalidPassword => IceError::ArchiveInvalidPassword {
            path: path.to_path_buf(),
            reason: "Invalid ZIP password".to_string(),
        },
        ZipError::UnsupportedArchive(detail)
            if detail.to_ascii_lowercase().contains("password") =>
        {
            IceError::ArchiveInvalidPassword {
                path: path.to_path_buf(),
                reason: detail.to_string(),
            }
        }
        other => IceError::ArchiveExtractFailed {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_time_converts_valid_dates() {
        let value = zip::DateTime::from_date_and_time(2024, 3, 15, 10, 30, 0).expect("valid date");
        let converted = zip_time(value).expect("converted");
        let local: chrono::DateTime<Local> = converted.into();
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2024-03-15 10:30");
    }

    #[test]
    fn test_map_zip_extract_error_classifies_passwords() {
        let path = Path::new("/tmp/a.zip");
        assert!(matches!(
            map_zip_extract_error(path, ZipError::InvalidPassword),
            IceError::ArchiveInvalidPassword { .. }
        ));
        assert!(matches!(
            map_zip_extract_error(
                path,
                ZipError::UnsupportedArchive(ZipError::PASSWORD_REQUIRED)
            ),
            IceError::ArchivePasswordRequired { .. }
        ));
        assert!(matches!(
            map_zip_extract_error(path, ZipError::FileNotFound),
            IceError::ArchiveExtractFailed { .. }
        ));
    }
}
