use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported archive format: {}", path.display())]
    ArchiveUnsupportedFormat { path: PathBuf },

    #[error("Failed to open archive {}: {reason}", path.display())]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("Password required: {}", path.display())]
    ArchivePasswordRequired { path: PathBuf },

    #[error("Invalid password for {}: {reason}", path.display())]
    ArchiveInvalidPassword { path: PathBuf, reason: String },

    #[error("Failed to extract {}: {reason}", path.display())]
    ArchiveExtractFailed { path: PathBuf, reason: String },

    #[error("Blocked unsafe entry path: {entry}")]
    UnsafePath { entry: String },

    #[error("Index {index} is out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Archive handle has been released")]
    InvalidHandle,

    #[error("Archive reader has been disposed")]
    Disposed,

    #[error("No usable overwrite decision for {}", path.display())]
    DestinationConflictUnresolved { path: PathBuf },

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl IceError {
    /// 사용자 취소 여부 (에러가 아닌 흐름 제어 결과)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IceError::Cancelled)
    }

    /// 비밀번호 관련 실패 여부
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            IceError::ArchivePasswordRequired { .. } | IceError::ArchiveInvalidPassword { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_password_error() {
        assert!(IceError::Cancelled.is_cancelled());
        assert!(!IceError::Cancelled.is_password_error());
    }

    #[test]
    fn test_password_errors_are_classified() {
        let required = IceError::ArchivePasswordRequired {
            path: PathBuf::from("a.zip"),
        };
        let invalid = IceError::ArchiveInvalidPassword {
            path: PathBuf::from("a.zip"),
            reason: "bad".to_string(),
        };
        assert!(required.is_password_error());
        assert!(invalid.is_password_error());
        assert!(!invalid.is_cancelled());
    }

    #[test]
    fn test_error_messages_include_path() {
        let err = IceError::ArchiveOpen {
            path: PathBuf::from("/tmp/broken.7z"),
            reason: "bad header".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("broken.7z"));
        assert!(text.contains("bad header"));
    }
}
