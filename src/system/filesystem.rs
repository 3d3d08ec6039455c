use crate::models::operation::OverwriteMethod;
use crate::utils::error::{IceError, Result};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 경로 하나의 파일 정보 (덮어쓰기 질의에 넘긴다)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// 이동 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// 실제로 놓인 경로 (이름 바꾸기를 했으면 바뀐 경로)
    Placed(PathBuf),
    Skipped,
}

/// 파일 시스템 모듈
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystem;

impl FileSystem {
    /// 새 파일 시스템 인스턴스 생성
    pub fn new() -> Self {
        Self
    }

    /// `/` 로 구분된 엔트리 경로를 기준 경로 아래에 붙인다.
    #[allow(clippy::unused_self)]
    pub fn combine(&self, base: &Path, entry_path: &str) -> PathBuf {
        entry_path
            .split(['/', '\\'])
            .filter(|part| !part.is_empty() && *part != ".")
            .fold(base.to_path_buf(), |acc, part| acc.join(part))
    }

    #[allow(clippy::unused_self)]
    pub fn get(&self, path: &Path) -> FileInfo {
        match fs::metadata(path) {
            Ok(meta) => FileInfo {
                path: path.to_path_buf(),
                exists: true,
                is_dir: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                modified: meta.modified().ok(),
            },
            Err(_) => FileInfo {
                path: path.to_path_buf(),
                exists: false,
                is_dir: false,
                size: 0,
                modified: None,
            },
        }
    }

    /// 대상이 이미 있으면 `method` 에 따라 처리한 뒤 파일을 옮긴다.
    pub fn move_to(&self, src: &Path, dest: &Path, method: OverwriteMethod) -> Result<MoveOutcome> {
        if !dest.exists() {
            self.move_file(src, dest)?;
            return Ok(MoveOutcome::Placed(dest.to_path_buf()));
        }

        match method {
            OverwriteMethod::Skip => Ok(MoveOutcome::Skipped),
            OverwriteMethod::Cancel => Err(IceError::Cancelled),
            OverwriteMethod::Overwrite => {
                // 파일 하나로 폴더 전체를 지우지 않는다
                if dest.is_dir() {
                    return Err(IceError::DestinationConflictUnresolved {
                        path: dest.to_path_buf(),
                    });
                }
                fs::remove_file(dest)?;
                self.move_file(src, dest)?;
                Ok(MoveOutcome::Placed(dest.to_path_buf()))
            }
            OverwriteMethod::Rename => {
                let renamed = self.unique_path(dest);
                self.move_file(src, &renamed)?;
                Ok(MoveOutcome::Placed(renamed))
            }
        }
    }

    /// 먼저 rename 을 시도하고, 실패하면 복사 후 삭제합니다.
    /// 반환값: 이동된 바이트 수
    pub fn move_file(&self, src: &Path, dest: &Path) -> Result<u64> {
        let file_size = src.metadata()?.len();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        // 같은 파일시스템 내에서는 rename 으로 끝난다
        if fs::rename(src, dest).is_ok() {
            return Ok(file_size);
        }

        self.copy_file(src, dest)?;
        fs::remove_file(src)?;
        Ok(file_size)
    }

    #[allow(clippy::unused_self)]
    pub fn copy_file(&self, src: &Path, dest: &Path) -> Result<u64> {
        let mut reader = File::open(src)?;
        let mut writer = File::create(dest)?;
        let copied = io::copy(&mut reader, &mut writer)?;
        if let Ok(modified) = src.metadata().and_then(|m| m.modified()) {
            let _ = writer.set_modified(modified);
        }
        Ok(copied)
    }

    /// 휴지통으로 보내고, 실패하면 바로 삭제한다. 성공 여부만 돌려준다.
    #[allow(clippy::unused_self)]
    pub fn try_delete(&self, path: &Path) -> bool {
        match trash::delete(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "trash failed, removing");
                let removed = if path.is_dir() {
                    fs::remove_dir_all(path)
                } else {
                    fs::remove_file(path)
                };
                match removed {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to delete");
                        false
                    }
                }
            }
        }
    }

    /// 존재하지 않는 `name (n).ext` 경로
    #[allow(clippy::unused_self)]
    pub fn unique_path(&self, path: &Path) -> PathBuf {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("file")
            .to_string();
        let ext = path.extension().and_then(OsStr::to_str);
        let mut index = 1usize;
        loop {
            let name = match ext {
                Some(ext) => format!("{} ({}).{}", stem, index, ext),
                None => format!("{} ({})", stem, index),
            };
            let candidate = parent.join(name);
            if !candidate.exists() {
                return candidate;
            }
            index += 1;
        }
    }

    /// OS 기본 프로그램으로 열기
    #[allow(clippy::unused_self)]
    pub fn open_with_default_app(&self, path: &Path) -> Result<()> {
        use std::process::Command;

        if !path.exists() {
            return Err(IceError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let program = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        let status = Command::new(program).arg(path).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(IceError::Io(io::Error::other(format!(
                "{} exited with status {}",
                program, status
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_combine_splits_entry_path() {
        let fs = FileSystem::new();
        let base = Path::new("/tmp/base");
        assert_eq!(
            fs.combine(base, "docs/./sub\\a.txt"),
            PathBuf::from("/tmp/base/docs/sub/a.txt")
        );
        assert_eq!(fs.combine(base, ""), PathBuf::from("/tmp/base"));
    }

    #[test]
    fn test_get_reports_existence_and_size() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"12345").unwrap();

        let fs_module = FileSystem::new();
        let info = fs_module.get(&file);
        assert!(info.exists);
        assert!(!info.is_dir);
        assert_eq!(info.size, 5);
        assert_eq!(info.name(), "a.txt");
        assert!(!fs_module.get(&temp.path().join("missing")).exists);
    }

    #[test]
    fn test_move_to_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.txt");
        fs::write(&src, b"data").unwrap();
        let dest = temp.path().join("deep").join("dir").join("dest.txt");

        let outcome = FileSystem::new()
            .move_to(&src, &dest, OverwriteMethod::Skip)
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Placed(dest.clone()));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_move_to_honours_each_method() {
        let temp = TempDir::new().unwrap();
        let fs_module = FileSystem::new();
        let dest = temp.path().join("report.txt");
        fs::write(&dest, b"old").unwrap();

        let src = temp.path().join("incoming-skip");
        fs::write(&src, b"new").unwrap();
        assert_eq!(
            fs_module.move_to(&src, &dest, OverwriteMethod::Skip).unwrap(),
            MoveOutcome::Skipped
        );
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(src.exists());

        assert!(matches!(
            fs_module.move_to(&src, &dest, OverwriteMethod::Cancel),
            Err(IceError::Cancelled)
        ));

        let renamed = fs_module
            .move_to(&src, &dest, OverwriteMethod::Rename)
            .unwrap();
        assert_eq!(
            renamed,
            MoveOutcome::Placed(temp.path().join("report (1).txt"))
        );
        assert_eq!(fs::read(&dest).unwrap(), b"old");

        let src = temp.path().join("incoming-overwrite");
        fs::write(&src, b"newest").unwrap();
        fs_module
            .move_to(&src, &dest, OverwriteMethod::Overwrite)
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"newest");
    }

    #[test]
    fn test_overwrite_never_replaces_directory_with_file() {
        let temp = TempDir::new().unwrap();
        let fs_module = FileSystem::new();
        let dest = temp.path().join("docs");
        fs::create_dir_all(dest.join("keep")).unwrap();
        fs::write(dest.join("keep").join("notes.txt"), b"notes").unwrap();
        let src = temp.path().join("incoming");
        fs::write(&src, b"file").unwrap();

        assert!(matches!(
            fs_module.move_to(&src, &dest, OverwriteMethod::Overwrite),
            Err(IceError::DestinationConflictUnresolved { .. })
        ));
        assert_eq!(fs::read(dest.join("keep").join("notes.txt")).unwrap(), b"notes");
        assert!(src.exists());
    }

    #[test]
    fn test_unique_path_skips_taken_names() {
        let temp = TempDir::new().unwrap();
        let fs_module = FileSystem::new();
        fs::write(temp.path().join("a.txt"), b"").unwrap();
        fs::write(temp.path().join("a (1).txt"), b"").unwrap();
        assert_eq!(
            fs_module.unique_path(&temp.path().join("a.txt")),
            temp.path().join("a (2).txt")
        );
        assert_eq!(
            fs_module.unique_path(&temp.path().join("README")),
            temp.path().join("README (1)")
        );
    }

    #[test]
    fn test_try_delete_removes_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("source.zip");
        fs::write(&file, b"zip").unwrap();
        assert!(FileSystem::new().try_delete(&file));
        assert!(!file.exists());
    }
}
