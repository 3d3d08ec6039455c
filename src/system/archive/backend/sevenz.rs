use super::check_index;
use crate::system::archive::engine::{ArchiveHandle, EntryVisitor, ItemInfo};
use crate::system::archive::password::ArchivePasswordCallback;
use crate::system::archive::{normalize_entry_name, ArchiveFormat};
use crate::utils::error::{IceError, Result};
use sevenz_rust2::Error as SevenZError;
use sevenz_rust2::Password as SevenZPassword;
use sevenz_rust2::SevenZReader;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// 7z 핸들
///
/// 헤더가 암호화된 경우 열 때, 내용만 암호화된 경우 첫 추출 때 비밀번호를 묻는다.
pub(crate) struct SevenZHandle {
    path: PathBuf,
    callback: ArchivePasswordCallback,
    password: Option<String>,
    items: Vec<ItemInfo>,
    /// 엔진이 돌려주는 원래 엔트리 이름 (같은 이름이 여럿일 수 있다)
    raw_names: Vec<String>,
}

impl SevenZHandle {
    pub(crate) fn open(path: &Path, callback: ArchivePasswordCallback) -> Result<Self> {
        let mut password = None;
        let reader = match open_reader(File::open(path)?, None) {
            Ok(reader) => reader,
            Err(SevenZError::PasswordRequired) => {
                tracing::debug!(path = %path.display(), "7z header is encrypted");
                callback.retry(&mut password, |pass| {
                    open_reader(File::open(path)?, Some(pass))
                        .map_err(|e| map_7z_error(path, e, true, true))
                })?
            }
            Err(e) => return Err(map_7z_error(path, e, false, true)),
        };

        let header_encrypted = password.is_some();
        let mut items = Vec::new();
        let mut raw_names = Vec::new();
        for entry in &reader.archive().files {
            items.push(ItemInfo {
                path: normalize_entry_name(&entry.name),
                size: entry.size,
                modified: None,
                is_dir: entry.is_directory,
                encrypted: header_encrypted,
            });
            raw_names.push(entry.name.clone());
        }

        Ok(Self {
            path: path.to_path_buf(),
            callback,
            password,
            items,
            raw_names,
        })
    }
}

impl ArchiveHandle for SevenZHandle {
    fn source(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZ
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn item_info(&mut self, index: usize) -> Result<ItemInfo> {
        check_index(index, self.items.len())?;
        let mut info = self.items[index].clone();
        info.encrypted |= self.password.is_some();
        Ok(info)
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
        let mut wanted = HashSet::with_capacity(indices.len());
        for &index in indices {
            check_index(index, self.items.len())?;
            wanted.insert(index);
        }
        if wanted.is_empty() {
            return Ok(());
        }

        let Self {
            path,
            callback,
            password,
            raw_names,
            ..
        } = self;
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, name) in raw_names.iter().enumerate() {
            positions.entry(name.as_str()).or_default().push(index);
        }
        let mut done = HashSet::new();
        let mut pass = EntryPass {
            path,
            positions: &positions,
            wanted: &wanted,
            done: &mut done,
        };

        let first = pass.run(password.as_deref(), visitor);
        match first {
            Err(IceError::ArchivePasswordRequired { .. }) if password.is_none() => {
                tracing::debug!(path = %path.display(), "7z content is encrypted");
                callback
                    .retry(password, |candidate| pass.run(Some(candidate), visitor))
                    .map(|_| ())
            }
            other => other.map(|_| ()),
        }
    }
}

/// 한 번의 `for_each_entries` 순회. 이미 처리한 엔트리는 다시 넘기지 않는다.
struct EntryPass<'a> {
    path: &'a Path,
    positions: &'a HashMap<&'a str, Vec<usize>>,
    wanted: &'a HashSet<usize>,
    done: &'a mut HashSet<usize>,
}

impl EntryPass<'_> {
    /// 방문자가 중단을 요청했으면 `false`
    fn run(&mut self, password: Option<&str>, visitor: &mut EntryVisitor<'_>) -> Result<bool> {
        let path = self.path;
        let mut reader = open_reader(File::open(path)?, password)
            .map_err(|e| map_7z_error(path, e, password.is_some(), true))?;

        let positions = self.positions;
        let wanted = self.wanted;
        let done = &mut *self.done;
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut failure: Option<IceError> = None;
        let mut stopped = false;

        let result = reader.for_each_entries(|entry, data| {
            let occurrence = seen.entry(entry.name.clone()).or_insert(0);
            let index = positions
                .get(entry.name.as_str())
                .and_then(|list| list.get(*occurrence))
                .copied();
            *occurrence += 1;

            let Some(index) = index.filter(|i| wanted.contains(i) && !done.contains(i)) else {
                if let Err(e) = io::copy(data, &mut io::sink()) {
                    failure = Some(read_failure(path, e, password.is_some()));
                    return Ok(false);
                }
                return Ok(true);
            };

            match visitor(index, data) {
                Ok(keep_going) => {
                    done.insert(index);
                    if !keep_going {
                        stopped = true;
                        return Ok(false);
                    }
                    Ok(done.len() < wanted.len())
                }
                Err(IceError::Io(e)) => {
                    failure = Some(read_failure(path, e, password.is_some()));
                    Ok(false)
                }
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        });

        if let Some(error) = failure {
            return Err(error);
        }
        result.map_err(|e| map_7z_error(path, e, password.is_some(), false))?;
        Ok(!stopped)
    }
}

fn open_reader(
    file: File,
    password: Option<&str>,
) -> std::result::Result<SevenZReader<File>, SevenZError> {
    let password = password
        .map(SevenZPassword::from)
        .unwrap_or_else(SevenZPassword::empty);
    SevenZReader::new(file, password)
}

/// 암호화된 내용을 잘못된 비밀번호로 풀면 읽기 도중 깨진 데이터 오류가 난다.
fn read_failure(path: &Path, error: io::Error, with_password: bool) -> IceError {
    let corrupt = matches!(
        error.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof | io::ErrorKind::Other
    );
    if with_password && corrupt {
        IceError::ArchiveInvalidPassword {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    } else {
        IceError::Io(error)
    }
}

fn map_7z_error(path: &Path, error: SevenZError, with_password: bool, opening: bool) -> IceError {
    match error {
        SevenZError::PasswordRequired if !with_password => IceError::ArchivePasswordRequired {
            path: path.to_path_buf(),
        },
        SevenZError::PasswordRequired => IceError::ArchiveInvalidPassword {
            path: path.to_path_buf(),
            reason: "Password required".to_string(),
        },
        SevenZError::MaybeBadPassword(inner) => IceError::ArchiveInvalidPassword {
            path: path.to_path_buf(),
            reason: inner.to_string(),
        },
        other => {
            let reason = other.to_string();
            if with_password {
                IceError::ArchiveInvalidPassword {
                    path: path.to_path_buf(),
                    reason,
                }
            } else if opening {
                IceError::ArchiveOpen {
                    path: path.to_path_buf(),
                    reason,
                }
            } else {
                IceError::ArchiveExtractFailed {
                    path: path.to_path_buf(),
                    reason,
                }
            }
        }
    }
}
