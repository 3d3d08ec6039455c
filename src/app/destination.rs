//! 저장 위치 계산
//!
//! 소스 하나마다 루트 폴더를 정하고, 압축 파일 이름과 엔트리 목록으로 저장 폴더를 정한다.

use crate::models::{ExtractSettings, OpenMethod, RootDirectory, SaveLocation};
use crate::utils::error::{IceError, Result};
use std::path::{Path, PathBuf};

/// 실행 중 저장 위치를 묻는 질의. `None` 이면 사용자가 취소한 것이다.
pub trait DestinationQuery: Send + Sync {
    fn select(&self, source: &Path) -> Option<PathBuf>;
}

impl<F> DestinationQuery for F
where
    F: Fn(&Path) -> Option<PathBuf> + Send + Sync,
{
    fn select(&self, source: &Path) -> Option<PathBuf> {
        self(source)
    }
}

#[derive(Debug, Clone)]
pub struct PathExplorer {
    root: PathBuf,
    root_directory: RootDirectory,
    open_method: OpenMethod,
    desktop: Option<PathBuf>,
    save: Option<PathBuf>,
    /// 단일 루트 폴더 때문에 저장 폴더 생성을 생략했을 때의 그 폴더 이름
    single_root: Option<String>,
}

impl PathExplorer {
    /// 저장 위치 정책으로 루트 폴더 결정
    pub fn resolve(
        source: &Path,
        settings: &ExtractSettings,
        query: &dyn DestinationQuery,
    ) -> Result<Self> {
        let desktop = dirs::desktop_dir();
        let root = match settings.save_location {
            SaveLocation::Source => source_directory(source),
            SaveLocation::Desktop => desktop.clone().ok_or_else(|| {
                IceError::Config("desktop directory is not available".to_string())
            })?,
            SaveLocation::Others if !settings.save_directory.as_os_str().is_empty() => {
                settings.save_directory.clone()
            }
            SaveLocation::Others => {
                tracing::debug!("save_directory is empty, falling back to source directory");
                source_directory(source)
            }
            SaveLocation::Query => query.select(source).ok_or(IceError::Cancelled)?,
        };
        tracing::debug!(source = %source.display(), root = %root.display(), "root directory resolved");

        Ok(Self {
            root,
            root_directory: settings.root_directory,
            open_method: settings.open_method,
            desktop,
            save: None,
            single_root: None,
        })
    }

    pub fn root_directory(&self) -> &Path {
        &self.root
    }

    /// 저장 폴더 계산. `entries` 는 배치될 엔트리 경로 (`/` 구분)
    pub fn invoke(&mut self, base_name: &str, entries: &[&str]) -> &Path {
        let single = single_root(entries);
        let create = match self.root_directory {
            RootDirectory::None => false,
            RootDirectory::Create => true,
            RootDirectory::CreateUnlessSingleRoot => single.is_none(),
        };
        self.single_root = if create { None } else { single };
        self.save = Some(if create {
            self.root.join(base_name)
        } else {
            self.root.clone()
        });
        self.save_directory()
    }

    /// `invoke` 전에는 루트 폴더
    pub fn save_directory(&self) -> &Path {
        self.save.as_deref().unwrap_or(&self.root)
    }

    /// 압축 해제 후 열 폴더. 열지 않는 설정이면 `None`
    pub fn open_directory(&self) -> Option<PathBuf> {
        let save = self.save_directory();
        let target = match &self.single_root {
            Some(name) if save.join(name).is_dir() => save.join(name),
            _ => save.to_path_buf(),
        };
        match self.open_method {
            OpenMethod::None => None,
            OpenMethod::Open => Some(target),
            OpenMethod::OpenUnlessDesktop => {
                if self.desktop.as_deref() == Some(save) {
                    None
                } else {
                    Some(target)
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_desktop(&mut self, desktop: Option<PathBuf>) {
        self.desktop = desktop;
    }
}

fn source_directory(source: &Path) -> PathBuf {
    source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 모든 엔트리가 최상위 폴더 하나 아래에 있거나 파일이 하나뿐이면 그 이름
fn single_root(entries: &[&str]) -> Option<String> {
    let mut roots = entries.iter().filter_map(|entry| {
        entry
            .split(['/', '\\'])
            .find(|part| !part.is_empty() && *part != ".")
    });
    let first = roots.next()?;
    if roots.all(|root| root == first) {
        Some(first.to_string())
    } else {
        None
    }
}
