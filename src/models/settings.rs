//! 사용자 설정 (TOML)
//!
//! `$ICE_SETTINGS_FILE` 또는 `<config_dir>/ice/settings.toml` 에서 읽는다.

use crate::utils::error::{IceError, Result};
use crate::utils::glob::split_filters;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_ENV: &str = "ICE_SETTINGS_FILE";
pub const DEFAULT_FILTERS: &str = ".DS_Store|Thumbs.db|__MACOSX|desktop.ini";

/// 저장 위치 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveLocation {
    /// 압축 파일과 같은 폴더
    #[default]
    Source,
    Desktop,
    /// `save_directory` 에 지정한 폴더
    Others,
    /// 실행할 때마다 묻기
    Query,
}

/// 압축 파일 이름의 폴더를 만들지 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootDirectory {
    None,
    Create,
    /// 최상위가 폴더 하나뿐이면 만들지 않는다
    #[default]
    CreateUnlessSingleRoot,
}

/// 압축 해제 후 폴더 열기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMethod {
    #[default]
    None,
    Open,
    /// 저장 폴더가 바탕화면이면 열지 않는다
    OpenUnlessDesktop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub save_location: SaveLocation,
    pub save_directory: PathBuf,
    pub root_directory: RootDirectory,
    pub filtering: bool,
    pub filters: String,
    pub open_method: OpenMethod,
    pub delete_source: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            save_location: SaveLocation::default(),
            save_directory: PathBuf::new(),
            root_directory: RootDirectory::default(),
            filtering: true,
            filters: DEFAULT_FILTERS.to_string(),
            open_method: OpenMethod::default(),
            delete_source: false,
        }
    }
}

impl ExtractSettings {
    /// 필터링이 꺼져 있으면 빈 목록
    pub fn filter_patterns(&self) -> Vec<String> {
        if self.filtering {
            split_filters(&self.filters)
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extract: ExtractSettings,
}

impl Settings {
    pub fn settings_path() -> Option<PathBuf> {
        if let Ok(custom) = env::var(SETTINGS_ENV) {
            let trimmed = custom.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        dirs::config_dir().map(|dir| dir.join("ice").join("settings.toml"))
    }

    /// 기본 위치에서 읽기. 파일이 없으면 기본값
    pub fn load() -> Result<Self> {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Self::decode(&data)
            .map_err(|e| IceError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(self).map_err(|e| IceError::Config(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }

    fn decode(data: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(data)
    }
}
