use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use time::UtcOffset;
use time::macros::format_description;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_TOKEN_PATH: &str = "token.json";
const DEFAULT_PAGE_SIZE: u32 = 1000;
/// Asia/Seoul, which observes no daylight saving time.
const DEFAULT_COMPARISON_OFFSET: UtcOffset = match UtcOffset::from_hms(9, 0, 0) {
    Ok(offset) => offset,
    Err(_) => UtcOffset::UTC,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid comparison offset {0:?}, expected e.g. \"+09:00\"")]
    InvalidOffset(String),
    #[error("config lists no folder ids")]
    NoFolderIds,
    #[error("fileSavePath is empty")]
    EmptySavePath,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    file_ids: Vec<String>,
    file_save_path: String,
    #[serde(default)]
    comparison_offset: Option<String>,
    #[serde(default)]
    credentials_path: Option<PathBuf>,
    #[serde(default)]
    token_path: Option<PathBuf>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    download_retries: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub folder_ids: Vec<String>,
    pub save_root: PathBuf,
    pub comparison_offset: UtcOffset,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub page_size: u32,
    pub download_retries: u32,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let home = dirs::home_dir();
        let mut config = Self::from_json(&raw, home.as_deref())?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_json(raw: &str, home: Option<&Path>) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        let folder_ids: Vec<String> = file
            .file_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if folder_ids.is_empty() {
            return Err(ConfigError::NoFolderIds);
        }
        if file.file_save_path.trim().is_empty() {
            return Err(ConfigError::EmptySavePath);
        }
        let comparison_offset = match file.comparison_offset.as_deref() {
            Some(raw) => parse_offset(raw)?,
            None => DEFAULT_COMPARISON_OFFSET,
        };

        Ok(Self {
            folder_ids,
            save_root: expand_with_home(file.file_save_path.trim(), home),
            comparison_offset,
            credentials_path: file
                .credentials_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            token_path: file
                .token_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            page_size: file.page_size.filter(|v| *v > 0).unwrap_or(DEFAULT_PAGE_SIZE),
            download_retries: file.download_retries.unwrap_or(0),
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("GDRIVE_CREDENTIALS_PATH").filter(|v| !v.trim().is_empty()) {
            self.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("GDRIVE_TOKEN_PATH").filter(|v| !v.trim().is_empty()) {
            self.token_path = PathBuf::from(path);
        }
    }
}

pub fn parse_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConfigError::InvalidOffset(raw.to_string()))
}

fn expand_with_home(value: &str, home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) if value == "~" => home.to_path_buf(),
        Some(home) => match value.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}
