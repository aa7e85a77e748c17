use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use gdrive_core::DriveFile;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("remote entry has an empty name")]
    Empty,
    #[error("remote name {0:?} is not a single path component")]
    UnsupportedName(String),
}

/// One child of a remote folder, as returned by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub modified_time: Option<OffsetDateTime>,
    pub size: Option<u64>,
    pub md5: Option<String>,
}

impl RemoteEntry {
    pub fn from_drive_file(file: DriveFile) -> Self {
        let modified_time = match file.modified_at() {
            Ok(modified) => modified,
            Err(err) => {
                tracing::warn!(
                    id = %file.id,
                    name = %file.name,
                    "ignoring unparseable modifiedTime: {err}"
                );
                None
            }
        };
        Self {
            is_folder: file.is_folder(),
            size: file.size_bytes(),
            md5: file.md5_checksum.filter(|sum| !sum.is_empty()),
            modified_time,
            id: file.id,
            name: file.name,
        }
    }
}

/// A remote entry paired with the local path it mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub entry: RemoteEntry,
    pub local_path: PathBuf,
}

impl SyncTarget {
    pub fn new(entry: RemoteEntry, local_base: &Path) -> Result<Self, PathError> {
        let local_path = local_path_for(local_base, &entry.name)?;
        Ok(Self { entry, local_path })
    }
}

/// Joins a remote name onto `local_base`, refusing names that would escape it.
pub fn local_path_for(local_base: &Path, name: &str) -> Result<PathBuf, PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == OsStr::new(name) => {
            Ok(local_base.join(part))
        }
        _ => Err(PathError::UnsupportedName(name.to_string())),
    }
}
