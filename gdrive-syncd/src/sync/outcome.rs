use std::fmt;
use std::path::PathBuf;

use gdrive_core::DriveError;

use super::entry::PathError;
use super::local::WriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Retryable,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FileFailure {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            message: message.into(),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FailureKind::Retryable => "retryable",
            FailureKind::Fatal => "fatal",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

impl From<DriveError> for FileFailure {
    fn from(err: DriveError) -> Self {
        if err.is_retryable() {
            Self::retryable(err.to_string())
        } else {
            Self::fatal(err.to_string())
        }
    }
}

impl From<WriteError> for FileFailure {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Remote(err) => err.into(),
            WriteError::IntegrityMismatch { .. } => Self::retryable(err.to_string()),
            WriteError::Io(_) => Self::fatal(err.to_string()),
        }
    }
}

impl From<PathError> for FileFailure {
    fn from(err: PathError) -> Self {
        Self::fatal(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Downloaded { bytes: u64 },
    UpToDate,
    Failed(FileFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub path: PathBuf,
    pub failure: FileFailure,
}

/// Aggregated result of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub folders_visited: usize,
    pub empty_folders: usize,
    pub downloaded: usize,
    pub bytes_downloaded: u64,
    pub up_to_date: usize,
    pub file_failures: Vec<SyncFailure>,
    pub folder_failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn record_file(&mut self, path: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes_downloaded += bytes;
            }
            FileOutcome::UpToDate => self.up_to_date += 1,
            FileOutcome::Failed(failure) => self.file_failures.push(SyncFailure { path, failure }),
        }
    }

    pub fn record_folder_failure(&mut self, path: PathBuf, failure: FileFailure) {
        self.folder_failures.push(SyncFailure { path, failure });
    }

    pub fn is_clean(&self) -> bool {
        self.file_failures.is_empty() && self.folder_failures.is_empty()
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.folders_visited += other.folders_visited;
        self.empty_folders += other.empty_folders;
        self.downloaded += other.downloaded;
        self.bytes_downloaded += other.bytes_downloaded;
        self.up_to_date += other.up_to_date;
        self.file_failures.extend(other.file_failures);
        self.folder_failures.extend(other.folder_failures);
    }
}
