use std::path::{Path, PathBuf};

use gdrive_core::DriveError;
use thiserror::Error;
use time::UtcOffset;

use super::backoff::Backoff;
use super::entry::{RemoteEntry, SyncTarget};
use super::freshness::{self, Freshness};
use super::local;
use super::outcome::{FileFailure, FileOutcome, SyncReport};
use super::remote::RemoteFileService;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list folder {folder_id}: {source}")]
    List {
        folder_id: String,
        #[source]
        source: DriveError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_written: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Completion in percent, when the total size is known.
    pub fn percent(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.bytes_written as f64 / total as f64 * 100.0).min(100.0)
            }
        })
    }
}

type ProgressFn = Box<dyn Fn(&Path, DownloadProgress) + Send + Sync>;

struct Pending {
    entry: RemoteEntry,
    local_base: PathBuf,
}

/// Mirrors a remote folder tree into a local directory, fetching only files
/// whose remote copy is strictly newer than the local one. Never deletes.
pub struct SyncWalker<R> {
    remote: R,
    comparison_offset: UtcOffset,
    download_retries: u32,
    backoff: Backoff,
    progress: Option<ProgressFn>,
}

impl<R: RemoteFileService> SyncWalker<R> {
    pub fn new(remote: R, comparison_offset: UtcOffset) -> Self {
        Self {
            remote,
            comparison_offset,
            download_retries: 0,
            backoff: Backoff::default(),
            progress: None,
        }
    }

    /// Extra attempts for retryable download failures. Waits between them
    /// follow [`Backoff::default`], Drive's 1s..32s schedule with jitter.
    pub fn with_download_retries(mut self, retries: u32) -> Self {
        self.download_retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&Path, DownloadProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Syncs `folder_id` into `local_base`, depth-first in listing order.
    ///
    /// Only a failure to list `folder_id` itself is returned as an error;
    /// failures below it are recorded in the report and the walk continues.
    pub async fn sync(
        &self,
        folder_id: &str,
        local_base: &Path,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let children = self
            .remote
            .list_children(folder_id)
            .await
            .map_err(|source| SyncError::List {
                folder_id: folder_id.to_string(),
                source,
            })?;
        report.folders_visited += 1;

        let mut pending = Vec::new();
        enqueue_children(&mut pending, &mut report, folder_id, local_base, children);

        while let Some(Pending { entry, local_base }) = pending.pop() {
            let fallback_path = local_base.join(&entry.name);
            let target = match SyncTarget::new(entry, &local_base) {
                Ok(target) => target,
                Err(err) => {
                    tracing::warn!("skipping entry under {}: {err}", local_base.display());
                    report.record_file(fallback_path, FileOutcome::Failed(err.into()));
                    continue;
                }
            };

            if target.entry.is_folder {
                self.descend(&target, &mut pending, &mut report).await;
            } else {
                let outcome = self.sync_file(&target).await;
                report.record_file(target.local_path, outcome);
            }
        }

        Ok(report)
    }

    async fn descend(
        &self,
        target: &SyncTarget,
        pending: &mut Vec<Pending>,
        report: &mut SyncReport,
    ) {
        if let Err(err) = local::ensure_dir(&target.local_path).await {
            tracing::error!("failed to create {}: {err}", target.local_path.display());
            report.record_folder_failure(
                target.local_path.clone(),
                FileFailure::fatal(err.to_string()),
            );
            return;
        }
        match self.remote.list_children(&target.entry.id).await {
            Ok(children) => {
                report.folders_visited += 1;
                enqueue_children(
                    pending,
                    report,
                    &target.entry.id,
                    &target.local_path,
                    children,
                );
            }
            Err(err) => {
                tracing::error!(
                    folder_id = %target.entry.id,
                    "failed to list {}: {err}",
                    target.local_path.display()
                );
                report.record_folder_failure(target.local_path.clone(), err.into());
            }
        }
    }

    async fn sync_file(&self, target: &SyncTarget) -> FileOutcome {
        let path = &target.local_path;
        let local_time = match local::modified_time(path).await {
            Ok(local_time) => local_time,
            Err(err) => {
                tracing::error!("cannot inspect {}: {err}", path.display());
                return FileOutcome::Failed(FileFailure::fatal(err.to_string()));
            }
        };
        let remote_time = target.entry.modified_time;
        let freshness = freshness::compare(remote_time, local_time, self.comparison_offset);
        let offset = self.comparison_offset;

        if !freshness.needs_download() {
            tracing::info!(
                remote = ?remote_time.map(|t| t.to_offset(offset)),
                local = ?local_time.map(|t| t.to_offset(offset)),
                "{} is up to date, not downloading",
                target.entry.name
            );
            return FileOutcome::UpToDate;
        }

        let reason = match freshness {
            Freshness::Missing => "missing locally",
            Freshness::Unknown => "remote time unknown",
            _ => "remote is newer",
        };
        tracing::info!(
            remote = ?remote_time.map(|t| t.to_offset(offset)),
            local = ?local_time.map(|t| t.to_offset(offset)),
            reason,
            "downloading {}",
            target.entry.name
        );

        let mut attempt = 0u32;
        loop {
            match self.download(target).await {
                Ok(bytes) => {
                    tracing::info!("{} downloaded ({bytes} bytes)", path.display());
                    return FileOutcome::Downloaded { bytes };
                }
                Err(failure) if failure.is_retryable() && attempt < self.download_retries => {
                    let delay = self.backoff.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        "download of {} failed ({failure}), retrying in {delay:?}",
                        path.display()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    tracing::error!("download of {} failed: {failure}", path.display());
                    return FileOutcome::Failed(failure);
                }
            }
        }
    }

    async fn download(&self, target: &SyncTarget) -> Result<u64, FileFailure> {
        let media = self.remote.open_media(&target.entry.id).await?;
        let total_bytes = media.total_bytes.or(target.entry.size);
        let path = target.local_path.as_path();

        let written = local::write_stream(
            path,
            media.chunks,
            target.entry.md5.as_deref(),
            |bytes_written| {
                let progress = DownloadProgress {
                    bytes_written,
                    total_bytes,
                };
                match &self.progress {
                    Some(report) => report(path, progress),
                    None => match progress.percent() {
                        Some(percent) => {
                            tracing::debug!("{}: {percent:.0}%", path.display())
                        }
                        None => tracing::debug!("{}: {bytes_written} bytes", path.display()),
                    },
                }
            },
        )
        .await?;
        Ok(written)
    }
}

fn enqueue_children(
    pending: &mut Vec<Pending>,
    report: &mut SyncReport,
    folder_id: &str,
    local_base: &Path,
    children: Vec<RemoteEntry>,
) {
    if children.is_empty() {
        tracing::info!(folder_id, "no files in {}", local_base.display());
        report.empty_folders += 1;
        return;
    }
    // Reversed so that popping yields listing order.
    pending.extend(children.into_iter().rev().map(|entry| Pending {
        entry,
        local_base: local_base.to_path_buf(),
    }));
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
