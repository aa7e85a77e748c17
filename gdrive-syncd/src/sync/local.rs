use std::{
    io,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use gdrive_core::DriveError;
use md5::Context;
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("download interrupted: {0}")]
    Remote(#[from] DriveError),
    #[error("download integrity check failed: expected {expected_md5}, got {actual_md5}")]
    IntegrityMismatch {
        expected_md5: String,
        actual_md5: String,
    },
}

/// Last-modified time of the file at `path`, or `None` when nothing is there.
pub async fn modified_time(path: &Path) -> io::Result<Option<OffsetDateTime>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        return Err(io::Error::other(format!(
            "a directory already exists at {}",
            path.display()
        )));
    }
    Ok(Some(OffsetDateTime::from(metadata.modified()?)))
}

pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Streams `chunks` into `target`, calling `on_chunk` with the running byte
/// count after every chunk. Data lands in a hidden, randomly named sibling
/// that is renamed over `target` only once the stream completes and, when
/// `expected_md5` is given, the checksum matches. The temporary name starts
/// with a dot and carries a random tag, so it never shadows another remote
/// entry in the same folder. On failure the temporary file is removed and any
/// existing `target` is left untouched.
pub async fn write_stream<S, F>(
    target: &Path,
    chunks: S,
    expected_md5: Option<&str>,
    on_chunk: F,
) -> Result<u64, WriteError>
where
    S: Stream<Item = Result<Bytes, DriveError>> + Unpin,
    F: FnMut(u64),
{
    let partial = partial_path(target);
    let result = match write_partial(target, &partial, chunks, expected_md5, on_chunk).await {
        Ok(written) => tokio::fs::rename(&partial, target)
            .await
            .map(|()| written)
            .map_err(WriteError::from),
        Err(err) => Err(err),
    };
    if result.is_err() {
        match tokio::fs::remove_file(&partial).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                tracing::warn!("failed to remove {}: {err}", partial.display());
            }
            _ => {}
        }
    }
    result
}

async fn write_partial<S, F>(
    target: &Path,
    partial: &Path,
    mut chunks: S,
    expected_md5: Option<&str>,
    mut on_chunk: F,
) -> Result<u64, WriteError>
where
    S: Stream<Item = Result<Bytes, DriveError>> + Unpin,
    F: FnMut(u64),
{
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(partial).await?;
    let mut md5 = expected_md5.map(|_| Context::new());
    let mut written = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        if let Some(ctx) = md5.as_mut() {
            ctx.consume(&chunk);
        }
        written += chunk.len() as u64;
        on_chunk(written);
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let (Some(expected_md5), Some(ctx)) = (expected_md5, md5) {
        let actual_md5 = format!("{:x}", ctx.compute());
        if actual_md5 != expected_md5.to_ascii_lowercase() {
            return Err(WriteError::IntegrityMismatch {
                expected_md5: expected_md5.to_ascii_lowercase(),
                actual_md5,
            });
        }
    }
    Ok(written)
}

const PARTIAL_SUFFIX: &str = ".partial";

/// `<dir>/.<name>.<random>.partial`.
fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    target.with_file_name(format!(".{name}.{tag}{PARTIAL_SUFFIX}"))
}
