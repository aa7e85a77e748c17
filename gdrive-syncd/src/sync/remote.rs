use std::future::Future;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use gdrive_core::DriveError;

use super::entry::RemoteEntry;
use crate::session::DriveSession;

/// Chunked media body plus its advertised length, if any.
pub struct MediaStream {
    pub total_bytes: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes, DriveError>>,
}

/// What the walker needs from the storage service.
pub trait RemoteFileService {
    fn list_children(
        &self,
        folder_id: &str,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, DriveError>> + Send;

    fn open_media(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<MediaStream, DriveError>> + Send;
}

impl RemoteFileService for DriveSession {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntry>, DriveError> {
        let page_size = self.page_size();
        let files = self
            .authorized(|client| async move { client.list_children(folder_id, page_size).await })
            .await?;
        Ok(files.into_iter().map(RemoteEntry::from_drive_file).collect())
    }

    async fn open_media(&self, file_id: &str) -> Result<MediaStream, DriveError> {
        let download = self
            .authorized(|client| async move { client.download_media(file_id).await })
            .await?;
        Ok(MediaStream {
            total_bytes: download.content_length(),
            chunks: download.into_stream().boxed(),
        })
    }
}
