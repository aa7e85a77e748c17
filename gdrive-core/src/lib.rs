mod client;
mod oauth;
mod secrets;

pub use client::{
    ApiErrorClass, DriveClient, DriveError, DriveFile, FileList, FOLDER_MIME_TYPE, MediaDownload,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
pub use secrets::{ClientSecrets, SecretsError};
