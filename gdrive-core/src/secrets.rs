use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("I/O error reading client secrets: {0}")]
    Io(#[from] std::io::Error),
    #[error("client secrets are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("client secrets contain neither an \"installed\" nor a \"web\" section")]
    MissingSection,
}

/// OAuth client registration as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, SecretsError> {
        let file: SecretsFile = serde_json::from_str(raw)?;
        file.installed.or(file.web).ok_or(SecretsError::MissingSection)
    }

    pub fn from_file(path: &Path) -> Result<Self, SecretsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
