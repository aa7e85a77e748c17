use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use gdrive_core::{ApiErrorClass, ClientSecrets, DriveClient, DriveError, OAuthClient};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::oauth_flow::OAuthFlow;
use crate::storage::{OAuthState, StorageError, TokenStorage};
use crate::token_provider::TokenProvider;

/// Authenticated handle to Drive, built once at startup and shared by the
/// walker. Every request asks the token provider for a current access token,
/// so walks that outlive the token's one-hour lifetime keep working.
#[derive(Clone)]
pub struct DriveSession {
    client: DriveClient,
    auth: Option<Arc<SessionAuth>>,
    page_size: u32,
}

struct SessionAuth {
    provider: Mutex<TokenProvider>,
    storage: TokenStorage,
}

impl SessionAuth {
    fn persist(&self, state: &OAuthState) {
        if let Err(err) = self.storage.save_oauth_state(state) {
            tracing::warn!(
                "failed to save refreshed token to {}: {err}",
                self.storage.path().display()
            );
        }
    }
}

impl DriveSession {
    /// Session with a fixed access token that is never refreshed.
    pub fn new(client: DriveClient, page_size: u32) -> Self {
        Self {
            client,
            auth: None,
            page_size,
        }
    }

    /// Session whose token comes from `provider`; refreshed tokens are
    /// written back to `storage`.
    pub fn with_token_provider(
        client: DriveClient,
        page_size: u32,
        provider: TokenProvider,
        storage: TokenStorage,
    ) -> Self {
        Self {
            client,
            auth: Some(Arc::new(SessionAuth {
                provider: Mutex::new(provider),
                storage,
            })),
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Self> {
        Self::bootstrap_with_base_url(config, None).await
    }

    /// Resolves a working access token (saved, refreshed, or freshly
    /// consented), persists it, and builds the Drive client around it.
    pub async fn bootstrap_with_base_url(
        config: &AppConfig,
        base_url: Option<&str>,
    ) -> anyhow::Result<Self> {
        let storage = TokenStorage::new(&config.token_path);
        let provider = resolve_valid_token(&storage, &config.credentials_path, base_url).await?;
        let client = build_client(base_url, &provider.state().access_token)?;
        Ok(Self::with_token_provider(
            client,
            config.page_size,
            provider,
            storage,
        ))
    }

    /// Runs `request` with a current token. An auth rejection triggers one
    /// forced refresh and a single retry.
    pub async fn authorized<T, F, Fut>(&self, request: F) -> Result<T, DriveError>
    where
        F: Fn(DriveClient) -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        let client = self.current_client().await;
        match request(client).await {
            Err(err) if matches!(err.classification(), Some(ApiErrorClass::Auth)) => {
                match self.refreshed_client().await {
                    Some(client) => request(client).await,
                    None => Err(err),
                }
            }
            result => result,
        }
    }

    async fn current_client(&self) -> DriveClient {
        let Some(auth) = &self.auth else {
            return self.client.clone();
        };
        let mut provider = auth.provider.lock().await;
        let refreshing = provider.should_refresh();
        match provider.valid_access_token().await {
            Ok(token) => {
                if refreshing {
                    auth.persist(provider.state());
                }
                self.client.with_access_token(token)
            }
            Err(err) => {
                tracing::warn!("access token refresh failed ({err}), using the current token");
                self.client
                    .with_access_token(provider.state().access_token.clone())
            }
        }
    }

    async fn refreshed_client(&self) -> Option<DriveClient> {
        let auth = self.auth.as_ref()?;
        let mut provider = auth.provider.lock().await;
        match provider.refresh_now().await {
            Ok(token) => {
                tracing::info!("access token rejected, refreshed it");
                auth.persist(provider.state());
                Some(self.client.with_access_token(token))
            }
            Err(err) => {
                tracing::warn!("access token rejected and refresh failed: {err}");
                None
            }
        }
    }
}

async fn resolve_valid_token(
    storage: &TokenStorage,
    credentials_path: &Path,
    base_url: Option<&str>,
) -> anyhow::Result<TokenProvider> {
    let (state, fresh) = match storage.get_oauth_state() {
        Ok(state) => (state, false),
        Err(StorageError::TokenNotFound) => {
            tracing::info!(
                "no saved token at {}, starting consent flow",
                storage.path().display()
            );
            (authenticate_and_store(storage, credentials_path).await?, true)
        }
        Err(err) => {
            tracing::warn!("saved token is unreadable ({err}), starting consent flow");
            (authenticate_and_store(storage, credentials_path).await?, true)
        }
    };

    let mut provider = TokenProvider::new(state, load_oauth_client(credentials_path));
    if let Err(err) = verify_access(&mut provider, base_url).await {
        if fresh {
            return Err(err);
        }
        tracing::warn!("saved credentials were rejected ({err:#}), requesting consent again");
        let state = authenticate_and_store(storage, credentials_path).await?;
        provider = TokenProvider::new(state, load_oauth_client(credentials_path));
        verify_access(&mut provider, base_url).await?;
    }

    storage
        .save_oauth_state(provider.state())
        .context("failed to persist oauth state")?;
    Ok(provider)
}

async fn authenticate_and_store(
    storage: &TokenStorage,
    credentials_path: &Path,
) -> anyhow::Result<OAuthState> {
    let secrets = ClientSecrets::from_file(credentials_path).with_context(|| {
        format!(
            "client secrets are required for authorization: {}",
            credentials_path.display()
        )
    })?;
    let client = OAuthClient::from_secrets(&secrets).context("invalid client secrets")?;
    let token = OAuthFlow::new(client).authenticate().await?;
    let state = OAuthState::from_oauth_token(&token);
    storage
        .save_oauth_state(&state)
        .context("failed to save token")?;
    Ok(state)
}

fn load_oauth_client(credentials_path: &Path) -> Option<OAuthClient> {
    let secrets = match ClientSecrets::from_file(credentials_path) {
        Ok(secrets) => secrets,
        Err(err) => {
            tracing::debug!(
                "token refresh unavailable, cannot read {}: {err}",
                credentials_path.display()
            );
            return None;
        }
    };
    OAuthClient::from_secrets(&secrets).ok()
}

/// Probes the API once; a 401/403 triggers a single refresh and retry.
async fn verify_access(
    provider: &mut TokenProvider,
    base_url: Option<&str>,
) -> anyhow::Result<()> {
    let token = provider
        .valid_access_token()
        .await
        .context("failed to resolve valid access token")?;
    let client = build_client(base_url, &token)?;
    match client.get_file("root").await {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.classification(), Some(ApiErrorClass::Auth)) => {
            let refreshed = provider
                .refresh_now()
                .await
                .context("failed to refresh token after 401")?;
            let retry_client = build_client(base_url, &refreshed)?;
            retry_client.get_file("root").await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn build_client(base_url: Option<&str>, token: &str) -> Result<DriveClient, DriveError> {
    match base_url {
        Some(url) => DriveClient::with_base_url(url, token.to_string()),
        None => DriveClient::new(token.to_string()),
    }
}
