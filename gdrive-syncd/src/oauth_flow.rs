use std::process::{Command, Stdio};
use std::time::Duration;

use gdrive_core::{OAuthClient, OAuthToken};
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

pub const DRIVE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive",
];

const MANUAL_REDIRECT_URI: &str = "http://localhost";

#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("oauth error: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization code missing in redirect")]
    MissingCode,
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("state parameter mismatch in redirect")]
    StateMismatch,
    #[error("authorization timed out")]
    Timeout,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Interactive consent: a loopback redirect when possible, manual paste of
/// the redirect URL otherwise.
pub struct OAuthFlow {
    client: OAuthClient,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    pub async fn authenticate(&self) -> Result<OAuthToken, OAuthFlowError> {
        if !env_flag("GDRIVE_OAUTH_FORCE_MANUAL") {
            match self.authenticate_via_loopback().await {
                Ok(token) => return Ok(token),
                Err(err @ (OAuthFlowError::Denied(_) | OAuthFlowError::OAuth(_))) => {
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        "oauth loopback flow unavailable ({err}), falling back to manual code entry"
                    );
                }
            }
        }
        self.authenticate_manually().await
    }

    async fn authenticate_via_loopback(&self) -> Result<OAuthToken, OAuthFlowError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let redirect_uri = format!("http://127.0.0.1:{}/", addr.port());
        let state = random_state();
        let url = self
            .client
            .authorize_url(&redirect_uri, DRIVE_SCOPES, Some(&state));

        println!("Open this URL in your browser to authorize access:\n{url}");
        if let Err(err) = open_in_browser(&url) {
            tracing::debug!("could not launch a browser: {err}");
        }

        let code = tokio::time::timeout(oauth_timeout(), accept_callback(&listener, &state))
            .await
            .map_err(|_| OAuthFlowError::Timeout)??;
        Ok(self.client.exchange_code(&code, &redirect_uri).await?)
    }

    async fn authenticate_manually(&self) -> Result<OAuthToken, OAuthFlowError> {
        let state = random_state();
        let url = self
            .client
            .authorize_url(MANUAL_REDIRECT_URI, DRIVE_SCOPES, Some(&state));
        println!("Open this URL in your browser:\n{url}");
        println!("After approving, paste the full address of the page you land on (or the code).");
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"Redirect URL or code: ").await?;
        stdout.flush().await?;
        let params = read_manual_input(&mut BufReader::new(tokio::io::stdin())).await?;
        if let Some(error) = params.error {
            return Err(OAuthFlowError::Denied(error));
        }
        if params.state.as_deref().is_some_and(|s| s != state) {
            return Err(OAuthFlowError::StateMismatch);
        }
        let code = params.code.ok_or(OAuthFlowError::MissingCode)?;
        Ok(self.client.exchange_code(&code, MANUAL_REDIRECT_URI).await?)
    }
}

async fn accept_callback(
    listener: &TcpListener,
    expected_state: &str,
) -> Result<String, OAuthFlowError> {
    loop {
        let (mut stream, _) = listener.accept().await?;
        let mut request = vec![0u8; 8192];
        let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut request))
            .await
            .map_err(|_| OAuthFlowError::Timeout)??;
        let request_text = String::from_utf8_lossy(&request[..read]);
        let Some(params) = parse_http_request(&request_text) else {
            let _ = respond(&mut stream, "404 Not Found", "").await;
            continue;
        };

        // Browsers also ask for /favicon.ico and the like.
        if params.code.is_none() && params.error.is_none() {
            let _ = respond(&mut stream, "404 Not Found", "").await;
            continue;
        }

        if let Some(error) = params.error {
            let _ = respond(
                &mut stream,
                "200 OK",
                "<h2>Authorization was not granted</h2><p>You can close this tab.</p>",
            )
            .await;
            return Err(OAuthFlowError::Denied(error));
        }
        if params.state.as_deref() != Some(expected_state) {
            let _ = respond(&mut stream, "400 Bad Request", "<h2>State mismatch</h2>").await;
            return Err(OAuthFlowError::StateMismatch);
        }

        let _ = respond(
            &mut stream,
            "200 OK",
            "<h2>Google Drive connected</h2><p>You can return to the terminal.</p>",
        )
        .await;
        return params.code.ok_or(OAuthFlowError::MissingCode);
    }
}

async fn respond(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n<html><body>{body}</body></html>",
        body.len() + "<html><body></body></html>".len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn parse_http_request(request: &str) -> Option<CallbackParams> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let request_url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target).ok()?
    } else {
        Url::parse(&format!("http://127.0.0.1{target}")).ok()?
    };
    Some(callback_params(&request_url))
}

async fn read_manual_input<R>(reader: &mut R) -> std::io::Result<CallbackParams>
where
    R: AsyncBufRead + Unpin,
{
    let mut input = String::new();
    reader.read_line(&mut input).await?;
    Ok(parse_manual_input(&input))
}

fn parse_manual_input(input: &str) -> CallbackParams {
    let input = input.trim();
    match Url::parse(input) {
        Ok(url) if url.query().is_some() => callback_params(&url),
        _ if input.is_empty() => CallbackParams::default(),
        _ => CallbackParams {
            code: Some(input.to_string()),
            ..CallbackParams::default()
        },
    }
}

fn callback_params(url: &Url) -> CallbackParams {
    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn open_in_browser(url: &Url) -> std::io::Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(opener)
        .arg(url.as_str())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn oauth_timeout() -> Duration {
    let secs = std::env::var("GDRIVE_OAUTH_TIMEOUT_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(180);
    Duration::from_secs(secs)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
