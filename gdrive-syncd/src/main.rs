use std::path::{Path, PathBuf};

use anyhow::Context;
use gdrive_syncd::config::{AppConfig, DEFAULT_CONFIG_PATH};
use gdrive_syncd::logging;
use gdrive_syncd::session::DriveSession;
use gdrive_syncd::storage::TokenStorage;
use gdrive_syncd::sync::{SyncReport, SyncWalker};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run { config: Option<PathBuf>, wait: bool },
    Logout { config: Option<PathBuf> },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut wait = true;
    let mut logout = false;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config = Some(PathBuf::from(value));
            }
            "--no-wait" => wait = false,
            "--logout" => logout = true,
            "--help" | "-h" => return Ok(CliMode::Help),
            other => match other.strip_prefix("--config=") {
                Some(value) if !value.is_empty() => config = Some(PathBuf::from(value)),
                _ => anyhow::bail!("unknown argument: {other}"),
            },
        }
    }
    Ok(if logout {
        CliMode::Logout { config }
    } else {
        CliMode::Run { config, wait }
    })
}

fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("GDRIVE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let path = config_path(explicit);
    AppConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: gdrive-syncd [--config <path>] [--no-wait] [--logout]");
            println!("  --config <path>  Config file (default: $GDRIVE_CONFIG or config.json)");
            println!("  --no-wait        Exit without waiting for Enter");
            println!("  --logout         Remove saved OAuth token and exit");
            Ok(())
        }
        CliMode::Logout { config } => {
            let config = load_config(config)?;
            TokenStorage::new(&config.token_path)
                .delete_token()
                .context("failed to remove saved token")?;
            tracing::info!("saved token removed: {}", config.token_path.display());
            Ok(())
        }
        CliMode::Run { config, wait } => {
            let config = load_config(config)?;
            run(&config).await?;
            if wait {
                wait_for_enter().await?;
            }
            Ok(())
        }
    }
}

async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let session = DriveSession::bootstrap(config)
        .await
        .context("failed to authorize with Google Drive")?;
    let walker = SyncWalker::new(session, config.comparison_offset)
        .with_download_retries(config.download_retries);

    let mut total = SyncReport::default();
    for folder_id in &config.folder_ids {
        tracing::info!(folder_id, "syncing into {}", config.save_root.display());
        match walker.sync(folder_id, &config.save_root).await {
            Ok(report) => {
                log_report(folder_id, &config.save_root, &report);
                total.merge(report);
            }
            Err(err) => tracing::error!(folder_id, "sync failed: {err}"),
        }
    }

    if config.folder_ids.len() > 1 {
        log_report("all folders", &config.save_root, &total);
    }
    Ok(())
}

fn log_report(label: &str, root: &Path, report: &SyncReport) {
    tracing::info!(
        folders = report.folders_visited,
        empty = report.empty_folders,
        downloaded = report.downloaded,
        bytes = report.bytes_downloaded,
        up_to_date = report.up_to_date,
        failed = report.file_failures.len() + report.folder_failures.len(),
        "{label} synced into {}",
        root.display()
    );
    for failure in report.folder_failures.iter().chain(&report.file_failures) {
        tracing::warn!("{}: {}", failure.path.display(), failure.failure);
    }
}

async fn wait_for_enter() -> anyhow::Result<()> {
    println!("Press Enter to exit.");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read stdin")?;
    Ok(())
}
