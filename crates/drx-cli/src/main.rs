// SPDX-License-Identifier: MIT OR Apache-2.0
//! `drx` — duty-recon command line.

#![deny(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use drx_config::ReconConfig;
use drx_core::{Broker, DutyResult, Format, Mawb, Sections};
use drx_input::parse_batch_input;
use drx_retry::RetryPolicy;
use drx_runtime::{BatchOrchestrator, BatchRequest, RunObserver};
use drx_session::browser::ChromiumLoginDriver;
use drx_session::{SessionManager, SessionStore};
use drx_store::{
    ArtifactGateway, ArtifactKeys, MemoryResultStore, ResultStore, RetryingResultStore, S3Store,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "drx", version, about = "Duty reconciliation against the brokerage portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Optional TOML config overlay (environment is the default source).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a pasted MAWB list and print the recognized items.
    Parse {
        /// Input file, `-` for stdin.
        #[arg(long, default_value = "-")]
        input: String,
    },

    /// Run a reconciliation batch.
    Run {
        /// Input file with the MAWB list, `-` for stdin.
        #[arg(long, default_value = "-")]
        input: String,

        /// Broker credentials JSON file.
        #[arg(long)]
        broker: PathBuf,

        /// Format definition JSON file (template payload included).
        #[arg(long)]
        format: PathBuf,

        /// Skip the AMS section.
        #[arg(long)]
        skip_ams: bool,

        /// Skip the Entries section (still runs if a later section needs it).
        #[arg(long)]
        skip_entries: bool,

        /// Skip the Custom Report section.
        #[arg(long)]
        skip_custom: bool,

        /// Also download, compress, and upload the 7501 batch PDF.
        #[arg(long)]
        download_pdf: bool,

        /// Write results JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Deep-audit one MAWB's entries: house counts and per-entry duty from
    /// the detail pages. Diagnostic; does not touch stored results.
    AuditEntries {
        /// MAWB to audit.
        #[arg(long)]
        mawb: String,

        /// Broker credentials JSON file.
        #[arg(long)]
        broker: PathBuf,
    },

    /// Manage saved broker sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Delete one broker's saved session.
    Delete {
        /// Broker id whose session to delete.
        #[arg(long)]
        broker_id: Uuid,
    },
    /// Delete every saved session.
    Clear,
}

/// Streams batch progress and logs to stderr.
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_log(&self, mawb: &Mawb, message: &str) {
        eprintln!("[{}] {message}", mawb.formatted());
    }

    fn on_progress(&self, message: &str, percent: u8) {
        eprintln!("[{percent:>3}%] {message}");
    }

    fn on_result(&self, result: &DutyResult) {
        eprintln!(
            "[done] {} -> {:?}{}",
            result.mawb.formatted(),
            result.status,
            result
                .error_message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default()
        );
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Parse { input } => {
            let text = read_input(&input)?;
            let items = parse_batch_input(&text);
            println!("{}", serde_json::to_string_pretty(&items)?);
            eprintln!("{} item(s) recognized", items.len());
            Ok(())
        }

        Commands::Run {
            input,
            broker,
            format,
            skip_ams,
            skip_entries,
            skip_custom,
            download_pdf,
            out,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let text = read_input(&input)?;
            let items = parse_batch_input(&text);
            if items.is_empty() {
                bail!("no parseable MAWB lines in input");
            }

            let broker: Broker = read_json(&broker).context("read broker file")?;
            let format: Format = read_json(&format).context("read format file")?;
            let sections = Sections {
                ams: !skip_ams,
                entries: !skip_entries,
                custom: !skip_custom,
                download_7501_pdf: download_pdf,
            };

            let sessions = session_manager(&config)?;
            let gateway = ArtifactGateway::new(
                S3Store::from_config(&config.storage),
                ArtifactKeys::new(config.storage.prefix.clone()),
                Duration::from_secs(config.storage.presign_ttl_secs),
            );
            let results = RetryingResultStore::new(MemoryResultStore::new(), RetryPolicy::default());

            let orchestrator = BatchOrchestrator::new(
                sessions,
                gateway,
                results,
                config.portal.clone(),
                RetryPolicy::default(),
                Arc::new(ConsoleObserver),
            );

            let request = BatchRequest {
                broker,
                format,
                sections,
                items,
            };
            let results = orchestrator.run(&request).await;

            let rows = orchestrator.results().list().await?;
            let json = serde_json::to_string_pretty(&rows)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("write results to {}", path.display()))?;
                    eprintln!("results written to {}", path.display());
                }
                None => println!("{json}"),
            }

            let failed = results
                .iter()
                .filter(|r| r.status == drx_core::ResultStatus::Failed)
                .count();
            eprintln!("{} processed, {failed} failed", results.len());
            Ok(())
        }

        Commands::AuditEntries { mawb, broker } => {
            let config = load_config(cli.config.as_deref())?;
            let mawb = Mawb::parse(&mawb).context("invalid MAWB")?;
            let broker: Broker = read_json(&broker).context("read broker file")?;

            let sessions = session_manager(&config)?;
            let session = sessions.acquire(&broker).await?;
            let portal = drx_portal::PortalClient::new(
                config.portal.base_url.clone(),
                &session,
                config.portal.timeouts.clone(),
                RetryPolicy::default(),
            )?;

            let index = drx_portal::entries::search(&portal, &mawb).await?;
            if index.not_found {
                bail!("no entries found for {}", mawb.formatted());
            }
            let totals = drx_portal::entries::scrape_details(&portal, &index).await;
            println!(
                "{}",
                serde_json::json!({
                    "mawb": mawb.as_digits(),
                    "entries": index.rows.len(),
                    "oldest_entry_date": index.oldest_entry_date.map(drx_core::dates::format_mmddyy),
                    "houses": totals.houses,
                    "duty": totals.duty,
                    "detail_failures": totals.detail_failures,
                    "duty_failures": totals.duty_failures,
                })
            );
            Ok(())
        }

        Commands::Sessions { action } => {
            let config = load_config(cli.config.as_deref())?;
            let store = SessionStore::new(&config.sessions_dir)?;
            match action {
                SessionAction::Delete { broker_id } => {
                    if store.delete(broker_id) {
                        eprintln!("session for {broker_id} deleted");
                    } else {
                        eprintln!("no session for {broker_id}");
                    }
                }
                SessionAction::Clear => {
                    let removed = store.clear_all();
                    eprintln!("{removed} session(s) removed");
                }
            }
            Ok(())
        }
    }
}

fn session_manager(config: &ReconConfig) -> Result<SessionManager<ChromiumLoginDriver>> {
    let store = SessionStore::new(&config.sessions_dir)?;
    let driver = ChromiumLoginDriver::new(config.portal.base_url.clone());
    Ok(SessionManager::new(
        store,
        driver,
        config.portal.base_url.clone(),
        config.portal.timeouts.probe(),
    ))
}

fn load_config(overlay: Option<&Path>) -> Result<ReconConfig> {
    let config = match overlay {
        Some(path) => ReconConfig::from_toml(path)?,
        None => ReconConfig::from_env().context("load configuration from environment")?,
    };
    for warning in config.validate()? {
        tracing::warn!(target: "drx.cli", %warning, "configuration warning");
    }
    Ok(config)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("read input file {input}"))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}
