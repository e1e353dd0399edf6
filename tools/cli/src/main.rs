//! gembasync CLI - keep a local folder in sync with the Gemba files posted in Epicor.

mod config;
mod serve;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gembasync_common::{FileName, VersionId};
use gembasync_storage::{CatalogProvider, CatalogPublisher, EpicorProvider};
use gembasync_sync::{select_newest, SyncConfig, SyncEngine, SyncReport, SyncScheduler};

use config::{AppConfig, ConnectionArgs, PathArgs};

#[derive(Parser)]
#[command(name = "gembasync")]
#[command(about = "gembasync - Epicor Gemba file synchronization")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: <config dir>/gembasync/config.json).
    #[arg(short, long, global = true, env = "GEMBASYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every new or updated file once.
    Sync,

    /// Show what a sync would do without downloading anything.
    Status,

    /// Sync periodically until interrupted.
    Watch {
        /// Seconds between runs.
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
    },

    /// List the remote catalog.
    List {
        /// Show every posted version instead of only the newest per name.
        #[arg(short, long)]
        all: bool,
    },

    /// Post a file as the newest version of its name.
    Publish {
        /// File to upload.
        path: PathBuf,

        /// Name to post under (default: the file's name).
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Remove a posted version from the catalog.
    Retire {
        /// Version id (SysID) to retire.
        version_id: String,

        /// Also delete the stored file content.
        #[arg(long)]
        purge: bool,
    },

    /// Serve the synchronized files and manifest over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Directory served for all other paths (dashboard pages).
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "gembasync", &mut std::io::stdout());
        return Ok(());
    }

    // Setup logging; RUST_LOG wins over --verbose.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let app_config = AppConfig::load(cli.config.as_deref())?;
    let sync_config = app_config.sync(&cli.paths);

    match cli.command {
        Commands::Serve { bind, root } => {
            let app = serve::router(
                &sync_config.manifest_path,
                &sync_config.output_dir,
                root.as_deref(),
            );
            serve::serve(bind, app).await
        }
        command => {
            let epicor = app_config
                .epicor(&cli.connection)
                .context("Incomplete Epicor connection settings")?;
            let provider = Arc::new(EpicorProvider::new(&epicor)?);
            info!("Using {} for company {}", epicor.domain, epicor.company_id);

            match command {
                Commands::Sync => cmd_sync(provider, sync_config).await,
                Commands::Status => cmd_status(provider, sync_config).await,
                Commands::Watch { interval } => {
                    cmd_watch(provider, sync_config, Duration::from_secs(interval.max(1))).await
                }
                Commands::List { all } => cmd_list(provider.as_ref(), all).await,
                Commands::Publish { path, name } => {
                    cmd_publish(provider.as_ref(), &path, name).await
                }
                Commands::Retire { version_id, purge } => {
                    cmd_retire(provider.as_ref(), &version_id, purge).await
                }
                Commands::Serve { .. } | Commands::Completions { .. } => Ok(()),
            }
        }
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Sync completed in {:.1}s: {} unchanged, {} updated, {} new, {} failed, {} dropped",
        report.duration.as_secs_f64(),
        report.unchanged,
        report.updated,
        report.new,
        report.failed,
        report.dropped
    );
    for failure in &report.failures {
        println!("  [FAILED] {} ({}): {}", failure.name, failure.version_id, failure.reason);
    }
}

/// Run one sync.
async fn cmd_sync(provider: Arc<EpicorProvider>, config: SyncConfig) -> Result<()> {
    let engine = SyncEngine::from_arc(provider, config);
    let report = engine.run().await.context("Sync failed")?;
    print_report(&report);
    Ok(())
}

/// Show the pending plan.
async fn cmd_status(provider: Arc<EpicorProvider>, config: SyncConfig) -> Result<()> {
    let engine = SyncEngine::from_arc(provider, config);
    let plan = engine.plan().await.context("Failed to compute sync plan")?;

    println!("Up to date: {}", plan.unchanged.len());

    if !plan.to_fetch_update.is_empty() {
        println!("To update:");
        for record in &plan.to_fetch_update {
            println!("  {} -> {} (posted {})", record.name, record.version_id, record.posted_at);
        }
    }
    if !plan.to_fetch_new.is_empty() {
        println!("New:");
        for record in &plan.to_fetch_new {
            println!("  {} -> {} (posted {})", record.name, record.version_id, record.posted_at);
        }
    }
    if !plan.dropped.is_empty() {
        println!("No longer in catalog:");
        for entry in &plan.dropped {
            println!("  {} ({})", entry.name, entry.version_id);
        }
    }
    if plan.is_current() {
        println!("Nothing to download.");
    }

    Ok(())
}

/// Sync every `interval` until Ctrl-C. Enter on stdin syncs immediately.
async fn cmd_watch(
    provider: Arc<EpicorProvider>,
    config: SyncConfig,
    interval: Duration,
) -> Result<()> {
    let engine = Arc::new(SyncEngine::from_arc(provider, config));
    let (scheduler, handle) = SyncScheduler::new(Some(interval));

    let task = tokio::spawn(handle.run(move || {
        let engine = engine.clone();
        async move { engine.run().await }
    }));

    info!("Watching every {:?}; press Enter to sync now, Ctrl-C to stop", interval);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => match scheduler.request_sync().await {
                    Ok(report) => print_report(&report),
                    Err(e) => error!("Sync failed: {}", e),
                },
                // Detached from a terminal: only the timer and Ctrl-C remain.
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    scheduler.shutdown().await;
    task.await.context("Scheduler task failed")?;
    Ok(())
}

/// List the catalog.
async fn cmd_list(provider: &EpicorProvider, all: bool) -> Result<()> {
    let mut records = provider
        .fetch_catalog()
        .await
        .context("Failed to fetch catalog")?;

    if !all {
        records = select_newest(&records).into_values().collect();
    } else {
        records.sort_by(|a, b| a.name.cmp(&b.name).then(b.posted_at.cmp(&a.posted_at)));
    }

    if records.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }

    for record in &records {
        println!(
            "  {}  {}  {}",
            record.posted_at.format("%Y-%m-%d %H:%M:%S"),
            record.version_id,
            record.name
        );
    }
    println!("{} record(s)", records.len());

    Ok(())
}

/// Upload a file as a new version.
async fn cmd_publish(provider: &EpicorProvider, path: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Cannot derive a name from the path; use --name")?,
    };

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let size = data.len();

    let record = provider
        .publish(&FileName::new(name), data)
        .await
        .context("Failed to publish file")?;

    println!(
        "Published {} as {} ({} bytes, posted {})",
        record.name, record.version_id, size, record.posted_at
    );
    Ok(())
}

/// Retire a posted version.
async fn cmd_retire(provider: &EpicorProvider, version_id: &str, purge: bool) -> Result<()> {
    let version_id = VersionId::new(version_id).context("Invalid version id")?;

    let catalog = provider
        .fetch_catalog()
        .await
        .context("Failed to fetch catalog")?;
    let record = catalog
        .into_iter()
        .find(|r| r.version_id == version_id)
        .with_context(|| format!("Version {} is not in the catalog", version_id))?;

    provider
        .retire(&record)
        .await
        .context("Failed to retire version")?;
    println!("Retired {} ({})", record.name, record.version_id);

    if purge {
        provider
            .purge_content(&version_id)
            .await
            .context("Failed to delete stored content")?;
        println!("Deleted stored content of {}", version_id);
    }

    Ok(())
}
