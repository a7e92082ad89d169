use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use docsync_classifier::{ChangeClassifier, Verdict};
use docsync_core::{ChangeKind, ConfigManager, DocSyncConfig, Priority, SyncTransport};
use docsync_daemon::{init_logging, transport, LogTransport, SyncDaemon};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "docsync",
    version,
    author,
    about = "DocSync - watch a project and sync documentation-relevant changes",
    long_about = "DocSync watches a project directory, classifies each change by how much it matters \
                  for documentation, and delivers the important ones in prioritized batches."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Watch a directory and sync changes until Ctrl+C")]
    Watch {
        #[arg(help = "Directory to watch (defaults to config or current directory)")]
        root: Option<PathBuf>,

        #[arg(long, help = "HTTP endpoint receiving change batches")]
        endpoint: Option<String>,

        #[arg(long, help = "Log batches instead of sending them")]
        dry_run: bool,
    },

    #[command(about = "Classify files as if they had just been edited")]
    Classify {
        #[arg(required = true, help = "Files to classify")]
        files: Vec<PathBuf>,

        #[arg(long, help = "Project root used for directory rules")]
        root: Option<PathBuf>,

        #[arg(long, help = "Treat files as newly created instead of edited")]
        created: bool,

        #[arg(long, help = "Print kept changes as JSON")]
        json: bool,
    },

    #[command(about = "Write a default configuration file")]
    InitConfig {
        #[arg(default_value = ".docsync.toml", help = "Where to write the file")]
        path: PathBuf,

        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path, force } = &cli.command {
        return handle_init_config(path, *force);
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    let config = manager.into_config();

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Watch {
            root,
            endpoint,
            dry_run,
        } => handle_watch(config, root, endpoint, dry_run).await,
        Commands::Classify {
            files,
            root,
            created,
            json,
        } => handle_classify(&config, files, root, created, json).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

async fn handle_watch(
    mut config: DocSyncConfig,
    root: Option<PathBuf>,
    endpoint: Option<String>,
    dry_run: bool,
) -> Result<()> {
    if let Some(root) = root {
        config.sync.root = Some(root);
    }
    if endpoint.is_some() {
        config.transport.endpoint = endpoint;
    }

    let sink: Arc<dyn SyncTransport> = if dry_run {
        Arc::new(LogTransport)
    } else {
        transport::from_config(&config.transport)
    };

    let root = config.sync.root_or_cwd();
    println!("{} {}", "👀 Watching".green().bold(), root.display());
    println!(
        "   {} {}ms, batches of {}, {} retries",
        "Sync delay:".cyan(),
        config.sync.sync_delay_ms,
        config.sync.batch_size,
        config.sync.max_retries
    );
    match config.transport.endpoint.as_deref() {
        Some(endpoint) if !dry_run => println!("   {} {}", "Endpoint:".cyan(), endpoint),
        _ => println!("   {}", "Dry run: batches are only logged".yellow()),
    }
    println!("   Press Ctrl+C to stop");

    let mut daemon = SyncDaemon::new(config, sink);
    daemon.start().await?;

    let status = daemon.status().await;
    println!();
    println!("{}", "Session summary".bold());
    println!(
        "   {} batches captured, {} changes classified, {} suppressed, {} unreadable",
        status.metrics.batches_captured,
        status.metrics.changes_classified,
        status.metrics.changes_suppressed,
        status.metrics.read_errors
    );
    println!(
        "   {} synced, {} failed, {} still pending",
        status.queue.history_count - status.queue.failed_count,
        status.queue.failed_count,
        status.queue.pending_count
    );
    Ok(())
}

async fn handle_classify(
    config: &DocSyncConfig,
    files: Vec<PathBuf>,
    root: Option<PathBuf>,
    created: bool,
    json: bool,
) -> Result<()> {
    let root = root.unwrap_or_else(|| config.sync.root_or_cwd());
    let classifier = ChangeClassifier::new(config.classifier.clone()).with_root(&root);
    let kind = if created {
        ChangeKind::Create
    } else {
        ChangeKind::Change
    };

    let mut kept = Vec::new();
    for file in files {
        let path = if file.is_absolute() {
            file
        } else {
            root.join(file)
        };

        match classifier.classify_path(&path, kind).await {
            Verdict::Keep(mut change) => {
                if !json {
                    let priority = match change.priority {
                        Priority::High => "high".red().bold(),
                        Priority::Medium => "medium".yellow().bold(),
                        Priority::Low => "low".normal(),
                    };
                    let language = change
                        .language
                        .as_ref()
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{:<8} {} ({}{})",
                        priority,
                        path.display(),
                        language,
                        if change.has_documentation { ", documented" } else { "" }
                    );
                }
                change.content = None;
                kept.push(change);
            }
            Verdict::Suppressed => {
                if !json {
                    println!("{:<8} {}", "skip".dimmed(), path.display());
                }
            }
            Verdict::Skipped => {
                if !json {
                    println!("{:<8} {}", "error".red(), path.display());
                }
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&kept)?);
    }
    Ok(())
}

fn handle_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ConfigManager::create_default_config(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "✓ Wrote".green(), path.display());
    Ok(())
}
