//! FerroVault - deduplicating backup and two-way sync
//!
//! Backs a directory up into a content-addressed store, restores it, and
//! reconciles two directory trees.

mod display;
mod json_output;
mod progress;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use ferrovault_config::{Config, ConfigLoader, LoggingConfig, ProviderKind, StorageSettings};
use ferrovault_crypto::{parse_key_hex, Cipher};
use ferrovault_engine::{BackupConfig, BackupPipeline, BackupStatus, Restorer};
use ferrovault_storage::{LocalStorageProvider, MockCloudProvider, StorageProvider};
use ferrovault_sync::{SyncEngine, SyncOptions};
use ferrovault_types::{Cancellable, CompressionAlgorithm, ConflictPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// FerroVault - deduplicating backup and two-way sync
#[derive(Parser)]
#[command(
    name = "ferrovault",
    version = env!("CARGO_PKG_VERSION"),
    about = "Deduplicating, encrypting backup and directory sync",
    long_about = "FerroVault stores each distinct file content once, optionally compressed\n\
                  and AES-GCM encrypted, and keeps two directory trees in sync with\n\
                  content-based conflict detection."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up a directory
    Backup {
        /// Directory to back up
        source: PathBuf,
        /// Store to write into (defaults to storage.destination)
        destination: Option<PathBuf>,
        /// Files processed concurrently (0 for one per CPU)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Hex-encoded 16 or 32 byte encryption key
        #[arg(long)]
        key_hex: Option<String>,
        /// Compression algorithm
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
        /// Compression level
        #[arg(long)]
        level: Option<u8>,
        /// Write every file even if its content is already stored
        #[arg(long)]
        no_dedup: bool,
        /// Aggregate write limit in bytes per second
        #[arg(long)]
        throttle: Option<u64>,
        /// Portion of failed files tolerated before reporting a partial failure
        #[arg(long)]
        max_failure_ratio: Option<f64>,
        /// Write into the mock cloud provider
        #[arg(long)]
        cloud: bool,
    },
    /// Restore the latest backup from a store
    Restore {
        /// Store to read from
        store: PathBuf,
        /// Directory to restore into
        destination: PathBuf,
        /// Hex-encoded encryption key used for the backup
        #[arg(long)]
        key_hex: Option<String>,
        /// Read from the mock cloud provider
        #[arg(long)]
        cloud: bool,
    },
    /// Synchronize two directories
    Sync {
        /// Source directory
        source: PathBuf,
        /// Target directory
        target: PathBuf,
        /// Conflict policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Also propagate changes from the target back to the source
        #[arg(long)]
        bidirectional: bool,
        /// Report conflicts without overwriting either side
        #[arg(long)]
        no_overwrite: bool,
        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
    },
    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Show the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
    /// Write a default configuration file
    Init {
        /// Where to write the file (.yaml, .toml or .json)
        path: PathBuf,
    },
    /// Check a configuration file
    Validate {
        /// File to check
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum AlgorithmArg {
    None,
    Zstd,
    Gzip,
}

impl From<AlgorithmArg> for CompressionAlgorithm {
    fn from(algorithm: AlgorithmArg) -> Self {
        match algorithm {
            AlgorithmArg::None => CompressionAlgorithm::None,
            AlgorithmArg::Zstd => CompressionAlgorithm::Zstd,
            AlgorithmArg::Gzip => CompressionAlgorithm::Gzip,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum PolicyArg {
    KeepNewest,
    KeepBoth,
}

impl From<PolicyArg> for ConflictPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::KeepNewest => ConflictPolicy::KeepNewest,
            PolicyArg::KeepBoth => ConflictPolicy::KeepBoth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load_default()?,
    };

    init_logging(cli.debug, cli.quiet, cli.verbose, &config.logging);
    info!("FerroVault v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Backup {
            source,
            destination,
            threads,
            key_hex,
            algorithm,
            level,
            no_dedup,
            throttle,
            max_failure_ratio,
            cloud,
        } => {
            let mut settings = config.backup.clone();
            if let Some(threads) = threads {
                settings.parallelism = if threads == 0 { num_cpus::get() } else { threads };
            }
            if key_hex.is_some() {
                settings.encryption_key = key_hex;
            }
            if let Some(algorithm) = algorithm {
                let algorithm = CompressionAlgorithm::from(algorithm);
                settings.compress = algorithm != CompressionAlgorithm::None;
                settings.compression_algorithm = algorithm;
                settings.compression_level = algorithm.default_level();
            }
            if let Some(level) = level {
                settings.compression_level = level;
            }
            if no_dedup {
                settings.deduplicate = false;
            }
            if let Some(throttle) = throttle {
                settings.throttle_bytes_per_sec = throttle;
            }
            if let Some(ratio) = max_failure_ratio {
                settings.max_failure_ratio = ratio;
            }

            let destination = destination
                .or_else(|| config.storage.destination.clone())
                .context("no destination given and storage.destination is not set")?;
            let backup_config = BackupConfig::from_settings(&source, &destination, &settings)?;
            let provider = open_provider(&config.storage, &destination, cloud)?;

            backup_command(provider, backup_config, cli.quiet, cli.json).await?;
        }
        Commands::Restore {
            store,
            destination,
            key_hex,
            cloud,
        } => {
            let key_hex = key_hex.or_else(|| config.backup.encryption_key.clone());
            let cipher = key_hex
                .map(|hex| parse_key_hex(&hex).and_then(|key| Cipher::new(&key)))
                .transpose()?;
            let provider = open_provider(&config.storage, &store, cloud)?;

            restore_command(provider, cipher, &destination, cli.quiet, cli.json).await?;
        }
        Commands::Sync {
            source,
            target,
            policy,
            bidirectional,
            no_overwrite,
            dry_run,
        } => {
            let mut options = SyncOptions::from_settings(&config.sync);
            if let Some(policy) = policy {
                options.conflict_policy = policy.into();
            }
            options.bidirectional |= bidirectional;
            options.overwrite_newer &= !no_overwrite;
            options.dry_run |= dry_run;

            sync_command(&source, &target, &options, cli.quiet, cli.json).await?;
        }
        Commands::Config { action } => {
            config_command(action, &config)?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool, quiet: bool, verbose: bool, logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(logging.colored_output);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_provider(
    storage: &StorageSettings,
    root: &Path,
    force_cloud: bool,
) -> Result<Arc<dyn StorageProvider>> {
    let provider: Arc<dyn StorageProvider> =
        if force_cloud || storage.provider == ProviderKind::MockCloud {
            Arc::new(
                MockCloudProvider::new(root)?
                    .with_latency(Duration::from_millis(storage.cloud_latency_ms)),
            )
        } else {
            Arc::new(LocalStorageProvider::new(root)?)
        };
    Ok(provider)
}

async fn backup_command(
    provider: Arc<dyn StorageProvider>,
    config: BackupConfig,
    quiet: bool,
    json: bool,
) -> Result<()> {
    let show_progress = !quiet && !json;
    if show_progress {
        println!(
            "{} Backing up {} into {} ({})",
            style("→").green().bold(),
            style(config.source().display()).cyan(),
            style(config.destination().display()).cyan(),
            provider.name()
        );
    }

    let listener = Arc::new(progress::CliProgress::new(!show_progress));
    let pipeline = BackupPipeline::new(provider).with_listener(listener.clone());
    let handle = pipeline.execute(config);

    let token = handle.token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let result = handle.wait().await;
    interrupt.abort();
    listener.finish_and_clear();

    if json {
        json_output::print_json("backup", &result)?;
    } else if !quiet {
        display::print_backup_result(&result);
    }

    match result.status {
        BackupStatus::Success => {
            if !quiet && !json {
                display::display_success(&result.message);
            }
            Ok(())
        }
        status => bail!("backup finished with status '{}': {}", status, result.message),
    }
}

async fn restore_command(
    provider: Arc<dyn StorageProvider>,
    cipher: Option<Cipher>,
    destination: &Path,
    quiet: bool,
    json: bool,
) -> Result<()> {
    if !quiet && !json {
        println!(
            "{} Restoring from '{}' into {}",
            style("←").green().bold(),
            provider.name(),
            style(destination.display()).cyan()
        );
    }

    let result = Restorer::new(provider, cipher)
        .restore_tree(destination)
        .await?;

    if json {
        json_output::print_json("restore", &result)?;
    } else if !quiet {
        display::print_restore_result(&result);
    }

    if !result.is_success() {
        bail!("{} files could not be restored", result.failures.len());
    }
    Ok(())
}

async fn sync_command(
    source: &Path,
    target: &Path,
    options: &SyncOptions,
    quiet: bool,
    json: bool,
) -> Result<()> {
    if !quiet && !json {
        println!(
            "{} Synchronizing {} with {}",
            style("⟲").blue().bold(),
            style(source.display()).cyan(),
            style(target.display()).cyan()
        );
        if options.dry_run {
            display::display_info("Dry run mode - no changes will be made");
        }
    }

    let result = SyncEngine::new().synchronize(source, target, options).await?;

    if json {
        json_output::print_json("sync", &result)?;
    } else if !quiet {
        display::print_sync_result(&result);
    }

    if result.errors_count > 0 {
        bail!("{} files could not be synchronized", result.errors_count);
    }
    Ok(())
}

fn config_command(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { default } => {
            let shown = if default { Config::default() } else { config.clone() };
            let title = if default {
                "Default configuration:"
            } else {
                "Current configuration:"
            };
            println!("{} {}", style("⚙").blue().bold(), title);
            print!("{}", serde_yaml::to_string(&shown)?);
        }
        ConfigAction::Init { path } => {
            ConfigLoader::generate_default_config(&path)?;
            display::display_success(&format!("Wrote {}", path.display()));
        }
        ConfigAction::Validate { path } => {
            ConfigLoader::validate_file(&path)?;
            display::display_success(&format!("{} is valid", path.display()));
        }
    }
    Ok(())
}
