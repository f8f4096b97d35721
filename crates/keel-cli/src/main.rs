//! Keel - chart repository and release manager
//!
//! Usage:
//!   keel repo add NAME URL   # Register a chart repository
//!   keel repo list           # Show registered repositories

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keel_core::config::{KeelSettings, SettingsStore, paths};
use keel_core::projector::{RepositoryView, project_repository};
use keel_core::repository::{CancelToken, HttpIndexFetcher, RepositoryEntry, RepositoryRegistrar};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Chart repository and release manager", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/keel/keel.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage chart repositories
    Repo(RepoArgs),
}

#[derive(Args)]
struct RepoArgs {
    #[command(subcommand)]
    command: RepoSubcommand,
}

#[derive(Subcommand)]
enum RepoSubcommand {
    /// Add a chart repository, or update it with --force-update
    Add {
        /// Repository name
        name: String,
        /// Repository URL
        url: String,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        /// Client certificate for TLS authentication
        #[arg(long, requires = "key_file")]
        cert_file: Option<PathBuf>,

        /// Client key for TLS authentication
        #[arg(long, requires = "cert_file")]
        key_file: Option<PathBuf>,

        /// CA bundle used to verify the repository
        #[arg(long)]
        ca_file: Option<PathBuf>,

        /// Skip TLS certificate checks
        #[arg(long)]
        insecure_skip_tls_verify: bool,

        /// Replace an existing entry of the same name
        #[arg(long)]
        force_update: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List chart repositories
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings_store = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::with_defaults()?,
    };
    let settings = settings_store.load()?;
    tracing::debug!(path = %settings_store.path().display(), "loaded settings");

    match cli.command {
        Commands::Repo(args) => run_repo(args, &settings),
    }
}

fn registrar(settings: &KeelSettings) -> Result<RepositoryRegistrar> {
    let config_dir = paths::default_config_dir()?;
    let cache_dir = paths::default_cache_dir()?;

    let fetcher =
        HttpIndexFetcher::new().with_cache_dir(paths::repository_cache(settings, &cache_dir));
    Ok(RepositoryRegistrar::new(
        paths::repository_file(settings, &config_dir),
        Arc::new(fetcher),
    )
    .with_lock_policy(settings.lock_policy()))
}

fn run_repo(args: RepoArgs, settings: &KeelSettings) -> Result<()> {
    let registrar = registrar(settings)?;

    match args.command {
        RepoSubcommand::Add {
            name,
            url,
            username,
            password,
            cert_file,
            key_file,
            ca_file,
            insecure_skip_tls_verify,
            force_update,
            format,
        } => {
            let mut entry = RepositoryEntry::new(name, url)
                .with_insecure_skip_tls_verify(insecure_skip_tls_verify);
            entry.username = username;
            entry.password = password;
            entry.cert_file = cert_file;
            entry.key_file = key_file;
            entry.ca_file = ca_file;

            let result = registrar.add(entry, force_update, &CancelToken::new());

            match format {
                OutputFormat::Json => {
                    let outcome = project_repository(&result);
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                    if let Err(e) = result {
                        return Err(e.into());
                    }
                }
                OutputFormat::Table => {
                    let added = result?;
                    println!("\"{}\" has been added to your repositories", added.name);
                }
            }
        }
        RepoSubcommand::List { format } => {
            let entries = registrar.list()?;
            let views: Vec<RepositoryView> = entries.iter().map(RepositoryView::from).collect();

            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&views)
                        .context("Failed to serialize repositories")?;
                    println!("{}", json);
                }
                OutputFormat::Table => {
                    if views.is_empty() {
                        println!("No repositories configured.");
                        println!("Add one with: keel repo add <name> <url>");
                        return Ok(());
                    }
                    let width = views.iter().map(|v| v.name.len()).max().unwrap_or(4).max(4);
                    println!("{:<width$}  URL", "NAME", width = width);
                    for view in views {
                        println!("{:<width$}  {}", view.name, view.url, width = width);
                    }
                }
            }
        }
    }
    Ok(())
}
