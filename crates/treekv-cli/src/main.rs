//! kvcli
//!
//! Command-line utility for treekv stores: copy between backends, count
//! keys, run an insert stress test and inspect individual entries.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use treekv_core::Config;

mod commands;
mod output;

use commands::bulk::InsertPlan;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "kvcli")]
#[command(about = "Utility for lightweight hierarchical KV stores")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy keys from one store to another
    #[command(alias = "cp")]
    Copy {
        /// Source store URI
        from: String,
        /// Target store URI
        to: String,
    },
    /// Count keys in a store
    Count {
        /// Store URI (defaults to default_store)
        store: Option<String>,
    },
    /// Stress test: insert random values as fast as possible
    Inserts {
        /// Store URI (defaults to default_store)
        store: Option<String>,
        /// Number of top-level prefixes
        #[arg(long, default_value_t = 1000)]
        dirs: usize,
        /// Keys written under each prefix
        #[arg(long, default_value_t = 1000)]
        per_dir: usize,
        /// Size of each random value in bytes
        #[arg(long, default_value_t = 1204)]
        size: usize,
    },
    /// Print the value of a key
    Get {
        key: String,
        /// Store URI (defaults to default_store)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Write a value (read from stdin when omitted)
    Put {
        key: String,
        value: Option<String>,
        /// Store URI (defaults to default_store)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// List the immediate children of a prefix
    Ls {
        #[arg(default_value = "")]
        prefix: String,
        /// Store URI (defaults to default_store)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// List every key under a prefix
    Tree {
        #[arg(default_value = "")]
        prefix: String,
        /// Store URI (defaults to default_store)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (default_store, cache_dir, log_level)
        key: String,
        /// Configuration value ("none" to unset)
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config, output.is_quiet());

    match cli.command {
        Commands::Copy { from, to } => {
            let source = treekv_core::open(&from)
                .with_context(|| format!("Failed to open source store '{}'", from))?;
            let mut target = treekv_core::open(&to)
                .with_context(|| format!("Failed to open target store '{}'", to))?;
            commands::bulk::copy(source.as_ref(), target.as_mut(), &output)?;
        }
        Commands::Count { store } => {
            let mut store = commands::open_store(store, &config)?;
            commands::bulk::count(store.as_ref(), &output)?;
            store.close()?;
        }
        Commands::Inserts {
            store,
            dirs,
            per_dir,
            size,
        } => {
            let mut store = commands::open_store(store, &config)?;
            let plan = InsertPlan {
                dirs,
                per_dir,
                value_size: size,
            };
            commands::bulk::inserts(store.as_mut(), plan, &output)?;
            store.close()?;
        }
        Commands::Get { key, store } => {
            let store = commands::open_store(store, &config)?;
            commands::keys::get(store.as_ref(), &key, &output)?;
        }
        Commands::Put { key, value, store } => {
            let mut store = commands::open_store(store, &config)?;
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            commands::keys::put(store.as_mut(), &key, value, &mut input, &output)?;
        }
        Commands::Ls { prefix, store } => {
            let store = commands::open_store(store, &config)?;
            commands::keys::ls(store.as_ref(), &prefix, &output)?;
        }
        Commands::Tree { prefix, store } => {
            let store = commands::open_store(store, &config)?;
            commands::keys::tree(store.as_ref(), &prefix, &output)?;
        }
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&config, &output)?,
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, &Config::config_file_path(), &output)?
            }
        },
    }

    Ok(())
}

/// Send logs to stderr, filtered by RUST_LOG or the configured level
fn init_logging(config: &Config, quiet: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "treekv_core={},kvcli={}",
            config.log_level, config.log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(!quiet)
        .with_writer(std::io::stderr)
        .try_init();
}
