//! goldbox - golden VM image builder.
//!
//! Builds reproducible golden disk images for Windows-style installation
//! media:
//! - Synthesizes unattended installation media with per-build credentials
//! - Drives an external VM build engine against it
//! - Packages and registers the resulting disk as a box

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use goldbox::commands;
use goldbox::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "goldbox")]
#[command(about = "Golden VM image builder")]
#[command(
    after_help = "QUICK START:\n  goldbox preflight        Check host tools and inputs\n  goldbox build 2022       Build (or skip if fresh) the 2022 box\n  goldbox status           Box age per version\n  goldbox clean            Remove scratch leftovers"
)]
struct Cli {
    /// Configuration document (default: $GOLDBOX_CONFIG or ./goldbox.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one version's box unless the existing one is fresh
    Build {
        /// Version tag from the configuration
        version: String,

        /// Rebuild even if the box is younger than the rebuild interval
        #[arg(long)]
        force: bool,
    },

    /// Show box age and whether a rebuild is due
    Status {
        /// Only this version
        version: Option<String>,
    },

    /// Remove stale scratch workspaces and leftover synthesized images
    Clean {
        /// Also remove output directories and packaged boxes (never credential records)
        #[arg(long)]
        all: bool,
    },

    /// Run preflight checks (verify tools and inputs before a build)
    Preflight {
        /// Fail on warnings too
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the resolved paths of one version
    Paths { version: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .or_else(|| std::env::var_os("GOLDBOX_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)
        .with_context(|| format!("Loading configuration from {}", config_path.display()))?;

    match cli.command {
        Commands::Build { version, force } => {
            commands::cmd_build(config, &version, force)?;
        }

        Commands::Status { version } => {
            commands::cmd_status(&config, version.as_deref())?;
        }

        Commands::Clean { all } => {
            commands::cmd_clean(&config, all)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Paths { version } => commands::show::ShowTarget::Paths { version },
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
