mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flinger_lib::consts::DEFAULT_MANIFEST;
use flinger_lib::decompress::Compression;

use output::OutputFormat;

/// flinger - install store objects from a binary cache
#[derive(Parser)]
#[command(name = "flinger")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

/// Where to read the configuration from, and what to override in it.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
  /// Store object basenames to install (default: read from the manifest)
  pub basenames: Vec<String>,

  /// JSON manifest with a `flinger` section
  #[arg(short, long, default_value = DEFAULT_MANIFEST)]
  pub manifest: PathBuf,

  /// Store directory (default: $FLINGER_STORE, then /tmp/nix/store)
  #[arg(long)]
  pub store_prefix: Option<PathBuf>,

  /// Binary cache base URL (default: $FLINGER_BASE, then https://cache.nixos.org)
  #[arg(long)]
  pub base: Option<String>,

  /// Directory receiving links to installed binaries (default: ~/.local/bin)
  #[arg(long)]
  pub bin_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
  /// Install store objects with their references and link their binaries
  Install {
    #[command(flatten)]
    config: ConfigArgs,
  },

  /// Show which objects an install would download (dry-run)
  Plan {
    #[command(flatten)]
    config: ConfigArgs,
  },

  /// Unpack a local archive file into a directory
  Unpack {
    /// Archive to read
    archive: PathBuf,

    /// Destination; must not exist yet
    dest: PathBuf,

    /// Compression of the archive file (none, bzip2, xz)
    #[arg(short, long, default_value = "none")]
    compression: Compression,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Install { config } => cmd::cmd_install(config, cli.output),
    Commands::Plan { config } => cmd::cmd_plan(config, cli.output),
    Commands::Unpack {
      archive,
      dest,
      compression,
    } => cmd::cmd_unpack(&archive, &dest, compression, cli.output),
  }
}
