mod dispatch;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bundlepush")]
#[command(about = "On-device store for over-the-air bundle updates", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
struct GlobalArgs {
    /// TOML updater config; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Use the isolated TestPackages store.
    #[arg(long, global = true)]
    test_mode: bool,
    /// Hex-encoded Ed25519 public key used to verify release signatures.
    #[arg(long, global = true)]
    public_key: Option<String>,
    #[arg(long, global = true)]
    bundle_file_name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the current and previous packages.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Download, assemble and verify a package without installing it.
    Download {
        #[arg(long)]
        hash: String,
        #[arg(long)]
        url: String,
        /// Extra release attributes as a JSON object, stored with the package.
        #[arg(long)]
        metadata: Option<String>,
    },
    Install {
        hash: String,
        /// Delete the current package instead of keeping it for rollback.
        #[arg(long)]
        discard_pending: bool,
    },
    Rollback,
    /// Delete every package and the status record.
    Clear,
    /// Recompute an installed package's content hash and signature.
    Verify { hash: String },
    /// Print the content hash of a directory.
    Hash { dir: PathBuf },
    BundlePath,
    /// Re-download the current package's bundle file in place.
    ReplaceBundle {
        #[arg(long)]
        url: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bundlepush=info")),
        )
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    dispatch::run_cli(Cli::parse())
}

#[cfg(test)]
mod tests;
