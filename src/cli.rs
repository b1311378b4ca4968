use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hoard")]
#[command(about = "Fingerprint, deduplicate, classify and index files", long_about = None)]
pub struct Cli {
    /// Configuration file; discovered in the platform configuration
    /// directory when omitted.
    #[arg(short, long, env = "HOARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk and fingerprint a directory tree, then print the load status.
    Load { source: PathBuf },
    /// Copy every distinct file of a directory tree into the store.
    Store { source: PathBuf },
    /// Print the classification of every file of a directory tree, one JSON
    /// object per line.
    Classify { source: PathBuf },
    /// Record every file of a directory tree in the index.
    Index { source: PathBuf },
    /// Symlink pending index entries into `target`.
    Organize {
        target: PathBuf,
        /// Stop after linking this many gibibytes.
        #[arg(long)]
        limit_gb: Option<u64>,
    },
}
