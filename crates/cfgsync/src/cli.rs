//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// cfgsync - keep local configuration files in sync with remote stores
#[derive(Parser, Debug)]
#[command(name = "cfgsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the catalog file (defaults to .cfgsync.yml)
    #[arg(long, global = true)]
    pub catalog: Option<Utf8PathBuf>,

    /// Path to the settings file (defaults to ~/.cfgsync/config.yaml)
    #[arg(long, global = true)]
    pub settings: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push local files to their remote stores
    Push(PushArgs),

    /// Pull files from their remote stores
    Pull(PullArgs),

    /// Delete remote content and stop tracking files
    Purge(PurgeArgs),

    /// List available stores
    Stores,

    /// List tracked files
    List,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Files to push; every tracked file when omitted
    pub paths: Vec<String>,

    /// Store to use for files pushed for the first time
    #[arg(long)]
    pub store: Option<String>,

    /// Version label for stores that keep versions
    #[arg(long)]
    pub version: Option<String>,

    /// Fail instead of asking for missing values
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Files to pull; every tracked file when omitted
    pub paths: Vec<String>,

    /// Version label to pull
    #[arg(long)]
    pub version: Option<String>,

    /// Fail instead of asking for missing values
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Files to purge; every tracked file when omitted
    pub paths: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
