//! cfgsync CLI - keep local configuration files in sync with remote stores
//!
//! This is the main entry point for the cfgsync command-line interface.

mod cli;
mod commands;
mod output;
mod prompt;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs a process-wide crypto provider before any TLS use
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let global = commands::GlobalArgs {
        catalog: cli.catalog,
        settings: cli.settings,
    };

    match cli.command {
        Commands::Push(args) => commands::push::run(args, &global).await,
        Commands::Pull(args) => commands::pull::run(args, &global).await,
        Commands::Purge(args) => commands::purge::run(args, &global).await,
        Commands::Stores => commands::stores::run(&global),
        Commands::List => commands::list::run(&global),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Progress goes through `output`; logs only surface problems by default
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
