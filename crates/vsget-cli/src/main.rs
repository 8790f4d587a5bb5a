//! `vsget` — download VSIX bundles for offline extension installation.

mod bundle;
mod cache;
mod download;

use clap::{Parser, Subcommand};
use console::style;

#[derive(Parser, Debug)]
#[command(
    name = "vsget",
    version,
    about = "Download VSIX bundles for offline extension installation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download one extension or a spec-file batch
    Download(download::DownloadArgs),

    /// Inspect and manage the local VSIX cache
    #[command(subcommand)]
    Cache(cache::CacheCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Download(args) => download::execute(args).await,
        Commands::Cache(command) => cache::execute(command),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            std::process::exit(1);
        }
    }
}
