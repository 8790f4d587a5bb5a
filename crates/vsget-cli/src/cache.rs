//! Cache subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use vsget::{ExtensionId, VsixCache, DEFAULT_CACHE_MAX_SIZE_MB};

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache location, entry count and size
    Info(CacheArgs),

    /// List cached extension packages
    List(CacheArgs),

    /// Remove one extension from the cache
    Remove(RemoveArgs),

    /// Remove every extension from the cache
    Purge(CacheArgs),
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Cache directory override
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum cache size, in megabytes
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_SIZE_MB)]
    pub cache_max_size: u64,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Extension ID to remove (e.g. ms-python.python)
    pub extension: String,

    #[command(flatten)]
    pub cache: CacheArgs,
}

pub fn execute(command: CacheCommands) -> Result<i32> {
    match command {
        CacheCommands::Info(args) => info(&open(&args)?),
        CacheCommands::List(args) => list(&open(&args)?),
        CacheCommands::Remove(args) => remove(&mut open(&args.cache)?, &args.extension),
        CacheCommands::Purge(args) => purge(&mut open(&args)?),
    }
}

fn open(args: &CacheArgs) -> Result<VsixCache> {
    let cache = match &args.cache_dir {
        Some(dir) => VsixCache::open(dir, args.cache_max_size)?,
        None => VsixCache::open_default(args.cache_max_size)?,
    };
    Ok(cache)
}

fn info(cache: &VsixCache) -> Result<i32> {
    println!("Cache Location: {}", cache.directory().display());
    println!("Cached Extensions: {}", cache.len());
    println!(
        "Cache Size: {:.2} / {:.2} MB",
        cache.size_megabytes(),
        cache.max_size_mb() as f64
    );
    Ok(0)
}

fn list(cache: &VsixCache) -> Result<i32> {
    if cache.is_empty() {
        println!("No cached extensions.");
    } else {
        println!("Cache contents:\n");
        for entry in cache.entries() {
            println!(" - {entry}");
        }
    }
    Ok(0)
}

fn remove(cache: &mut VsixCache, extension: &str) -> Result<i32> {
    let extension: ExtensionId = extension.parse()?;

    if cache.remove(&extension)? {
        println!(
            "{} Removed '{extension}' from cache",
            style("Success:").green().bold()
        );
    } else {
        println!(
            "{} Extension not in cache: '{extension}'",
            style("Info:").cyan()
        );
    }
    Ok(0)
}

fn purge(cache: &mut VsixCache) -> Result<i32> {
    let count = cache.len();
    cache.purge()?;
    println!(
        "{} Extension cache purged ({count} packages removed).",
        style("Success:").green().bold()
    );
    Ok(0)
}
