//! Download command.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use vsget::{specfile, Downloader, ExtensionId, GalleryClient, VsixCache, DEFAULT_CACHE_MAX_SIZE_MB};

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Single extension by ID (e.g. ms-python.python)
    #[arg(conflicts_with = "spec_file")]
    pub extension: Option<String>,

    /// JSON-specified collection of extensions
    #[arg(short, long)]
    pub spec_file: Option<PathBuf>,

    /// Download directory
    #[arg(short, long, default_value = "./vsix")]
    pub out_dir: PathBuf,

    /// Do not trace extension dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Zip the downloaded extension(s)
    #[arg(short, long)]
    pub zip: bool,

    /// Do not consult or populate the local VSIX cache
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory override
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum cache size, in megabytes
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_SIZE_MB)]
    pub cache_max_size: u64,
}

pub async fn execute(args: DownloadArgs) -> Result<i32> {
    let seed = match (&args.extension, &args.spec_file) {
        (Some(extension), None) => vec![extension.parse::<ExtensionId>()?],
        (None, Some(spec_file)) => specfile::load_spec_file(spec_file)?,
        _ => bail!("Specify an extension ID or a spec file (see --help)"),
    };

    if seed.is_empty() {
        println!("{} Nothing to download.", style("Info:").cyan());
        return Ok(0);
    }
    log::debug!("Seeding batch with {} extension(s)", seed.len());

    fs::create_dir_all(&args.out_dir).with_context(|| {
        format!(
            "Could not create output directory '{}'",
            args.out_dir.display()
        )
    })?;

    let registry = GalleryClient::new()?;
    let mut downloader = Downloader::new(registry);
    if !args.no_cache {
        let cache = match &args.cache_dir {
            Some(dir) => VsixCache::open(dir, args.cache_max_size)?,
            None => VsixCache::open_default(args.cache_max_size)?,
        };
        downloader = downloader.with_cache(cache);
    }

    let spinner = spinner(format!("Downloading {} extension(s)...", seed.len()));
    let report = downloader
        .download(&seed, &args.out_dir, !args.no_deps)
        .await?;
    spinner.finish_and_clear();

    for (extension, version) in &report.downloaded {
        println!(
            "{} Downloaded '{extension}' {version}",
            style("Success:").green().bold()
        );
    }
    for (extension, version) in &report.from_cache {
        println!(
            "{} '{extension}' {version} served from cache",
            style("Cached:").cyan()
        );
    }
    for (extension, reason) in &report.metadata_failures {
        println!(
            "{} Could not read dependencies of '{extension}': {reason}",
            style("Warning:").yellow()
        );
    }
    for (extension, reason) in &report.failed {
        println!(
            "{} Could not download '{extension}': {reason}",
            style("Failed:").red().bold()
        );
    }

    println!(
        "{} extension(s) ready in '{}', {} failed",
        report.succeeded(),
        args.out_dir.display(),
        report.failed.len()
    );

    if args.zip {
        let bundle_path = bundle_downloads(&args)?;
        println!(
            "{} Wrote {}",
            style("Success:").green().bold(),
            bundle_path.display()
        );
    }

    Ok(if report.has_failures() { 1 } else { 0 })
}

fn bundle_downloads(args: &DownloadArgs) -> Result<PathBuf> {
    crate::bundle::zip_directory(&args.out_dir).with_context(|| {
        format!(
            "Could not bundle downloads from '{}'",
            args.out_dir.display()
        )
    })
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
