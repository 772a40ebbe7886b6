// ABOUTME: CLI that refreshes site feeds: fetches each source's listing page and writes RSS/Atom files.
// ABOUTME: Also lists sources, parses saved pages with --html, and prints extracted posts as JSON.

mod fetch;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sitefeeds_feed::FeedFormat;
use sitefeeds_scrape::{load_builtin_sources, load_sources_file, ScrapeError, Source};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::fetch::{
    BrowserFetcher, Fetcher, Fetchers, FileFetcher, HttpFetcher, DEFAULT_USER_AGENT,
};
use crate::run::{run_source, OutputOptions, RunOutcome};

/// Generate RSS/Atom feeds for sites that do not publish one.
#[derive(Parser, Debug)]
#[command(name = "sitefeeds")]
#[command(about = "Scrape listing pages into RSS/Atom feeds", long_about = None)]
struct Args {
    /// Source names to refresh. Defaults to every configured source.
    names: Vec<String>,

    /// List configured sources and exit.
    #[arg(long, default_value_t = false)]
    list: bool,

    /// JSON file of source definitions replacing the built-in ones.
    #[arg(long = "sources", value_name = "FILE")]
    sources_file: Option<PathBuf>,

    /// Parse a saved page instead of fetching (requires exactly one source).
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Override the page URL to fetch (requires exactly one source).
    #[arg(long)]
    url: Option<String>,

    /// Directory feed files are written to.
    #[arg(long, default_value = "feeds")]
    output_dir: PathBuf,

    /// Feed format to write.
    #[arg(long, default_value = "rss", value_parser = ["rss", "atom"])]
    format: String,

    /// Print extracted posts as JSON instead of writing feed files.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Fetch timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// User agent for HTTP and browser fetches.
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Chromium-compatible binary used for sources that need rendering.
    #[arg(long, default_value = "chromium")]
    browser: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let registry = match &args.sources_file {
        Some(path) => load_sources_file(path),
        None => load_builtin_sources(),
    }
    .context("loading source definitions")?;

    if args.list {
        for source in registry.iter() {
            println!(
                "{}\t{:?}\t{:?}\t{}",
                source.name, source.fetch, source.on_empty, source.page_url
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let selected: Vec<&Source> = if args.names.is_empty() {
        registry.iter().collect()
    } else {
        args.names
            .iter()
            .map(|name| registry.get(name).ok_or_else(|| ScrapeError::unknown_source(name)))
            .collect::<Result<_, _>>()?
    };

    if (args.html.is_some() || args.url.is_some()) && selected.len() != 1 {
        bail!("--html and --url require exactly one source name");
    }

    let timeout = Duration::from_secs(args.timeout);
    let fetchers = Fetchers {
        http: HttpFetcher::new(&args.user_agent, timeout)?,
        browser: BrowserFetcher::new(&args.browser, &args.user_agent, timeout),
    };
    let file_fetcher = args.html.as_ref().map(FileFetcher::new);

    let output = OutputOptions {
        dir: args.output_dir.clone(),
        format: FeedFormat::from(args.format.as_str()),
        json: args.json,
    };

    let mut failures = 0;
    for source in selected {
        let page_url = args.url.as_deref().unwrap_or(&source.page_url);
        let fetcher: &dyn Fetcher = match &file_fetcher {
            Some(file) => file,
            None => fetchers.for_mode(source.fetch),
        };

        match run_source(source, page_url, fetcher, &output) {
            RunOutcome::Written { path, posts } => {
                tracing::info!(
                    source = %source.name,
                    posts,
                    path = %path.display(),
                    "feed written"
                );
            }
            RunOutcome::Printed { posts } => {
                tracing::info!(source = %source.name, posts, "posts printed");
            }
            RunOutcome::SkippedEmpty => {
                tracing::error!(source = %source.name, "no posts found; check the page structure");
                failures += 1;
            }
            RunOutcome::Failed(e) => {
                tracing::error!(
                    source = %source.name,
                    error = %format!("{e:#}"),
                    "feed generation failed"
                );
                failures += 1;
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
