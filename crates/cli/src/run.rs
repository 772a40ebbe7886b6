// ABOUTME: Per-source pipeline: fetch, extract, apply the zero-posts policy, assemble, render, write.
// ABOUTME: Each source ends in a RunOutcome; only retrieval and I/O problems are failures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use sitefeeds_feed::{assemble, FeedFormat};
use sitefeeds_scrape::{EmptyFeedPolicy, Extraction, Extractor, Source};

use crate::fetch::Fetcher;

/// How results are emitted.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub dir: PathBuf,
    pub format: FeedFormat,
    /// Print extracted posts as JSON instead of writing feed files.
    pub json: bool,
}

/// Result of refreshing one source.
#[derive(Debug)]
pub enum RunOutcome {
    Written { path: PathBuf, posts: usize },
    Printed { posts: usize },
    /// Zero posts under the `skip` policy; no file was written.
    SkippedEmpty,
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Written { .. } | RunOutcome::Printed { .. })
    }
}

/// Fetches `page_url` for `source` and runs the rest of the pipeline.
pub fn run_source(
    source: &Source,
    page_url: &str,
    fetcher: &dyn Fetcher,
    output: &OutputOptions,
) -> RunOutcome {
    let extractor = match Extractor::new(source) {
        Ok(extractor) => extractor,
        Err(e) => return RunOutcome::Failed(e.into()),
    };
    let html = match fetcher.fetch(page_url) {
        Ok(html) => html,
        Err(e) => return RunOutcome::Failed(e.context(format!("retrieving {}", source.name))),
    };

    let extraction = extractor.extract(&html);
    for issue in &extraction.issues {
        tracing::warn!(source = %source.name, %issue, "extraction issue");
    }

    match publish(source, &extraction, output) {
        Ok(outcome) => outcome,
        Err(e) => RunOutcome::Failed(e),
    }
}

/// Applies the zero-posts policy and emits the feed or the JSON listing.
pub fn publish(source: &Source, extraction: &Extraction, output: &OutputOptions) -> Result<RunOutcome> {
    if output.json {
        let listing = json!({
            "source": source.name,
            "ok": !extraction.is_empty(),
            "posts": extraction.posts,
            "issues": extraction.issues,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
    }

    if extraction.is_empty() && source.on_empty == EmptyFeedPolicy::Skip {
        tracing::warn!(
            source = %source.name,
            structural = extraction.has_structural_issues(),
            "no posts found, not writing a feed"
        );
        return Ok(RunOutcome::SkippedEmpty);
    }

    if output.json {
        return Ok(RunOutcome::Printed {
            posts: extraction.len(),
        });
    }

    let path = write_feed(source, extraction, output)?;
    Ok(RunOutcome::Written {
        path,
        posts: extraction.len(),
    })
}

fn write_feed(source: &Source, extraction: &Extraction, output: &OutputOptions) -> Result<PathBuf> {
    let feed = assemble(&extraction.posts, &source.feed);
    let xml = output
        .format
        .render(&feed)
        .with_context(|| format!("rendering feed for {}", source.name))?;

    ensure_dir(&output.dir)?;
    let path = output.dir.join(output.format.file_name(&source.name));
    fs::write(&path, xml).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}
