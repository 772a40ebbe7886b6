// ABOUTME: Main library entry point for the sitefeeds extraction engine.
// ABOUTME: Re-exports the public API: Source definitions, SourceRegistry, Extractor, Extraction and errors.

//! Declarative post extraction for sites that publish no feed.
//!
//! A [`Source`] describes one site as data: which containers hold posts and
//! how to read title, date, description and link from each. An
//! [`Extractor`] compiles a source once and turns markup into an
//! [`Extraction`].
//!
//! # Example
//!
//! ```no_run
//! use sitefeeds_scrape::{load_builtin_sources, Extractor, ScrapeError};
//!
//! fn main() -> Result<(), ScrapeError> {
//!     let registry = load_builtin_sources()?;
//!     let source = registry.get("neuronpedia").expect("builtin source");
//!     let extractor = Extractor::new(source)?;
//!     let extraction = extractor.extract("<html><body></body></html>");
//!     println!("{} posts", extraction.len());
//!     Ok(())
//! }
//! ```

pub mod compiled;
pub mod engine;
pub mod error;
pub mod links;
pub mod loader;
pub mod payload;
pub mod result;
pub mod select;
pub mod strategy;

pub use crate::engine::Extractor;
pub use crate::error::{ErrorCode, ScrapeError};
pub use crate::links::LinkFilter;
pub use crate::loader::{load_builtin_sources, load_sources_file, load_sources_str};
pub use crate::result::{Extraction, Issue};
pub use crate::strategy::{
    CandidateSpec, ContextRule, DateRule, DescriptionRule, EmptyFeedPolicy, FetchMode,
    FieldRules, KindRule, LinkPolicy, NodeMatch, PayloadSpec, Source, SourceRegistry, Strategy,
    TitleRule,
};

/// Compiles `source` and extracts posts from `html` in one call.
pub fn extract_posts(source: &Source, html: &str) -> Result<Extraction, ScrapeError> {
    Ok(Extractor::new(source)?.extract(html))
}
