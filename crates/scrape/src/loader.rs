// ABOUTME: Loads source registries from the embedded JSON definitions or a user-supplied file.
// ABOUTME: Every loaded source is compiled once so bad selectors and patterns fail at load time.

//! Source registry loader.
//!
//! The five built-in sources are compiled into the binary from
//! `data/sources.json`. A user file in the same format replaces them.

use std::path::Path;

use crate::engine::Extractor;
use crate::error::ScrapeError;
use crate::strategy::{Source, SourceRegistry};

/// Embedded JSON containing the built-in source definitions.
const BUILTIN_SOURCES_JSON: &str = include_str!("../data/sources.json");

/// Loads the built-in source registry.
pub fn load_builtin_sources() -> Result<SourceRegistry, ScrapeError> {
    load_sources_str(BUILTIN_SOURCES_JSON)
}

/// Loads a registry from a JSON file holding an array of sources.
pub fn load_sources_file(path: &Path) -> Result<SourceRegistry, ScrapeError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        ScrapeError::invalid_config("", format!("cannot read {}", path.display()), Some(e.into()))
    })?;
    load_sources_str(&json)
}

/// Parses and validates a JSON array of sources.
pub fn load_sources_str(json: &str) -> Result<SourceRegistry, ScrapeError> {
    let sources: Vec<Source> = serde_json::from_str(json)
        .map_err(|e| ScrapeError::invalid_config("", "malformed source list", Some(e.into())))?;

    let mut registry = SourceRegistry::new();
    for source in sources {
        if registry.get(&source.name).is_some() {
            return Err(ScrapeError::invalid_config(
                source.name.clone(),
                "duplicate source name",
                None,
            ));
        }
        Extractor::new(&source)?;
        registry.register(source);
    }
    Ok(registry)
}
