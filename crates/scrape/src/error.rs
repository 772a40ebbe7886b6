// ABOUTME: Error types for loading and compiling source definitions, with ErrorCode and ScrapeError.
// ABOUTME: Configuration problems are fatal; per-document problems are reported as Issues instead.

use std::fmt;

/// Categories of configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidSelector,
    InvalidPattern,
    InvalidConfig,
    InvalidUrl,
    UnknownSource,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidSelector => "invalid selector",
            ErrorCode::InvalidPattern => "invalid pattern",
            ErrorCode::InvalidConfig => "invalid configuration",
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::UnknownSource => "unknown source",
        };
        write!(f, "{}", s)
    }
}

/// Error raised while loading or compiling a source definition.
#[derive(Debug, thiserror::Error)]
pub struct ScrapeError {
    pub code: ErrorCode,
    /// Name of the source being compiled, empty when loading a registry.
    pub source_name: String,
    /// The selector, pattern or field that was rejected.
    pub detail: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sitefeeds: {}", self.code)?;
        if !self.source_name.is_empty() {
            write!(f, " in source {}", self.source_name)?;
        }
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ScrapeError {
    fn new(
        code: ErrorCode,
        source_name: impl Into<String>,
        detail: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            source_name: source_name.into(),
            detail: detail.into(),
            source,
        }
    }

    /// Create an InvalidSelector error.
    pub fn invalid_selector(source_name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSelector, source_name, selector, None)
    }

    /// Create an InvalidPattern error from a regex compile failure.
    pub fn invalid_pattern(
        source_name: impl Into<String>,
        pattern: impl Into<String>,
        err: regex::Error,
    ) -> Self {
        Self::new(ErrorCode::InvalidPattern, source_name, pattern, Some(err.into()))
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(
        source_name: impl Into<String>,
        detail: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::InvalidConfig, source_name, detail, source)
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        source_name: impl Into<String>,
        url: impl Into<String>,
        err: url::ParseError,
    ) -> Self {
        Self::new(ErrorCode::InvalidUrl, source_name, url, Some(err.into()))
    }

    /// Create an UnknownSource error.
    pub fn unknown_source(name: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownSource, "", name, None)
    }

    /// Returns true if this is an UnknownSource error.
    pub fn is_unknown_source(&self) -> bool {
        self.code == ErrorCode::UnknownSource
    }

    /// Returns true if a selector or pattern failed to compile.
    pub fn is_invalid_rule(&self) -> bool {
        matches!(self.code, ErrorCode::InvalidSelector | ErrorCode::InvalidPattern)
    }
}
