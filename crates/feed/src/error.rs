// ABOUTME: Error types for post records, date normalization and feed rendering.
// ABOUTME: Provides FeedError for rendering, RecordError for rejected posts, DateError for dates.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while rendering a feed document.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The XML writer failed to emit an event.
    #[error("failed to render feed: {0}")]
    Render(String),

    /// The rendered bytes were not valid UTF-8.
    #[error("rendered feed is not valid UTF-8: {0}")]
    Encoding(String),
}

impl FeedError {
    /// Creates a Render error from an underlying writer error.
    pub fn render(err: impl fmt::Display) -> Self {
        FeedError::Render(err.to_string())
    }
}

/// Reasons a candidate post is refused by [`crate::PostRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("post link is empty")]
    EmptyLink,

    #[error("title {0:?} is shorter than 3 characters")]
    TitleTooShort(String),

    #[error("title {0:?} is a navigation label")]
    NavigationTitle(String),
}

/// Why a date string did not normalize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date text is empty")]
    Empty,

    /// Author names and prose never reach the format list.
    #[error("date text {0:?} contains no digits")]
    NoDigits(String),

    #[error("date text {0:?} matches no known format")]
    Unrecognized(String),

    #[error("timestamp {0} is out of range")]
    OutOfRange(i64),
}
