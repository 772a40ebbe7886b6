// ABOUTME: Core post and feed library for sitefeeds.
// ABOUTME: Provides the PostRecord model, date normalization, feed assembly and RSS/Atom rendering.

pub mod assemble;
pub mod error;
pub mod formats;
pub mod html_utils;
pub mod models;
pub mod time_parse;

pub use assemble::assemble;
pub use error::{DateError, FeedError, RecordError};
pub use formats::{render_atom, render_rss, FeedFormat};
pub use html_utils::{collapse_whitespace, decode_entities, first_line, strip_html, truncate_chars};
pub use models::{
    is_navigation_label, Feed, FeedEntry, FeedMetadata, PostRecord, MAX_DESCRIPTION_CHARS,
    MIN_TITLE_CHARS, NAVIGATION_LABELS,
};
pub use time_parse::{
    normalize_date, normalize_epoch_millis, DateInput, DateNormalizer, DEFAULT_DATE_FORMATS,
};
