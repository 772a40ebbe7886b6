// ABOUTME: Date normalization for dates scraped from listing pages.
// ABOUTME: Strips labels, collapses ranges, and tries an ordered whole-string format list into UTC.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DateError;

/// Calendar formats tried in order when a source does not supply its own.
/// Formats without a day field resolve to the first of the month.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %Y",
    "%b %Y",
];

/// Range separators; the text after the last one is kept.
const RANGE_SEPARATORS: &[&str] = &[" - ", " – "];

/// A leading category label such as "Blog · " or "News | ".
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z ]*?\s*[·•|]\s*").expect("valid label regex"));

/// Either channel a source can publish a date through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput<'a> {
    Text(&'a str),
    EpochMillis(i64),
}

/// Parses free-form dates with an ordered list of chrono formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNormalizer {
    formats: Vec<String>,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMATS.iter().copied())
    }
}

impl DateNormalizer {
    /// Creates a normalizer trying `formats` in order.
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formats: formats.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a normalizer from a possibly empty override list.
    pub fn with_overrides(formats: &[String]) -> Self {
        if formats.is_empty() {
            Self::default()
        } else {
            Self::new(formats.iter().cloned())
        }
    }

    /// Normalizes either input channel, logging text that looked like a
    /// date but matched nothing.
    pub fn normalize(&self, input: DateInput<'_>) -> Option<DateTime<Utc>> {
        let result = match input {
            DateInput::Text(text) => self.try_normalize(text),
            DateInput::EpochMillis(ms) => normalize_epoch_millis(ms),
        };
        match result {
            Ok(dt) => Some(dt),
            Err(err @ (DateError::Unrecognized(_) | DateError::OutOfRange(_))) => {
                tracing::warn!(error = %err, "could not parse date");
                None
            }
            Err(err) => {
                tracing::trace!(error = %err, "skipping date candidate");
                None
            }
        }
    }

    /// Normalizes text, reporting why it failed.
    ///
    /// Ranges keep their end date, label prefixes are dropped, and the
    /// remainder must match a whole format; partial matches are failures.
    pub fn try_normalize(&self, text: &str) -> Result<DateTime<Utc>, DateError> {
        let mut candidate = text.trim();
        if candidate.is_empty() {
            return Err(DateError::Empty);
        }

        for sep in RANGE_SEPARATORS {
            if let Some((_, end)) = candidate.rsplit_once(sep) {
                candidate = end.trim();
            }
        }

        let candidate = LABEL_PREFIX.replace(candidate, "");
        let candidate = candidate.trim();

        if !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err(DateError::NoDigits(candidate.to_string()));
        }

        // Full timestamps, as found in <time datetime> attributes
        if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(candidate) {
            return Ok(dt.with_timezone(&Utc));
        }

        self.formats
            .iter()
            .find_map(|fmt| parse_calendar_date(candidate, fmt))
            .ok_or_else(|| DateError::Unrecognized(candidate.to_string()))
    }
}

/// Parses `s` against one format, defaulting a missing day to the 1st.
///
/// chrono lets a format space match zero characters and `%Y` take a single
/// digit, so "Sep 2024" would satisfy "%B %d %Y" as Sep 20, year 24. Input
/// and format must therefore have the same number of whitespace tokens.
fn parse_calendar_date(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    if s.split_whitespace().count() != fmt.split_whitespace().count() {
        return None;
    }
    let date = if has_day_field(fmt) {
        NaiveDate::parse_from_str(s, fmt).ok()?
    } else {
        NaiveDate::parse_from_str(&format!("{s} 1"), &format!("{fmt} %d")).ok()?
    };
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn has_day_field(fmt: &str) -> bool {
    ["%d", "%e", "%j", "%F", "%D", "%x"]
        .iter()
        .any(|spec| fmt.contains(spec))
}

/// Converts a millisecond epoch timestamp to a UTC instant.
pub fn normalize_epoch_millis(ms: i64) -> Result<DateTime<Utc>, DateError> {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    DateTime::from_timestamp(secs, nanos).ok_or(DateError::OutOfRange(ms))
}

/// Normalizes with the default format list.
pub fn normalize_date(input: DateInput<'_>) -> Option<DateTime<Utc>> {
    static DEFAULT: Lazy<DateNormalizer> = Lazy::new(DateNormalizer::default);
    DEFAULT.normalize(input)
}
