// ABOUTME: Canonical post record and feed models shared by extraction and rendering.
// ABOUTME: PostRecord enforces its invariants at construction and is immutable afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::html_utils::{collapse_whitespace, truncate_chars};

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Minimum title length in characters after trimming.
pub const MIN_TITLE_CHARS: usize = 3;

/// Titles that only ever label site navigation.
pub const NAVIGATION_LABELS: &[&str] = &[
    "home", "about", "contact", "menu", "search", "sign in", "log in",
];

/// Returns true if `title` case-insensitively equals a navigation label.
pub fn is_navigation_label(title: &str) -> bool {
    let lowered = title.trim().to_lowercase();
    NAVIGATION_LABELS.iter().any(|label| *label == lowered)
}

/// One post extracted from a source page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    title: String,
    date: Option<DateTime<Utc>>,
    description: String,
    link: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

impl PostRecord {
    /// Builds a record, rejecting titles that are too short or that name
    /// navigation. A missing or blank description falls back to the title;
    /// longer ones are cut to [`MAX_DESCRIPTION_CHARS`].
    pub fn new(
        title: &str,
        link: &str,
        date: Option<DateTime<Utc>>,
        description: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Self, RecordError> {
        let link = link.trim();
        if link.is_empty() {
            return Err(RecordError::EmptyLink);
        }

        let title = collapse_whitespace(title);
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(RecordError::TitleTooShort(title));
        }
        if is_navigation_label(&title) {
            return Err(RecordError::NavigationTitle(title));
        }

        let description = description
            .map(collapse_whitespace)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| title.clone());

        Ok(Self {
            description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
            title,
            date,
            link: link.to_string(),
            kind: kind.map(str::to_string).filter(|k| !k.is_empty()),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Absolute URL; the identity key within one extraction run.
    pub fn link(&self) -> &str {
        &self.link
    }

    /// Coarse category tag such as "Paper" or "Note".
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

/// Static, per-source channel metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedMetadata {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    /// Public URL of the rendered feed file itself.
    #[serde(default)]
    pub self_link: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// One entry of an assembled feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

/// An assembled feed whose entries are already in output order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    pub metadata: FeedMetadata,
    pub entries: Vec<FeedEntry>,
    /// Newest entry date, if any entry is dated.
    pub updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_defaults_to_title() {
        let post = PostRecord::new("Scaling Monosemanticity", "https://a.test/x", None, None, None)
            .unwrap();
        assert_eq!(post.description(), "Scaling Monosemanticity");

        let blank = PostRecord::new("Scaling", "https://a.test/x", None, Some("   "), None).unwrap();
        assert_eq!(blank.description(), "Scaling");
    }

    #[test]
    fn description_is_truncated_to_300_chars() {
        let long = "é".repeat(500);
        let post = PostRecord::new("Title", "https://a.test/x", None, Some(&long), None).unwrap();
        assert_eq!(post.description().chars().count(), 300);
    }

    #[test]
    fn short_titles_are_rejected() {
        assert_eq!(
            PostRecord::new(" ab ", "https://a.test/x", None, None, None),
            Err(RecordError::TitleTooShort("ab".to_string()))
        );
        assert!(PostRecord::new("abc", "https://a.test/x", None, None, None).is_ok());
    }

    #[test]
    fn navigation_titles_are_rejected() {
        for label in ["Home", "ABOUT", "Contact", "menu", "Search", "Sign In", "Log in"] {
            let err = PostRecord::new(label, "https://a.test/x", None, None, None).unwrap_err();
            assert!(matches!(err, RecordError::NavigationTitle(_)), "{label}");
        }
        assert!(PostRecord::new("About Interpretability", "https://a.test/x", None, None, None).is_ok());
    }

    #[test]
    fn empty_link_is_rejected() {
        assert_eq!(
            PostRecord::new("Title", "  ", None, None, None),
            Err(RecordError::EmptyLink)
        );
    }

    #[test]
    fn kind_serializes_as_type() {
        let post =
            PostRecord::new("Title", "https://a.test/x", None, None, Some("Paper")).unwrap();
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["type"], "Paper");
        assert_eq!(json["link"], "https://a.test/x");
    }
}
