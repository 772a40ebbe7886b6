// ABOUTME: Extraction result holding accepted posts and the non-fatal issues met on the way.
// ABOUTME: Lets callers tell "nothing found" apart from "found but malformed".

use serde::Serialize;
use sitefeeds_feed::PostRecord;

/// A per-document problem that did not abort extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// A strategy's scope container is absent; the strategy yielded nothing.
    #[error("strategy {strategy}: no element matched {scope}")]
    RootNotFound { strategy: String, scope: String },

    /// The embedded data payload is absent.
    #[error("no element matched payload selector {selector}")]
    PayloadNotFound { selector: String },

    /// The payload was found but is not valid JSON.
    #[error("payload is not valid JSON: {reason}")]
    PayloadMalformed { reason: String },

    /// The payload parsed but the item list is missing or not an array.
    #[error("payload has no array at {pointer}")]
    PayloadShape { pointer: String },

    /// A date-like string near a post did not parse; the post kept no date.
    #[error("could not parse date {text:?} for {link}")]
    UnparseableDate { link: String, text: String },
}

impl Issue {
    /// Issues that mean the document itself was not what the source expects.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Issue::UnparseableDate { .. })
    }
}

/// Posts accepted from one document, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub posts: Vec<PostRecord>,
    pub issues: Vec<Issue>,
}

impl Extraction {
    /// Returns true if no post was accepted.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Returns true if any structural issue was recorded.
    pub fn has_structural_issues(&self) -> bool {
        self.issues.iter().any(Issue::is_structural)
    }
}
