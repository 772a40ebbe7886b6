// ABOUTME: Declarative per-source strategy definitions and the source registry.
// ABOUTME: Defines node predicates, candidate rules, field rules, link policy and payload specs.

//! Source definitions.
//!
//! A [`Source`] describes one site: where its listing page lives, how to
//! fetch it, the channel metadata of its feed, and an ordered list of
//! [`Strategy`] rules that locate post containers in the page. Definitions
//! are plain data, deserialized from JSON.

use serde::{Deserialize, Serialize};
use sitefeeds_feed::FeedMetadata;
use std::collections::BTreeMap;

/// How a source's page has to be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// A plain HTTP GET returns the listing markup.
    #[default]
    Http,
    /// The listing is rendered client-side and needs a headless browser.
    Browser,
}

/// What to do when a document yields no posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyFeedPolicy {
    /// Refuse to write a feed and report the run as failed.
    #[default]
    Skip,
    /// Write a feed with no entries so the file always exists.
    WriteEmpty,
}

/// Matches elements by CSS selector plus optional regexes on `class` and `href`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMatch {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href_pattern: Option<String>,
}

impl NodeMatch {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }
}

/// Which node an anchor candidate draws its fields from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRule {
    /// The anchor element itself.
    #[default]
    Link,
    /// The anchor's parent element.
    Parent,
}

/// How a strategy finds candidate containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateSpec {
    /// Every matching element is a candidate link.
    Anchors {
        select: NodeMatch,
        #[serde(default)]
        within: Vec<NodeMatch>,
        #[serde(default)]
        context: ContextRule,
    },
    /// Every matching element is a container; its first `a[href]` is the link.
    Blocks {
        select: NodeMatch,
        #[serde(default)]
        within: Vec<NodeMatch>,
    },
    /// Direct children of a root, where date markers apply to the items after them.
    Timeline {
        within: Vec<NodeMatch>,
        marker: NodeMatch,
        item: NodeMatch,
    },
}

/// Title resolution inside a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRule {
    /// Heading-like selectors, tried in order.
    #[serde(default)]
    pub selectors: Vec<String>,
    /// A selector match must be longer than this many characters to win.
    #[serde(default)]
    pub min_len: usize,
    /// Fall back to the first line of the anchor's own text.
    #[serde(default = "default_true")]
    pub fallback_to_link: bool,
}

impl Default for TitleRule {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            min_len: 0,
            fallback_to_link: true,
        }
    }
}

/// Description resolution inside a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionRule {
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Only consider elements that follow the anchor in document order.
    #[serde(default)]
    pub after_link: bool,
    /// Byline selectors; a byline is prefixed as "<byline> - <description>".
    #[serde(default)]
    pub byline: Vec<String>,
}

/// Date resolution around a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRule {
    /// Elements whose text (or `attr`) holds the date.
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub attr: Option<String>,
    /// Regexes searched in the container's text; capture group 1 (or the whole match) is the date.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Keep searching ancestors of the container, stopping below `<body>`.
    #[serde(default)]
    pub climb: bool,
}

/// Maps a container class to a category label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindRule {
    pub class: String,
    pub label: String,
}

/// Field extraction rules applied to each candidate container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRules {
    #[serde(default)]
    pub title: TitleRule,
    #[serde(default)]
    pub description: DescriptionRule,
    #[serde(default)]
    pub date: DateRule,
    #[serde(default)]
    pub kind: Vec<KindRule>,
}

/// One heuristic for locating posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub candidates: CandidateSpec,
    #[serde(default)]
    pub fields: FieldRules,
}

/// Additional hrefs a source never treats as posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkPolicy {
    /// Case-insensitive substrings.
    #[serde(default)]
    pub deny_substrings: Vec<String>,
    /// Exact hrefs, e.g. the listing page's own path.
    #[serde(default)]
    pub deny_exact: Vec<String>,
}

/// A structured JSON payload embedded in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadSpec {
    /// Selector of the element whose text is the JSON document.
    pub selector: String,
    /// JSON pointer to the array of post objects.
    pub items: String,
    /// JSON pointers inside each post object.
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    /// Millisecond epoch fallback when `date` is absent or unparseable.
    #[serde(default)]
    pub timestamp_ms: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Link path with a `{slug}` placeholder, resolved against the base URL.
    pub link_template: String,
}

/// A complete definition of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// The listing page to fetch.
    pub page_url: String,
    /// Base for resolving relative links; defaults to `page_url`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub fetch: FetchMode,
    #[serde(default)]
    pub on_empty: EmptyFeedPolicy,
    pub feed: FeedMetadata,
    /// Overrides the default date format list when non-empty.
    #[serde(default)]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub links: LinkPolicy,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
    /// When present, DOM strategies are ignored.
    #[serde(default)]
    pub payload: Option<PayloadSpec>,
}

impl Source {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.page_url)
    }
}

fn default_true() -> bool {
    true
}

/// Registry of sources keyed by name, iterated in name order.
#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    map: BTreeMap<String, Source>,
}

impl SourceRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source, replacing any existing one with the same name.
    pub fn register(&mut self, source: Source) {
        self.map.insert(source.name.clone(), source);
    }

    /// Looks up a source by name.
    pub fn get(&self, name: &str) -> Option<&Source> {
        self.map.get(name)
    }

    /// All sources in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.map.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_source_uses_defaults() {
        let json = r#"{
            "name": "example",
            "page_url": "https://example.com/blog",
            "feed": {"title": "Example", "link": "https://example.com/blog", "description": "Posts"},
            "strategies": [{
                "name": "anchors",
                "candidates": {"type": "anchors", "select": {"selector": "a[href]", "href_pattern": "^/blog/"}}
            }]
        }"#;
        let source: Source = serde_json::from_str(json).unwrap();

        assert_eq!(source.fetch, FetchMode::Http);
        assert_eq!(source.on_empty, EmptyFeedPolicy::Skip);
        assert_eq!(source.base_url(), "https://example.com/blog");
        assert_eq!(source.feed.language, "en");
        assert!(source.payload.is_none());

        let strategy = &source.strategies[0];
        assert!(strategy.fields.title.fallback_to_link);
        match &strategy.candidates {
            CandidateSpec::Anchors { select, within, context } => {
                assert_eq!(select.href_pattern.as_deref(), Some("^/blog/"));
                assert!(within.is_empty());
                assert_eq!(*context, ContextRule::Link);
            }
            other => panic!("unexpected candidates {other:?}"),
        }
    }

    #[test]
    fn timeline_and_policy_deserialize() {
        let json = r#"{
            "name": "timeline",
            "page_url": "https://example.com",
            "on_empty": "write_empty",
            "fetch": "browser",
            "feed": {"title": "T", "link": "https://example.com", "description": "D"},
            "strategies": [{
                "name": "toc",
                "candidates": {
                    "type": "timeline",
                    "within": [{"selector": ".toc"}],
                    "marker": {"selector": "div.date"},
                    "item": {"selector": "a.paper"}
                },
                "fields": {"title": {"selectors": ["h3"], "fallback_to_link": false},
                           "kind": [{"class": "paper", "label": "Paper"}]}
            }]
        }"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.on_empty, EmptyFeedPolicy::WriteEmpty);
        assert_eq!(source.fetch, FetchMode::Browser);
        let strategy = &source.strategies[0];
        assert!(matches!(
            &strategy.candidates,
            CandidateSpec::Timeline { within, .. } if within.len() == 1
        ));
        assert!(!strategy.fields.title.fallback_to_link);
        assert_eq!(strategy.fields.kind[0].label, "Paper");
    }

    #[test]
    fn registry_replaces_by_name_and_iterates_sorted() {
        let make = |name: &str, url: &str| Source {
            name: name.to_string(),
            page_url: url.to_string(),
            base_url: None,
            fetch: FetchMode::Http,
            on_empty: EmptyFeedPolicy::Skip,
            feed: FeedMetadata::default(),
            date_formats: vec![],
            links: LinkPolicy::default(),
            strategies: vec![],
            payload: None,
        };

        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());
        registry.register(make("zeta", "https://z.test"));
        registry.register(make("alpha", "https://a.test"));
        registry.register(make("zeta", "https://z2.test"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert_eq!(registry.get("zeta").unwrap().page_url, "https://z2.test");
        assert!(registry.get("missing").is_none());
    }
}
