// ABOUTME: The shared post extraction engine, parameterized by a compiled Source definition.
// ABOUTME: Applies strategies in order with a per-run seen-set; the first strategy to accept a link wins.

//! Post extraction.
//!
//! [`Extractor::new`] compiles a [`Source`] once: selectors go through the
//! process-wide cache, regexes and the link policy are compiled per
//! extractor. [`Extractor::extract`] is then a pure function of the markup:
//! every call starts from an empty seen-set, so running it twice on the same
//! document yields the same posts in the same order.
//!
//! Strategies are cumulative. A later strategy only adds posts for links no
//! earlier strategy accepted; it never replaces or reorders them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sitefeeds_feed::{collapse_whitespace, DateError, DateNormalizer, PostRecord};

use crate::error::ScrapeError;
use crate::links::LinkFilter;
use crate::payload::CompiledPayload;
use crate::result::{Extraction, Issue};
use crate::select::{
    climb, compile_pattern, compile_selectors, first_line_text, first_link, first_text,
    following_text, link_of, parent_element, resolve_scope, spaced_text, CompiledMatch,
};
use crate::strategy::{
    CandidateSpec, ContextRule, FieldRules, KindRule, NodeMatch, Source, Strategy,
};

/// Descriptions at or under this many characters are treated as missing.
const MIN_DESCRIPTION_CHARS: usize = 10;

/// A compiled source, ready to extract posts from its documents.
#[derive(Debug, Clone)]
pub struct Extractor {
    name: String,
    links: LinkFilter,
    dates: DateNormalizer,
    strategies: Vec<CompiledStrategy>,
    payload: Option<CompiledPayload>,
}

#[derive(Debug, Clone)]
struct CompiledStrategy {
    name: String,
    candidates: CompiledCandidates,
    fields: CompiledFields,
}

#[derive(Debug, Clone)]
enum CompiledCandidates {
    Anchors {
        select: CompiledMatch,
        within: Vec<CompiledMatch>,
        context: ContextRule,
    },
    Blocks {
        select: CompiledMatch,
        within: Vec<CompiledMatch>,
    },
    Timeline {
        within: Vec<CompiledMatch>,
        marker: CompiledMatch,
        item: CompiledMatch,
    },
}

impl CompiledCandidates {
    fn within(&self) -> &[CompiledMatch] {
        match self {
            CompiledCandidates::Anchors { within, .. }
            | CompiledCandidates::Blocks { within, .. }
            | CompiledCandidates::Timeline { within, .. } => within,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledFields {
    title: Vec<Selector>,
    title_min_len: usize,
    title_from_link: bool,
    description: Vec<Selector>,
    description_after_link: bool,
    byline: Vec<Selector>,
    date: Vec<Selector>,
    date_attr: Option<String>,
    date_patterns: Vec<Regex>,
    date_climb: bool,
    kind: Vec<KindRule>,
}

/// Where a candidate's date comes from.
#[derive(Debug, Clone)]
enum DateSource {
    /// Search the container with the strategy's date rule.
    Fields,
    /// Already decided by a timeline marker.
    Marker(Option<DateTime<Utc>>),
    /// The preceding marker had digits but matched no format.
    UnparsedMarker(String),
}

/// One container believed to hold a post.
struct Candidate<'a> {
    container: ElementRef<'a>,
    link: ElementRef<'a>,
    date: DateSource,
}

impl Extractor {
    /// Compiles `source`, failing on any invalid selector, regex or URL.
    pub fn new(source: &Source) -> Result<Self, ScrapeError> {
        let name = source.name.as_str();
        let links = LinkFilter::new(name, source.base_url(), &source.links)?;
        let payload = source
            .payload
            .as_ref()
            .map(|spec| CompiledPayload::compile(name, spec))
            .transpose()?;
        let strategies = source
            .strategies
            .iter()
            .map(|s| CompiledStrategy::compile(name, s))
            .collect::<Result<Vec<_>, _>>()?;

        if payload.is_none() && strategies.is_empty() {
            return Err(ScrapeError::invalid_config(
                name,
                "source defines neither strategies nor a payload",
                None,
            ));
        }

        Ok(Self {
            name: source.name.clone(),
            links,
            dates: DateNormalizer::with_overrides(&source.date_formats),
            strategies,
            payload,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extracts posts from `html` in document order, or newest-first for
    /// payload sources. Never fails; problems are reported as issues.
    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let out = match &self.payload {
            Some(payload) => payload.extract(&document, &self.links, &self.dates),
            None => self.extract_dom(&document),
        };

        tracing::info!(
            source = %self.name,
            posts = out.len(),
            issues = out.issues.len(),
            "extraction finished"
        );
        out
    }

    fn extract_dom(&self, document: &Html) -> Extraction {
        let mut out = Extraction::default();
        let mut seen: HashSet<String> = HashSet::new();

        for strategy in &self.strategies {
            let before = out.posts.len();
            let candidates = match strategy.candidates(document, &self.dates) {
                Ok(candidates) => candidates,
                Err(issue) => {
                    tracing::debug!(source = %self.name, %issue, "strategy skipped");
                    out.issues.push(issue);
                    continue;
                }
            };

            for candidate in candidates {
                self.accept(strategy, candidate, &mut seen, &mut out);
            }

            tracing::debug!(
                source = %self.name,
                strategy = %strategy.name,
                added = out.posts.len() - before,
                "strategy applied"
            );
        }
        out
    }

    /// Builds a record from `candidate` and keeps it if its link is new.
    fn accept(
        &self,
        strategy: &CompiledStrategy,
        candidate: Candidate<'_>,
        seen: &mut HashSet<String>,
        out: &mut Extraction,
    ) {
        let Some(href) = candidate.link.value().attr("href") else {
            return;
        };
        let Some(link) = self.links.resolve(href) else {
            tracing::trace!(source = %self.name, href, "denied link");
            return;
        };
        if seen.contains(&link) {
            tracing::trace!(source = %self.name, link = %link, "already extracted");
            return;
        }

        let fields = &strategy.fields;
        let Some(title) = fields.title(candidate.container, candidate.link) else {
            tracing::debug!(source = %self.name, link = %link, "no title found");
            return;
        };

        let mut issues = Vec::new();
        let date = match candidate.date {
            DateSource::Marker(date) => date,
            DateSource::UnparsedMarker(text) => {
                let err = DateError::Unrecognized(text.clone());
                self.unparseable(&link, &text, &err, &mut issues)
            }
            DateSource::Fields => self.date(fields, candidate.container, &link, &mut issues),
        };
        let description = fields.description(candidate.container, candidate.link, &title);
        let kind = fields.kind(candidate.container);

        match PostRecord::new(&title, &link, date, Some(&description), kind) {
            Ok(post) => {
                seen.insert(link);
                out.posts.push(post);
                out.issues.append(&mut issues);
            }
            Err(e) => {
                tracing::debug!(
                    source = %self.name,
                    strategy = %strategy.name,
                    link = %link,
                    reason = %e,
                    "rejected candidate"
                );
            }
        }
    }

    /// Resolves a date from selectors first, then regex searches over the
    /// container text, climbing ancestors if configured.
    fn date(
        &self,
        fields: &CompiledFields,
        container: ElementRef<'_>,
        link: &str,
        issues: &mut Vec<Issue>,
    ) -> Option<DateTime<Utc>> {
        for sel in &fields.date {
            let Some(el) = container.select(sel).next() else {
                continue;
            };
            let text = match &fields.date_attr {
                Some(attr) => el.value().attr(attr).unwrap_or_default().to_string(),
                None => spaced_text(el),
            };
            match self.dates.try_normalize(&text) {
                Ok(dt) => return Some(dt),
                Err(err @ DateError::Unrecognized(_)) => {
                    return self.unparseable(link, &text, &err, issues);
                }
                // Blank or digit-free text is a byline or label, not a date
                Err(_) => continue,
            }
        }

        if fields.date_patterns.is_empty() {
            return None;
        }

        let levels: Vec<ElementRef<'_>> = if fields.date_climb {
            climb(container).collect()
        } else {
            vec![container]
        };
        for el in levels {
            let text = spaced_text(el);
            let mut failed = None;
            for re in &fields.date_patterns {
                let Some(found) = re.captures(&text).and_then(|c| c.get(1).or_else(|| c.get(0)))
                else {
                    continue;
                };
                match self.dates.try_normalize(found.as_str()) {
                    Ok(dt) => return Some(dt),
                    Err(err) => failed = Some((found.as_str().to_string(), err)),
                }
            }
            if let Some((text, err)) = failed {
                return self.unparseable(link, &text, &err, issues);
            }
        }
        None
    }

    fn unparseable(
        &self,
        link: &str,
        text: &str,
        err: &DateError,
        issues: &mut Vec<Issue>,
    ) -> Option<DateTime<Utc>> {
        tracing::warn!(source = %self.name, link, error = %err, "could not parse date");
        issues.push(Issue::UnparseableDate {
            link: link.to_string(),
            text: collapse_whitespace(text),
        });
        None
    }
}

impl CompiledStrategy {
    fn compile(source_name: &str, strategy: &Strategy) -> Result<Self, ScrapeError> {
        let compile_all = |matches: &[NodeMatch]| {
            matches
                .iter()
                .map(|m| CompiledMatch::compile(source_name, m))
                .collect::<Result<Vec<_>, _>>()
        };

        let candidates = match &strategy.candidates {
            CandidateSpec::Anchors {
                select,
                within,
                context,
            } => CompiledCandidates::Anchors {
                select: CompiledMatch::compile(source_name, select)?,
                within: compile_all(within)?,
                context: *context,
            },
            CandidateSpec::Blocks { select, within } => CompiledCandidates::Blocks {
                select: CompiledMatch::compile(source_name, select)?,
                within: compile_all(within)?,
            },
            CandidateSpec::Timeline {
                within,
                marker,
                item,
            } => CompiledCandidates::Timeline {
                within: compile_all(within)?,
                marker: CompiledMatch::compile(source_name, marker)?,
                item: CompiledMatch::compile(source_name, item)?,
            },
        };

        Ok(Self {
            name: strategy.name.clone(),
            candidates,
            fields: CompiledFields::compile(source_name, &strategy.fields)?,
        })
    }

    /// Candidate containers in document order, or the issue that stopped the
    /// strategy from looking.
    fn candidates<'a>(
        &self,
        document: &'a Html,
        dates: &DateNormalizer,
    ) -> Result<Vec<Candidate<'a>>, Issue> {
        let within = self.candidates.within();
        let Some(root) = resolve_scope(document, within) else {
            return Err(Issue::RootNotFound {
                strategy: self.name.clone(),
                scope: within
                    .iter()
                    .map(CompiledMatch::label)
                    .collect::<Vec<_>>()
                    .join(" | "),
            });
        };

        let candidates = match &self.candidates {
            CompiledCandidates::Anchors {
                select, context, ..
            } => select
                .find_all(root)
                .into_iter()
                .filter(|a| a.value().attr("href").is_some())
                .map(|link| Candidate {
                    container: match context {
                        ContextRule::Link => link,
                        ContextRule::Parent => parent_element(link).unwrap_or(link),
                    },
                    link,
                    date: DateSource::Fields,
                })
                .collect(),
            CompiledCandidates::Blocks { select, .. } => select
                .find_all(root)
                .into_iter()
                .filter_map(|container| {
                    first_link(container).map(|link| Candidate {
                        container,
                        link,
                        date: DateSource::Fields,
                    })
                })
                .collect(),
            CompiledCandidates::Timeline { marker, item, .. } => {
                timeline(root, marker, item, dates)
            }
        };
        Ok(candidates)
    }
}

/// Walks the root's direct children; each marker sets the date for the
/// items after it until the next marker.
fn timeline<'a>(
    root: ElementRef<'a>,
    marker: &CompiledMatch,
    item: &CompiledMatch,
    dates: &DateNormalizer,
) -> Vec<Candidate<'a>> {
    let mut current = DateSource::Marker(None);
    let mut out = Vec::new();

    for child in root.children().filter_map(ElementRef::wrap) {
        if marker.matches(&child) {
            let text = spaced_text(child);
            current = match dates.try_normalize(&text) {
                Ok(dt) => DateSource::Marker(Some(dt)),
                Err(DateError::Unrecognized(_)) => DateSource::UnparsedMarker(text),
                Err(_) => DateSource::Marker(None),
            };
            continue;
        }
        if item.matches(&child) {
            if let Some(link) = link_of(child) {
                out.push(Candidate {
                    container: child,
                    link,
                    date: current.clone(),
                });
            }
        }
    }
    out
}

impl CompiledFields {
    fn compile(source_name: &str, rules: &FieldRules) -> Result<Self, ScrapeError> {
        Ok(Self {
            title: compile_selectors(source_name, &rules.title.selectors)?,
            title_min_len: rules.title.min_len,
            title_from_link: rules.title.fallback_to_link,
            description: compile_selectors(source_name, &rules.description.selectors)?,
            description_after_link: rules.description.after_link,
            byline: compile_selectors(source_name, &rules.description.byline)?,
            date: compile_selectors(source_name, &rules.date.selectors)?,
            date_attr: rules.date.attr.clone(),
            date_patterns: rules
                .date
                .patterns
                .iter()
                .map(|p| compile_pattern(source_name, p))
                .collect::<Result<Vec<_>, _>>()?,
            date_climb: rules.date.climb,
            kind: rules.kind.clone(),
        })
    }

    /// Heading-like selector text first, then the link's first line.
    fn title(&self, container: ElementRef<'_>, link: ElementRef<'_>) -> Option<String> {
        first_text(container, &self.title, self.title_min_len)
            .or_else(|| self.title_from_link.then(|| first_line_text(link)))
            .filter(|t| !t.is_empty())
    }

    /// Nearby paragraph text when it is long enough and not the title,
    /// else the title; prefixed with a byline when one exists.
    fn description(&self, container: ElementRef<'_>, link: ElementRef<'_>, title: &str) -> String {
        let found = if self.description_after_link {
            following_text(container, link, &self.description)
        } else {
            first_text(container, &self.description, 0)
        };
        let description = found
            .filter(|d| d.chars().count() > MIN_DESCRIPTION_CHARS && d != title)
            .unwrap_or_else(|| title.to_string());

        match first_text(container, &self.byline, 0) {
            Some(byline) => format!("{byline} - {description}"),
            None => description,
        }
    }

    fn kind(&self, container: ElementRef<'_>) -> Option<&str> {
        self.kind
            .iter()
            .find(|rule| container.value().classes().any(|c| c == rule.class))
            .map(|rule| rule.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{
        DateRule, DescriptionRule, EmptyFeedPolicy, FetchMode, LinkPolicy, NodeMatch, TitleRule,
    };
    use chrono::TimeZone;
    use sitefeeds_feed::FeedMetadata;

    fn source(strategies: Vec<Strategy>) -> Source {
        Source {
            name: "test".into(),
            page_url: "https://example.com/".into(),
            base_url: None,
            fetch: FetchMode::Http,
            on_empty: EmptyFeedPolicy::Skip,
            feed: FeedMetadata::default(),
            date_formats: vec![],
            links: LinkPolicy::default(),
            strategies,
            payload: None,
        }
    }

    fn anchors(name: &str, href_pattern: &str, fields: FieldRules) -> Strategy {
        Strategy {
            name: name.into(),
            candidates: CandidateSpec::Anchors {
                select: NodeMatch {
                    selector: "a[href]".into(),
                    class_pattern: None,
                    href_pattern: Some(href_pattern.into()),
                },
                within: vec![],
                context: ContextRule::Link,
            },
            fields,
        }
    }

    fn blocks(name: &str, selector: &str, fields: FieldRules) -> Strategy {
        Strategy {
            name: name.into(),
            candidates: CandidateSpec::Blocks {
                select: NodeMatch::css(selector),
                within: vec![],
            },
            fields,
        }
    }

    fn heading_fields() -> FieldRules {
        FieldRules {
            title: TitleRule {
                selectors: vec!["h2".into()],
                min_len: 0,
                fallback_to_link: true,
            },
            description: DescriptionRule {
                selectors: vec!["p".into()],
                ..Default::default()
            },
            date: DateRule {
                selectors: vec!["time".into()],
                attr: Some("datetime".into()),
                ..Default::default()
            },
            kind: vec![],
        }
    }

    const PAGE: &str = r#"<html><body>
        <a href="/blog/shared">Anchor title</a>
        <article>
          <h2>Block title</h2>
          <time datetime="2024-03-01T10:00:00Z">March 1</time>
          <p>A summary that is long enough to keep.</p>
          <a href="/blog/shared">Read more</a>
        </article>
        <a href="/blog/solo">Solo anchor post</a>
        <a href="/blog/home">Home</a>
        <a href="https://twitter.com/blog/x">Twitter blog</a>
    </body></html>"#;

    #[test]
    fn first_strategy_wins_shared_links() {
        let extractor = Extractor::new(&source(vec![
            blocks("articles", "article", heading_fields()),
            anchors("blog-links", "^/blog/", FieldRules::default()),
        ]))
        .unwrap();
        let out = extractor.extract(PAGE);

        let titles: Vec<_> = out.posts.iter().map(|p| p.title()).collect();
        assert_eq!(titles, vec!["Block title", "Solo anchor post"]);

        let shared = &out.posts[0];
        assert_eq!(shared.link(), "https://example.com/blog/shared");
        assert_eq!(shared.description(), "A summary that is long enough to keep.");
        assert_eq!(
            shared.date().map(|d| d.to_rfc3339()),
            Some("2024-03-01T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn reversed_priority_changes_the_winner() {
        let extractor = Extractor::new(&source(vec![
            anchors("blog-links", "^/blog/", FieldRules::default()),
            blocks("articles", "article", heading_fields()),
        ]))
        .unwrap();
        let out = extractor.extract(PAGE);

        let shared = out
            .posts
            .iter()
            .find(|p| p.link() == "https://example.com/blog/shared")
            .unwrap();
        assert_eq!(shared.title(), "Anchor title");
        assert_eq!(out.posts.len(), 2);
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = Extractor::new(&source(vec![
            blocks("articles", "article", heading_fields()),
            anchors("blog-links", "^/blog/", FieldRules::default()),
        ]))
        .unwrap();
        assert_eq!(extractor.extract(PAGE), extractor.extract(PAGE));
    }

    #[test]
    fn navigation_titles_do_not_block_later_strategies() {
        let html = r#"<body>
            <a href="/blog/p">Home</a>
            <div class="card"><h2>Real post</h2><a href="/blog/p">x</a></div>
        </body>"#;
        let extractor = Extractor::new(&source(vec![
            anchors("links", "^/blog/", FieldRules::default()),
            blocks("cards", "div.card", heading_fields()),
        ]))
        .unwrap();
        let out = extractor.extract(html);
        assert_eq!(out.len(), 1);
        assert_eq!(out.posts[0].title(), "Real post");
    }

    #[test]
    fn short_or_equal_description_falls_back_to_title() {
        let html = r#"<body>
            <article><h2>First title</h2><p>Too short</p><a href="/a">a</a></article>
            <article><h2>Second title</h2><p>Second title</p><a href="/b">b</a></article>
        </body>"#;
        let out = Extractor::new(&source(vec![blocks("a", "article", heading_fields())]))
            .unwrap()
            .extract(html);
        assert_eq!(out.posts[0].description(), "First title");
        assert_eq!(out.posts[1].description(), "Second title");
    }

    #[test]
    fn digit_free_date_text_is_ignored_but_garbage_is_reported() {
        let fields = FieldRules {
            date: DateRule {
                selectors: vec!["span.meta".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let html = r#"<body>
            <a href="/blog/a">Post by author<span class="meta">Jane Doe</span></a>
            <a href="/blog/b">Post with bad date<span class="meta">Quarter 3 of 2024</span></a>
        </body>"#;
        let out = Extractor::new(&source(vec![anchors("links", "^/blog/", fields)]))
            .unwrap()
            .extract(html);

        assert_eq!(out.len(), 2);
        assert!(out.posts.iter().all(|p| p.date().is_none()));
        assert_eq!(
            out.issues,
            vec![Issue::UnparseableDate {
                link: "https://example.com/blog/b".into(),
                text: "Quarter 3 of 2024".into(),
            }]
        );
        assert!(!out.has_structural_issues());
    }

    #[test]
    fn missing_scope_reports_root_not_found() {
        let strategy = Strategy {
            name: "toc".into(),
            candidates: CandidateSpec::Timeline {
                within: vec![NodeMatch::css(".toc")],
                marker: NodeMatch::css("div.date"),
                item: NodeMatch::css("a"),
            },
            fields: FieldRules::default(),
        };
        let out = Extractor::new(&source(vec![strategy])).unwrap().extract("");
        assert!(out.is_empty());
        assert!(out.has_structural_issues());
        assert!(matches!(&out.issues[0], Issue::RootNotFound { strategy, .. } if strategy == "toc"));
    }

    #[test]
    fn unparseable_timeline_marker_is_reported_per_post() {
        let strategy = Strategy {
            name: "toc".into(),
            candidates: CandidateSpec::Timeline {
                within: vec![NodeMatch::css(".toc")],
                marker: NodeMatch::css("div.date"),
                item: NodeMatch::css("a"),
            },
            fields: FieldRules::default(),
        };
        let html = r#"<div class="toc">
            <div class="date">Quarter 3 of 2024</div>
            <a href="/a">First paper</a>
            <a href="/b">Second paper</a>
            <div class="date">May 2024</div>
            <a href="/c">Third paper</a>
        </div>"#;

        let out = Extractor::new(&source(vec![strategy])).unwrap().extract(html);
        let dates: Vec<_> = out.posts.iter().map(|p| p.date()).collect();
        assert_eq!(
            dates,
            vec![
                None,
                None,
                Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
            ]
        );
        assert_eq!(
            out.issues,
            vec![
                Issue::UnparseableDate {
                    link: "https://example.com/a".into(),
                    text: "Quarter 3 of 2024".into(),
                },
                Issue::UnparseableDate {
                    link: "https://example.com/b".into(),
                    text: "Quarter 3 of 2024".into(),
                },
            ]
        );
    }

    #[test]
    fn source_without_rules_is_rejected() {
        let err = Extractor::new(&source(vec![])).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfig);
    }
}
