// ABOUTME: DOM helpers for candidate containers: compiled node predicates, text and local searches.
// ABOUTME: Searches stay inside a container, optionally after its link or up through its ancestors.

//! Selector-based helpers over `scraper` elements.
//!
//! Key behaviors:
//! - Selectors are tried in order; the first one yielding a usable match wins.
//! - Text is joined from the element's text nodes and whitespace-collapsed.
//! - "After the link" means later in document order than the link and
//!   outside of it, within the same container.
//! - Climbing walks parents up to, but never including, `<body>`.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sitefeeds_feed::{collapse_whitespace, first_line};

use crate::compiled::get_or_compile;
use crate::error::ScrapeError;
use crate::strategy::NodeMatch;

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Compiles a selector through the shared cache.
pub fn compile_selector(source_name: &str, css: &str) -> Result<Selector, ScrapeError> {
    get_or_compile(css).ok_or_else(|| ScrapeError::invalid_selector(source_name, css))
}

pub fn compile_selectors(source_name: &str, css: &[String]) -> Result<Vec<Selector>, ScrapeError> {
    css.iter().map(|s| compile_selector(source_name, s)).collect()
}

pub fn compile_pattern(source_name: &str, pattern: &str) -> Result<Regex, ScrapeError> {
    Regex::new(pattern).map_err(|e| ScrapeError::invalid_pattern(source_name, pattern, e))
}

/// A [`NodeMatch`] with its selector and regexes compiled.
#[derive(Debug, Clone)]
pub struct CompiledMatch {
    label: String,
    selector: Selector,
    class_pattern: Option<Regex>,
    href_pattern: Option<Regex>,
}

impl CompiledMatch {
    pub fn compile(source_name: &str, m: &NodeMatch) -> Result<Self, ScrapeError> {
        let compile_opt = |p: &Option<String>| {
            p.as_deref()
                .map(|p| compile_pattern(source_name, p))
                .transpose()
        };
        Ok(Self {
            label: describe(m),
            selector: compile_selector(source_name, &m.selector)?,
            class_pattern: compile_opt(&m.class_pattern)?,
            href_pattern: compile_opt(&m.href_pattern)?,
        })
    }

    /// Human-readable form used in issues and logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if `el` satisfies the selector and both regexes.
    pub fn matches(&self, el: &ElementRef<'_>) -> bool {
        self.selector.matches(el) && self.passes_filters(el)
    }

    fn passes_filters(&self, el: &ElementRef<'_>) -> bool {
        if let Some(re) = &self.class_pattern {
            if !el.value().classes().any(|c| re.is_match(c)) {
                return false;
            }
        }
        if let Some(re) = &self.href_pattern {
            match el.value().attr("href") {
                Some(href) if re.is_match(href) => {}
                _ => return false,
            }
        }
        true
    }

    /// Matching descendants of `root`, in document order.
    pub fn find_all<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        root.select(&self.selector)
            .filter(|el| self.passes_filters(el))
            .collect()
    }

    pub fn find_first<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        root.select(&self.selector)
            .find(|el| self.passes_filters(el))
    }
}

fn describe(m: &NodeMatch) -> String {
    let mut label = m.selector.clone();
    if let Some(p) = &m.class_pattern {
        label.push_str(&format!(" [class~/{p}/]"));
    }
    if let Some(p) = &m.href_pattern {
        label.push_str(&format!(" [href~/{p}/]"));
    }
    label
}

/// Resolves the search root: the document when `within` is empty, else the
/// first element matched by the first scope predicate that matches anything.
pub fn resolve_scope<'a>(document: &'a Html, within: &[CompiledMatch]) -> Option<ElementRef<'a>> {
    let root = document.root_element();
    if within.is_empty() {
        return Some(root);
    }
    within.iter().find_map(|m| m.find_first(root))
}

/// Whitespace-collapsed text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text nodes joined with spaces so adjacent inline nodes never fuse digits.
pub fn spaced_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// The first non-blank line of an element's text.
pub fn first_line_text(el: ElementRef<'_>) -> String {
    first_line(&el.text().collect::<String>())
}

/// The element's first `a[href]` descendant.
pub fn first_link(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    container.select(&LINK_SELECTOR).next()
}

/// The element itself if it carries an href, else its first `a[href]` descendant.
pub fn link_of(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if el.value().attr("href").is_some() {
        Some(el)
    } else {
        first_link(el)
    }
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Text of the first selector match inside `container` that is longer than
/// `min_len` characters.
pub fn first_text(container: ElementRef<'_>, selectors: &[Selector], min_len: usize) -> Option<String> {
    selectors.iter().find_map(|sel| {
        container
            .select(sel)
            .next()
            .map(element_text)
            .filter(|t| t.chars().count() > min_len)
    })
}

/// Text of the first element inside `container` that follows `link` in
/// document order, matches one of `selectors` and has non-blank text.
pub fn following_text(
    container: ElementRef<'_>,
    link: ElementRef<'_>,
    selectors: &[Selector],
) -> Option<String> {
    let link_id = link.id();
    let mut passed_link = false;

    for node in container.descendants() {
        if node.id() == link_id {
            passed_link = true;
            continue;
        }
        if !passed_link || node.ancestors().any(|a| a.id() == link_id) {
            continue;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if selectors.iter().any(|sel| sel.matches(&el)) {
            let text = element_text(el);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// `el` followed by its ancestors, stopping below `<body>`.
pub fn climb(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    std::iter::successors(Some(el), |e| {
        parent_element(*e).filter(|p| !matches!(p.value().name(), "body" | "html"))
    })
}
