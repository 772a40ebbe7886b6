// ABOUTME: JSON-backed extraction for pages that embed their post list as a script payload.
// ABOUTME: Walks configured JSON pointers instead of the DOM and returns posts newest-first.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde_json::Value;
use sitefeeds_feed::{normalize_epoch_millis, strip_html, DateNormalizer, PostRecord};

use crate::error::ScrapeError;
use crate::links::LinkFilter;
use crate::result::{Extraction, Issue};
use crate::select::compile_selector;
use crate::strategy::PayloadSpec;

/// A [`PayloadSpec`] with its selector compiled.
#[derive(Debug, Clone)]
pub struct CompiledPayload {
    selector: Selector,
    spec: PayloadSpec,
}

impl CompiledPayload {
    pub fn compile(source_name: &str, spec: &PayloadSpec) -> Result<Self, ScrapeError> {
        if !spec.link_template.contains("{slug}") {
            return Err(ScrapeError::invalid_config(
                source_name,
                "payload.link_template must contain {slug}",
                None,
            ));
        }
        Ok(Self {
            selector: compile_selector(source_name, &spec.selector)?,
            spec: spec.clone(),
        })
    }

    /// Builds posts from the payload, sorted by date descending with undated
    /// posts last in payload order.
    pub fn extract(&self, document: &Html, links: &LinkFilter, dates: &DateNormalizer) -> Extraction {
        let mut out = Extraction::default();

        let Some(script) = document.select(&self.selector).next() else {
            tracing::warn!(selector = %self.spec.selector, "payload element not found");
            out.issues.push(Issue::PayloadNotFound {
                selector: self.spec.selector.clone(),
            });
            return out;
        };

        let raw: String = script.text().collect();
        let data: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "payload is not valid JSON");
                out.issues.push(Issue::PayloadMalformed {
                    reason: e.to_string(),
                });
                return out;
            }
        };

        let Some(items) = data.pointer(&self.spec.items).and_then(Value::as_array) else {
            tracing::warn!(pointer = %self.spec.items, "payload has no post array");
            out.issues.push(Issue::PayloadShape {
                pointer: self.spec.items.clone(),
            });
            return out;
        };

        let mut seen = HashSet::new();
        for item in items {
            if let Some(post) = self.build_post(item, links, dates, &mut out.issues) {
                if seen.insert(post.link().to_string()) {
                    out.posts.push(post);
                }
            }
        }

        // Stable, so equal and missing dates keep payload order
        out.posts.sort_by(|a, b| b.date().cmp(&a.date()));
        out
    }

    fn build_post(
        &self,
        item: &Value,
        links: &LinkFilter,
        dates: &DateNormalizer,
        issues: &mut Vec<Issue>,
    ) -> Option<PostRecord> {
        let slug = str_at(item, &self.spec.slug)?;
        // Frontmatter strings may carry inline markup and entities
        let title = strip_html(str_at(item, &self.spec.title)?);
        let link = links.resolve(&self.spec.link_template.replace("{slug}", slug))?;

        let mut date = None;
        if let Some(text) = self.spec.date.as_deref().and_then(|p| str_at(item, p)) {
            match dates.try_normalize(text) {
                Ok(dt) => date = Some(dt),
                Err(e) => {
                    tracing::warn!(link = %link, error = %e, "could not parse payload date");
                    issues.push(Issue::UnparseableDate {
                        link: link.clone(),
                        text: text.to_string(),
                    });
                }
            }
        }
        if date.is_none() {
            date = self
                .spec
                .timestamp_ms
                .as_deref()
                .and_then(|p| item.pointer(p))
                .and_then(epoch_millis)
                .and_then(|ms| normalize_epoch_millis(ms).ok());
        }

        let description = self
            .spec
            .author
            .as_deref()
            .and_then(|p| str_at(item, p))
            .map(|author| format!("By {}", strip_html(author)));

        match PostRecord::new(&title, &link, date, description.as_deref(), None) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::debug!(link = %link, reason = %e, "rejected payload post");
                None
            }
        }
    }
}

fn str_at<'a>(item: &'a Value, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn epoch_millis(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::LinkPolicy;

    fn spec() -> PayloadSpec {
        PayloadSpec {
            selector: "script#__NEXT_DATA__".into(),
            items: "/props/pageProps/posts".into(),
            slug: "/slug".into(),
            title: "/frontmatter/title".into(),
            date: Some("/frontmatter/date".into()),
            timestamp_ms: Some("/date".into()),
            author: Some("/frontmatter/author".into()),
            link_template: "/blog/{slug}".into(),
        }
    }

    fn run(html: &str) -> Extraction {
        let payload = CompiledPayload::compile("laion", &spec()).unwrap();
        let links = LinkFilter::new("laion", "https://laion.ai/blog/", &LinkPolicy::default()).unwrap();
        payload.extract(&Html::parse_document(html), &links, &DateNormalizer::default())
    }

    fn page(json: &str) -> String {
        format!(r#"<html><body><script id="__NEXT_DATA__" type="application/json">{json}</script></body></html>"#)
    }

    #[test]
    fn builds_sorted_posts_from_payload() {
        let html = page(
            r#"{"props":{"pageProps":{"posts":[
                {"slug":"old","frontmatter":{"title":"Old <em>post</em> &amp; notes","date":"Jan 5, 2023"}},
                {"slug":"undated","frontmatter":{"title":"Undated post"}},
                {"slug":"new","frontmatter":{"title":"New post","author":"Jane Doe"},"date":1722729600000},
                {"slug":"","frontmatter":{"title":"No slug"}},
                {"slug":"untitled","frontmatter":{}}
            ]}}}"#,
        );
        let out = run(&html);

        let links: Vec<_> = out.posts.iter().map(|p| p.link()).collect();
        assert_eq!(
            links,
            vec![
                "https://laion.ai/blog/new",
                "https://laion.ai/blog/old",
                "https://laion.ai/blog/undated",
            ]
        );
        assert_eq!(out.posts[0].description(), "By Jane Doe");
        assert_eq!(out.posts[1].title(), "Old post & notes");
        assert_eq!(out.posts[1].description(), "Old post & notes");
        assert!(out.posts[2].date().is_none());
        assert!(out.issues.is_empty());
    }

    #[test]
    fn missing_payload_is_an_issue() {
        let out = run("<html><body><p>nothing</p></body></html>");
        assert!(out.is_empty());
        assert!(matches!(out.issues[0], Issue::PayloadNotFound { .. }));
    }

    #[test]
    fn malformed_payload_is_an_issue() {
        let out = run(&page("{not json"));
        assert!(out.is_empty());
        assert!(matches!(out.issues[0], Issue::PayloadMalformed { .. }));
    }

    #[test]
    fn wrong_shape_is_an_issue() {
        let out = run(&page(r#"{"props":{"pageProps":{"posts":{}}}}"#));
        assert!(out.is_empty());
        assert!(matches!(out.issues[0], Issue::PayloadShape { .. }));
    }

    #[test]
    fn template_without_slug_is_rejected() {
        let mut bad = spec();
        bad.link_template = "/blog/".into();
        assert!(CompiledPayload::compile("laion", &bad).is_err());
    }
}
