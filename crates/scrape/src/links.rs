// ABOUTME: Link policy for candidate posts: deny-list matching and resolution to absolute URLs.
// ABOUTME: Defaults check the resolved host and scheme; per-source substrings match the raw href via aho-corasick.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use url::Url;

use crate::error::ScrapeError;
use crate::strategy::LinkPolicy;

/// Host labels of social sites; `www.youtube.com` is denied, `/blog/youtube-talk` is not.
pub const DEFAULT_DENY_HOSTS: &[&str] = &[
    "twitter",
    "x",
    "linkedin",
    "facebook",
    "instagram",
    "youtube",
];

/// Schemes that never lead to a post.
pub const DEFAULT_DENY_SCHEMES: &[&str] = &["mailto", "tel", "javascript"];

/// Hrefs that only ever point back at the page itself.
pub const DEFAULT_DENY_EXACT: &[&str] = &["", "#", "/"];

/// Compiled deny list plus the base URL relative hrefs resolve against.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    base: Url,
    substrings: AhoCorasick,
    exact: Vec<String>,
}

impl LinkFilter {
    pub fn new(source_name: &str, base_url: &str, policy: &LinkPolicy) -> Result<Self, ScrapeError> {
        let base =
            Url::parse(base_url).map_err(|e| ScrapeError::invalid_url(source_name, base_url, e))?;

        let substrings = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&policy.deny_substrings)
            .map_err(|e| {
                ScrapeError::invalid_config(source_name, "links.deny_substrings", Some(e.into()))
            })?;

        let exact = DEFAULT_DENY_EXACT
            .iter()
            .map(|s| s.to_string())
            .chain(policy.deny_exact.iter().map(|s| s.trim().to_string()))
            .collect();

        Ok(Self {
            base,
            substrings,
            exact,
        })
    }

    /// Resolves `href` against the base URL, or `None` if it is denied or malformed.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if self.denies_href(href) {
            return None;
        }
        let url = match self.base.join(href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(href, error = %e, "unresolvable link");
                return None;
            }
        };
        if denies_url(&url) {
            tracing::trace!(href, "social or non-web link");
            return None;
        }
        Some(url.into())
    }

    fn denies_href(&self, href: &str) -> bool {
        href.starts_with('#')
            || self.exact.iter().any(|e| e == href)
            || self.substrings.is_match(href)
    }
}

fn denies_url(url: &Url) -> bool {
    if DEFAULT_DENY_SCHEMES.contains(&url.scheme()) {
        return true;
    }
    url.host_str().is_some_and(|host| {
        host.split('.')
            .any(|label| DEFAULT_DENY_HOSTS.iter().any(|d| label.eq_ignore_ascii_case(d)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(policy: LinkPolicy) -> LinkFilter {
        LinkFilter::new("test", "https://example.com/blog/", &policy).unwrap()
    }

    #[test]
    fn default_list_rejects_social_and_self_links() {
        let f = filter(LinkPolicy::default());
        for href in [
            "",
            "#",
            "/",
            "#writing",
            "https://Twitter.com/someone",
            "https://www.linkedin.com/in/x",
            "https://x.com/someone",
            "//www.youtube.com/watch?v=1",
            "mailto:hi@example.com",
            "tel:+100",
            "JavaScript:void(0)",
        ] {
            assert_eq!(f.resolve(href), None, "{href} should be denied");
        }
        assert!(f.resolve("/blog/launch").is_some());
    }

    #[test]
    fn social_words_in_post_paths_are_kept() {
        let f = filter(LinkPolicy::default());
        for href in [
            "/blog/youtube-feature-circuits",
            "/blog/facebook-opt-saes",
            "https://example.com/post/twitter-bots",
            "/xai-notes",
        ] {
            assert!(f.resolve(href).is_some(), "{href} should be kept");
        }
    }

    #[test]
    fn policy_extends_defaults() {
        let f = filter(LinkPolicy {
            deny_substrings: vec!["#".into(), "YouTube".into()],
            deny_exact: vec!["/blog/".into()],
        });
        assert_eq!(f.resolve("/blog/"), None);
        assert_eq!(f.resolve("/writing#top"), None);
        assert_eq!(f.resolve("/writing/youtube-talk"), None);
        assert!(f.resolve("/blog/post-1").is_some());
    }

    #[test]
    fn resolves_relative_and_absolute() {
        let f = filter(LinkPolicy::default());
        assert_eq!(
            f.resolve("/post/hello").as_deref(),
            Some("https://example.com/post/hello")
        );
        assert_eq!(
            f.resolve(" 2024/paper/index.html ").as_deref(),
            Some("https://example.com/blog/2024/paper/index.html")
        );
        assert_eq!(
            f.resolve("https://other.org/a").as_deref(),
            Some("https://other.org/a")
        );
    }

    #[test]
    fn invalid_base_is_an_error() {
        let err = LinkFilter::new("broken", "not a url", &LinkPolicy::default()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidUrl);
    }
}
