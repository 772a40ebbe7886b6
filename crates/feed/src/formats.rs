// ABOUTME: Serializers turning an assembled Feed into RSS 2.0 or Atom 1.0 XML.
// ABOUTME: Entries are written in the order they appear in Feed::entries.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::FeedError;
use crate::models::Feed;

const GENERATOR: &str = "sitefeeds";

/// Output syndication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedFormat {
    #[default]
    Rss,
    Atom,
}

impl FeedFormat {
    /// Renders `feed` in this format.
    pub fn render(self, feed: &Feed) -> Result<String, FeedError> {
        match self {
            FeedFormat::Rss => render_rss(feed),
            FeedFormat::Atom => render_atom(feed),
        }
    }

    /// File name used for a source's feed in this format.
    pub fn file_name(self, source: &str) -> String {
        match self {
            FeedFormat::Rss => format!("feed_{source}.xml"),
            FeedFormat::Atom => format!("feed_{source}.atom.xml"),
        }
    }
}

impl From<&str> for FeedFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "atom" => FeedFormat::Atom,
            _ => FeedFormat::Rss,
        }
    }
}

type XmlWriter = Writer<Vec<u8>>;

fn emit<'a>(w: &mut XmlWriter, event: Event<'a>) -> Result<(), FeedError> {
    w.write_event(event).map_err(FeedError::render)
}

fn open(w: &mut XmlWriter, start: BytesStart<'_>) -> Result<(), FeedError> {
    emit(w, Event::Start(start))
}

fn close(w: &mut XmlWriter, name: &str) -> Result<(), FeedError> {
    emit(w, Event::End(BytesEnd::new(name)))
}

fn text_element(w: &mut XmlWriter, name: &str, text: &str) -> Result<(), FeedError> {
    open(w, BytesStart::new(name))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    close(w, name)
}

fn finish(w: XmlWriter) -> Result<String, FeedError> {
    let mut bytes = w.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| FeedError::Encoding(e.to_string()))
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders an RSS 2.0 document.
pub fn render_rss(feed: &Feed) -> Result<String, FeedError> {
    let meta = &feed.metadata;
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    open(
        &mut w,
        BytesStart::new("rss").with_attributes([
            ("version", "2.0"),
            ("xmlns:atom", "http://www.w3.org/2005/Atom"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
        ]),
    )?;
    open(&mut w, BytesStart::new("channel"))?;

    text_element(&mut w, "title", &meta.title)?;
    text_element(&mut w, "link", &meta.link)?;
    text_element(&mut w, "description", &meta.description)?;
    if let Some(self_link) = &meta.self_link {
        emit(
            &mut w,
            Event::Empty(BytesStart::new("atom:link").with_attributes([
                ("href", self_link.as_str()),
                ("rel", "self"),
                ("type", "application/rss+xml"),
            ])),
        )?;
    }
    if let Some(author) = &meta.author {
        text_element(&mut w, "dc:creator", author)?;
    }
    if let Some(logo) = &meta.logo {
        open(&mut w, BytesStart::new("image"))?;
        text_element(&mut w, "url", logo)?;
        text_element(&mut w, "title", &meta.title)?;
        text_element(&mut w, "link", &meta.link)?;
        close(&mut w, "image")?;
    }
    text_element(&mut w, "generator", GENERATOR)?;
    text_element(&mut w, "language", &meta.language)?;
    if let Some(updated) = &feed.updated {
        text_element(&mut w, "lastBuildDate", &updated.to_rfc2822())?;
    }

    for entry in &feed.entries {
        open(&mut w, BytesStart::new("item"))?;
        text_element(&mut w, "title", &entry.title)?;
        text_element(&mut w, "link", &entry.link)?;
        text_element(&mut w, "description", &entry.description)?;
        open(
            &mut w,
            BytesStart::new("guid").with_attributes([("isPermaLink", "false")]),
        )?;
        emit(&mut w, Event::Text(BytesText::new(&entry.id)))?;
        close(&mut w, "guid")?;
        if let Some(category) = &entry.category {
            text_element(&mut w, "category", category)?;
        }
        if let Some(published) = &entry.published {
            text_element(&mut w, "pubDate", &published.to_rfc2822())?;
        }
        close(&mut w, "item")?;
    }

    close(&mut w, "channel")?;
    close(&mut w, "rss")?;
    finish(w)
}

/// Renders an Atom 1.0 document.
pub fn render_atom(feed: &Feed) -> Result<String, FeedError> {
    let meta = &feed.metadata;
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    open(
        &mut w,
        BytesStart::new("feed").with_attributes([
            ("xmlns", "http://www.w3.org/2005/Atom"),
            ("xml:lang", meta.language.as_str()),
        ]),
    )?;

    let feed_id = meta.self_link.as_deref().unwrap_or(&meta.link);
    text_element(&mut w, "id", feed_id)?;
    text_element(&mut w, "title", &meta.title)?;
    if let Some(subtitle) = &meta.subtitle {
        text_element(&mut w, "subtitle", subtitle)?;
    }
    // Atom requires <updated>; an undated feed falls back to the epoch
    let updated = feed.updated.unwrap_or_default();
    text_element(&mut w, "updated", &rfc3339(&updated))?;
    emit(
        &mut w,
        Event::Empty(
            BytesStart::new("link").with_attributes([("href", meta.link.as_str()), ("rel", "alternate")]),
        ),
    )?;
    if let Some(self_link) = &meta.self_link {
        emit(
            &mut w,
            Event::Empty(
                BytesStart::new("link").with_attributes([("href", self_link.as_str()), ("rel", "self")]),
            ),
        )?;
    }
    if let Some(author) = &meta.author {
        open(&mut w, BytesStart::new("author"))?;
        text_element(&mut w, "name", author)?;
        close(&mut w, "author")?;
    }
    if let Some(logo) = &meta.logo {
        text_element(&mut w, "logo", logo)?;
    }
    text_element(&mut w, "generator", GENERATOR)?;

    for entry in &feed.entries {
        open(&mut w, BytesStart::new("entry"))?;
        text_element(&mut w, "id", &entry.id)?;
        text_element(&mut w, "title", &entry.title)?;
        emit(
            &mut w,
            Event::Empty(
                BytesStart::new("link")
                    .with_attributes([("href", entry.link.as_str()), ("rel", "alternate")]),
            ),
        )?;
        text_element(&mut w, "summary", &entry.description)?;
        if let Some(published) = &entry.published {
            text_element(&mut w, "published", &rfc3339(published))?;
        }
        let entry_updated = entry.published.unwrap_or(updated);
        text_element(&mut w, "updated", &rfc3339(&entry_updated))?;
        if let Some(category) = &entry.category {
            emit(
                &mut w,
                Event::Empty(BytesStart::new("category").with_attributes([("term", category.as_str())])),
            )?;
        }
        close(&mut w, "entry")?;
    }

    close(&mut w, "feed")?;
    finish(w)
}
