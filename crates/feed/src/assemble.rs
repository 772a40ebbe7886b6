// ABOUTME: Feed assembly from extracted post records.
// ABOUTME: Orders entries newest-first, keeps undated posts, and keys entries by link.

use crate::models::{Feed, FeedEntry, FeedMetadata, PostRecord};

/// Builds a feed whose entries are ordered newest-first.
///
/// The renderers emit entries in slice order, so ordering happens here:
/// a stable sort on date, newest first. Undated posts are kept, after the
/// dated ones, in the order the source produced them.
pub fn assemble(posts: &[PostRecord], metadata: &FeedMetadata) -> Feed {
    let mut ordered: Vec<&PostRecord> = posts.iter().collect();
    ordered.sort_by(|a, b| b.date().cmp(&a.date()));

    let entries: Vec<FeedEntry> = ordered.into_iter().map(to_entry).collect();
    let updated = entries.iter().filter_map(|e| e.published).max();

    tracing::debug!(entries = entries.len(), title = %metadata.title, "assembled feed");

    Feed {
        metadata: metadata.clone(),
        entries,
        updated,
    }
}

fn to_entry(post: &PostRecord) -> FeedEntry {
    FeedEntry {
        id: post.link().to_string(),
        title: post.title().to_string(),
        link: post.link().to_string(),
        description: post.description().to_string(),
        published: post.date(),
        category: post.kind().map(str::to_string),
    }
}
