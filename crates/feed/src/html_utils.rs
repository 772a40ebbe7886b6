// ABOUTME: Text helpers for scraped post fields.
// ABOUTME: Tag stripping, entity decoding, whitespace collapsing, first-line and char-safe truncation.

/// Strips HTML tags from a string, returning plain text.
/// Angle-bracketed runs are dropped, entities decoded and whitespace collapsed.
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    collapse_whitespace(&decode_entities(&result))
}

/// Decodes the named entities that show up in CMS-generated titles, plus
/// numeric entities like `&#123;` and `&#x7B;`.
pub fn decode_entities(s: &str) -> String {
    let mut result = s.to_string();

    let entities = [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&ndash;", "–"),
        ("&mdash;", "—"),
        ("&lsquo;", "\u{2018}"),
        ("&rsquo;", "\u{2019}"),
        ("&ldquo;", "\u{201C}"),
        ("&rdquo;", "\u{201D}"),
        ("&hellip;", "…"),
        ("&middot;", "·"),
        ("&bull;", "•"),
    ];

    for (entity, replacement) in &entities {
        result = result.replace(entity, replacement);
    }

    // Last, so "&amp;lt;" stays "&lt;"
    result = decode_numeric_entities(&result);
    result.replace("&amp;", "&")
}

fn decode_numeric_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("&#") {
        result.push_str(&rest[..start]);
        let tail = &rest[start + 2..];

        let (is_hex, digits_start) = match tail.chars().next() {
            Some('x') | Some('X') => (true, 1),
            _ => (false, 0),
        };
        let digits: String = tail[digits_start..]
            .chars()
            .take_while(|c| if is_hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() })
            .collect();
        let after = &tail[digits_start + digits.len()..];

        let decoded = if digits.is_empty() {
            None
        } else if is_hex {
            u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
        } else {
            digits.parse::<u32>().ok().and_then(char::from_u32)
        };

        match decoded {
            Some(c) => {
                result.push(c);
                rest = after.strip_prefix(';').unwrap_or(after);
            }
            None => {
                result.push_str("&#");
                rest = tail;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the first non-blank line of `s`, whitespace-collapsed.
pub fn first_line(s: &str) -> String {
    s.lines()
        .map(collapse_whitespace)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

/// Cuts `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<em>Toy Models</em> of Superposition"),
            "Toy Models of Superposition"
        );
    }

    #[test]
    fn test_strip_html_with_entities() {
        assert_eq!(strip_html("<p>Tom &amp; Jerry</p>"), "Tom & Jerry");
        assert_eq!(strip_html("&lt;script&gt;"), "<script>");
    }

    #[test]
    fn test_decode_entities_numeric() {
        assert_eq!(decode_entities("&#38;"), "&");
        assert_eq!(decode_entities("&#x26;"), "&");
        assert_eq!(decode_entities("&#169; LAION"), "© LAION");
        assert_eq!(decode_entities("broken &#; entity"), "broken &#; entity");
    }

    #[test]
    fn test_decode_entities_does_not_double_decode() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("\n  Sparse   Crosscoders \n Jan 2025"), "Sparse Crosscoders");
        assert_eq!(first_line("   "), "");
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 300), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
