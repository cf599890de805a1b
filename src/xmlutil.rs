/// XML text escaping helpers shared by the tree serializer and the note
/// body accessors.
use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

const CHARS: [&str; 5] = ["&", "<", ">", "\"", "'"];
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

// Built once, thread-safe
static ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(CHARS)
        .expect("Failed to build XML escaper")
});

// LeftmostLongest so &amp; wins over a bare & inside it
static UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(ENTITIES)
        .expect("Failed to build XML unescaper")
});

/// Escape the five standard XML special characters.
///
/// # Examples
///
/// ```
/// use wmlpart::xmlutil::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<t>"), "&lt;t&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    ESCAPER.replace_all(s, &ENTITIES)
}

/// Replace the five standard XML entities with their characters.
///
/// Unknown or malformed entities are left unchanged.
///
/// # Examples
///
/// ```
/// use wmlpart::xmlutil::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    UNESCAPER.replace_all(s, &CHARS)
}
