//! Key layout helpers
//!
//! Keys are `/`-joined segments. Segments are escaped so that titles
//! containing `/` cannot collide with deeper keys.

/// Escape one key segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

/// Reverse [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("%2F", "/").replace("%25", "%")
}

/// Build a key from segments.
pub fn key_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| escape_segment(s))
        .collect::<Vec<_>>()
        .join("/")
}

/// Build a scan prefix matching every key below `segments`.
pub fn key_prefix(segments: &[&str]) -> String {
    let mut prefix = key_path(segments);
    prefix.push('/');
    prefix
}

/// The unescaped segment of `key` directly after `prefix`.
pub fn child_segment(key: &str, prefix: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    let segment = rest.split('/').next()?;
    Some(unescape_segment(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slashes_do_not_collide() {
        let nested = key_path(&["item", "a/b", "c"]);
        let flat = key_path(&["item", "a", "b", "c"]);
        assert_ne!(nested, flat);
        assert_eq!(nested, "item/a%2Fb/c");
    }

    #[test]
    fn test_escape_roundtrip() {
        for segment in ["plain", "a/b", "100%", "%2F", "a%2Fb/c"] {
            assert_eq!(unescape_segment(&escape_segment(segment)), segment);
        }
    }

    #[test]
    fn test_child_segment() {
        let prefix = key_prefix(&["bucket", "en.wikipedia"]);
        let key = key_path(&["bucket", "en.wikipedia", "pages/x"]);
        assert_eq!(child_segment(&key, &prefix).unwrap(), "pages/x");
        assert!(child_segment("other", &prefix).is_none());
    }
}
