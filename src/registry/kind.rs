//! # Bucket Kinds
//!
//! The closed set of bucket kinds and what each one can do. A bucket's kind is
//! resolved once, when the bucket is created, and stored in its record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported bucket kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketKind {
    /// Rendered page content, split by property (html, data-parsoid, ...)
    #[serde(rename = "pagecontent")]
    PageContent,
    /// Plain revisioned values, written by clients and never rendered
    #[serde(rename = "kv")]
    KeyValue,
}

/// A named facet of an item with its own revision lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    /// Content type used when the renderer does not supply one
    pub default_content_type: &'static str,
    /// Accepted media type essences (type/subtype, no parameters)
    pub accepts: &'static [&'static str],
    /// Produced by the same render as every other bundled property
    pub bundled: bool,
}

impl PropertySpec {
    /// Whether a client-supplied content type fits this property.
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let essence = media_type_essence(content_type);
        self.accepts.iter().any(|accepted| *accepted == essence)
    }
}

/// What a bucket kind supports.
#[derive(Debug)]
pub struct Capabilities {
    /// Misses are handed to the renderer
    pub renders: bool,
    /// Properties addressed by the path segment after the title; empty when
    /// items have no property segment
    pub properties: &'static [PropertySpec],
}

impl Capabilities {
    pub fn property(&self, name: &str) -> Option<&'static PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    /// Properties that one render of `name` produces, `name`'s group leader
    /// first. Unknown names yield an empty group.
    pub fn render_group(&self, name: &str) -> Vec<&'static PropertySpec> {
        match self.property(name) {
            Some(spec) if spec.bundled => self.properties.iter().filter(|p| p.bundled).collect(),
            Some(spec) => vec![spec],
            None => Vec::new(),
        }
    }
}

const PAGE_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        name: "html",
        default_content_type: "text/html; charset=UTF-8",
        accepts: &["text/html"],
        bundled: true,
    },
    PropertySpec {
        name: "data-parsoid",
        default_content_type: "application/json; profile=mediawiki.org/specs/data-parsoid/1.0",
        accepts: &["application/json"],
        bundled: true,
    },
    PropertySpec {
        name: "wikitext",
        default_content_type: "text/plain; charset=UTF-8; profile=mediawiki.org/specs/wikitext/1.0.0",
        accepts: &["text/plain"],
        bundled: false,
    },
];

static PAGE_CONTENT: Capabilities = Capabilities {
    renders: true,
    properties: PAGE_PROPERTIES,
};

static KEY_VALUE: Capabilities = Capabilities {
    renders: false,
    properties: &[],
};

impl BucketKind {
    /// Parse the `type` field of a bucket spec.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pagecontent" => Some(BucketKind::PageContent),
            "kv" => Some(BucketKind::KeyValue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::PageContent => "pagecontent",
            BucketKind::KeyValue => "kv",
        }
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            BucketKind::PageContent => &PAGE_CONTENT,
            BucketKind::KeyValue => &KEY_VALUE,
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `text/html; charset=UTF-8` → `text/html`
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(BucketKind::parse("pagecontent"), Some(BucketKind::PageContent));
        assert_eq!(BucketKind::parse("kv"), Some(BucketKind::KeyValue));
        assert_eq!(BucketKind::parse("wazzle"), None);
        assert_eq!(BucketKind::parse(""), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&BucketKind::PageContent).unwrap();
        assert_eq!(json, "\"pagecontent\"");
        let kind: BucketKind = serde_json::from_str("\"kv\"").unwrap();
        assert_eq!(kind, BucketKind::KeyValue);
    }

    #[test]
    fn test_page_content_capabilities() {
        let caps = BucketKind::PageContent.capabilities();
        assert!(caps.renders);
        let html = caps.property("html").unwrap();
        assert_eq!(html.default_content_type, "text/html; charset=UTF-8");
        assert!(html.accepts_content_type("text/html; charset=UTF-8"));
        assert!(html.accepts_content_type("TEXT/HTML"));
        assert!(!html.accepts_content_type("application/json"));
        assert!(caps.property("data-parsoid").is_some());
        assert!(caps.property("nonsense").is_none());
    }

    #[test]
    fn test_html_and_data_parsoid_render_together() {
        let caps = BucketKind::PageContent.capabilities();
        let names = |p: &str| -> Vec<&'static str> { caps.render_group(p).iter().map(|s| s.name).collect() };
        assert_eq!(names("html"), vec!["html", "data-parsoid"]);
        assert_eq!(names("data-parsoid"), vec!["html", "data-parsoid"]);
        assert_eq!(names("wikitext"), vec!["wikitext"]);
        assert!(names("nonsense").is_empty());
    }

    #[test]
    fn test_key_value_has_no_properties() {
        let caps = BucketKind::KeyValue.capabilities();
        assert!(!caps.renders);
        assert!(!caps.has_properties());
    }
}
