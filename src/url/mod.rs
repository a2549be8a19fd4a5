//! URL handling module
//!
//! This module provides host extraction and link classification: resolving
//! a raw `href` against the document's base URL and labelling the result as
//! internal or external relative to the crawled page's host.

mod domain;

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub use domain::extract_host;

/// Whether a link points at the crawled page's own host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Internal,
    External,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link resolved to absolute form with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLink {
    pub url: Url,
    pub kind: LinkKind,
}

/// Classifies links found on one document
///
/// Holds the host links are compared against (the submitted URL's host) and
/// the document's effective base URL used to resolve relative references.
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    base_host: String,
    document_base: Url,
}

impl LinkClassifier {
    pub fn new(base_host: impl Into<String>, document_base: Url) -> Self {
        Self {
            base_host: base_host.into().to_lowercase(),
            document_base,
        }
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    /// Resolves and classifies one reference, or returns `None` to skip it
    pub fn classify(&self, candidate: &str) -> Option<ClassifiedLink> {
        classify_link(&self.base_host, &self.document_base, candidate)
    }
}

/// Resolves `candidate` against `document_base` and labels it
///
/// Returns `None` (skip) when the reference:
/// - is empty or whitespace
/// - is a same-document fragment (`#section`)
/// - fails to parse or resolve
/// - resolves to a scheme other than `http`/`https` (`mailto:`, `javascript:`, ...)
///
/// The kind is `Internal` only when the resolved host equals `base_host`
/// exactly (case-insensitive). `www.example.com` is external to `example.com`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_crawler::url::{classify_link, LinkKind};
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let link = classify_link("example.com", &base, "../about").unwrap();
/// assert_eq!(link.url.as_str(), "https://example.com/about");
/// assert_eq!(link.kind, LinkKind::Internal);
///
/// assert!(classify_link("example.com", &base, "mailto:hi@example.com").is_none());
/// ```
pub fn classify_link(base_host: &str, document_base: &Url, candidate: &str) -> Option<ClassifiedLink> {
    let candidate = candidate.trim();

    if candidate.is_empty() || candidate.starts_with('#') {
        return None;
    }

    let url = document_base.join(candidate).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = extract_host(&url)?;
    let kind = if host.eq_ignore_ascii_case(base_host) {
        LinkKind::Internal
    } else {
        LinkKind::External
    };

    Some(ClassifiedLink { url, kind })
}
