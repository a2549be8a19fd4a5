//! Page extractor
//!
//! Turns a fetched HTML document into the structural metadata of a crawl:
//! - document type classification
//! - title
//! - every `h1`-`h6` heading with its document-order index
//! - every `a[href]` reference with its anchor text
//! - the login form heuristic
//!
//! Extraction is best-effort and performs no I/O. Malformed markup never
//! fails; missing optional fields are simply absent.

use crate::state::DoctypeClass;
use scraper::{Html, Node, Selector};
use url::Url;

/// Keywords that flag a form as login-bearing (matched case-insensitively)
pub const LOGIN_KEYWORDS: [&str; 4] = ["login", "password", "username", "email"];

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

/// One heading in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedHeading {
    /// Tag name, `h1` through `h6`
    pub level: String,
    pub text: String,
    /// 1-based, shared across all levels
    pub order: u32,
}

/// One unresolved link reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    pub text: String,
}

/// Everything extracted from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtract {
    pub doctype: DoctypeClass,
    pub title: Option<String>,
    pub headings: Vec<ExtractedHeading>,
    pub links: Vec<RawLink>,
    pub has_login_form: bool,
    /// Raw `href` of the first `<base>` element, if any
    pub base_href: Option<String>,
}

impl PageExtract {
    /// The URL relative references resolve against
    ///
    /// This is the `<base href>` resolved against `page_url` when it yields an
    /// http(s) URL, otherwise `page_url` itself.
    pub fn effective_base(&self, page_url: &Url) -> Url {
        self.base_href
            .as_deref()
            .and_then(|href| page_url.join(href.trim()).ok())
            .filter(|base| matches!(base.scheme(), "http" | "https"))
            .unwrap_or_else(|| page_url.clone())
    }
}

/// Extracts the page metadata from an HTML document
///
/// # Arguments
///
/// * `html` - The HTML content to parse
///
/// # Example
///
/// ```
/// use seo_crawler::crawler::extract;
/// use seo_crawler::state::DoctypeClass;
///
/// let page = extract("<!DOCTYPE html><title> Hi </title><h1>One</h1><h2>Two</h2>");
/// assert_eq!(page.doctype, DoctypeClass::Modern);
/// assert_eq!(page.title.as_deref(), Some("Hi"));
/// assert_eq!(page.headings[1].order, 2);
/// ```
pub fn extract(html: &str) -> PageExtract {
    let document = Html::parse_document(html);

    PageExtract {
        doctype: classify_doctype(&document),
        title: extract_title(&document),
        headings: extract_headings(&document),
        links: extract_links(&document),
        has_login_form: detect_login_form(&document),
        base_href: first_attr(&document, "base[href]", "href"),
    }
}

/// Classifies the document type declaration
///
/// `<!DOCTYPE html>` (any case, optionally with the `about:legacy-compat`
/// system id) is modern; any other declaration is legacy; no declaration is
/// unknown.
pub fn classify_doctype(document: &Html) -> DoctypeClass {
    let doctype = document.tree.root().children().find_map(|node| match node.value() {
        Node::Doctype(doctype) => Some(doctype),
        _ => None,
    });

    match doctype {
        None => DoctypeClass::Unknown,
        Some(d) => {
            let modern = d.name().eq_ignore_ascii_case("html")
                && d.public_id().is_empty()
                && (d.system_id().is_empty()
                    || d.system_id().eq_ignore_ascii_case("about:legacy-compat"));
            if modern {
                DoctypeClass::Modern
            } else {
                DoctypeClass::Legacy
            }
        }
    }
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::error!("Invalid selector {}: {:?}", css, e);
            None
        }
    }
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(str::to_string)
}

/// Extracts the first title element's trimmed text
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn extract_headings(document: &Html) -> Vec<ExtractedHeading> {
    let Some(heading_selector) = selector(HEADING_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&heading_selector)
        .zip(1u32..)
        .map(|(element, order)| ExtractedHeading {
            level: element.value().name().to_ascii_lowercase(),
            text: element_text(element),
            order,
        })
        .collect()
}

fn extract_links(document: &Html) -> Vec<RawLink> {
    let Some(link_selector) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&link_selector)
        .filter_map(|element| {
            element.value().attr("href").map(|href| RawLink {
                href: href.to_string(),
                text: element_text(element),
            })
        })
        .collect()
}

fn detect_login_form(document: &Html) -> bool {
    let Some(form_selector) = selector("form") else {
        return false;
    };

    document.select(&form_selector).any(|form| {
        let contents = form.inner_html().to_lowercase();
        LOGIN_KEYWORDS.iter().any(|keyword| contents.contains(keyword))
    })
}
