//! The per-page aggregate and its shared accumulator
//!
//! The orchestrator's main sequence records page facts and link counts while
//! trailing verification tasks record verdicts. Both go through one mutex so
//! counts are never lost and only ever grow.

use crate::url::LinkKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Classification of a document's doctype declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctypeClass {
    /// `<!DOCTYPE html>` with no public or system identifier
    Modern,
    /// Any other doctype declaration (HTML 4.01, XHTML, ...)
    Legacy,
    /// No doctype declaration found
    Unknown,
}

impl DoctypeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Legacy => "legacy",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "modern" => Some(Self::Modern),
            "legacy" => Some(Self::Legacy),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DoctypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregate extracted from one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// Doctype classification, `None` until the page has been extracted
    pub doctype: Option<DoctypeClass>,

    /// Trimmed text of the first `<title>`
    pub title: Option<String>,

    /// Heading tag (`h1`..`h6`) -> number of headings with that tag
    pub headings: BTreeMap<String, u32>,

    pub internal_links: u32,
    pub external_links: u32,

    /// Links whose probe failed or returned a status >= 400
    pub inaccessible_links: u32,

    pub has_login_form: bool,
}

impl PageSummary {
    /// Internal plus external links
    pub fn total_links(&self) -> u32 {
        self.internal_links + self.external_links
    }

    /// Number of headings across all levels
    pub fn total_headings(&self) -> u32 {
        self.headings.values().sum()
    }
}

#[derive(Debug, Default)]
struct Accumulated {
    summary: PageSummary,
    verdicts_applied: u32,
}

/// Mutex-guarded `PageSummary` shared between a job and its probe tasks
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    inner: Mutex<Accumulated>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    // Updates are single field writes; a poisoned lock still holds valid counts.
    fn lock(&self) -> MutexGuard<'_, Accumulated> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the page-level facts produced by extraction
    pub fn record_page(&self, doctype: DoctypeClass, title: Option<String>, has_login_form: bool) {
        let mut acc = self.lock();
        acc.summary.doctype = Some(doctype);
        acc.summary.title = title;
        acc.summary.has_login_form |= has_login_form;
    }

    /// Counts one heading with the given tag
    pub fn record_heading(&self, level: &str) {
        let mut acc = self.lock();
        *acc.summary.headings.entry(level.to_string()).or_insert(0) += 1;
    }

    /// Counts one persisted link
    pub fn record_link(&self, kind: LinkKind) {
        let mut acc = self.lock();
        match kind {
            LinkKind::Internal => acc.summary.internal_links += 1,
            LinkKind::External => acc.summary.external_links += 1,
        }
    }

    /// Applies one verdict
    pub fn record_verdict(&self, reachable: bool) {
        let mut acc = self.lock();
        acc.verdicts_applied += 1;
        if !reachable {
            acc.summary.inaccessible_links += 1;
        }
    }

    /// Copy of the current summary
    pub fn snapshot(&self) -> PageSummary {
        self.lock().summary.clone()
    }

    /// Number of verdicts applied so far
    pub fn verdicts_applied(&self) -> u32 {
        self.lock().verdicts_applied
    }
}
