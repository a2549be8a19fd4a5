//! Report data assembled from the store
//!
//! A [`JobReport`] is the read-side view of one job: its row, its headings
//! in document order and its links in discovery order.

use crate::storage::{HeadingRecord, JobRecord, LinkRecord, StoreError};
use crate::url::LinkKind;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything known about one crawl job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: JobRecord,
    pub headings: Vec<HeadingRecord>,
    pub links: Vec<LinkRecord>,
}

impl JobReport {
    pub fn links_of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &LinkRecord> {
        self.links.iter().filter(move |link| link.kind == kind)
    }

    /// Links with an unreachable verdict
    pub fn broken_links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.iter().filter(|link| !link.reachable)
    }

    /// Links that never received a verdict
    pub fn unprobed_links(&self) -> usize {
        self.links
            .iter()
            .filter(|link| link.reachable && link.status_code == 0)
            .count()
    }
}
