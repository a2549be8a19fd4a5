//! Storage module for persisting crawl jobs and their results
//!
//! The orchestrator talks to persistence only through the [`Store`] trait.
//! This module provides:
//! - the trait and its error type
//! - a SQLite implementation used by the binary
//! - an in-memory implementation for tests and embedding

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::{FailurePlan, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreError, StoreResult};

use crate::state::{JobStatus, PageSummary};
use crate::url::LinkKind;

/// Identity of the principal that owns a job
pub type OwnerId = i64;

/// Identity of a crawl job, assigned by the store
pub type JobId = i64;

/// Identity of a persisted link, assigned by the store
pub type LinkId = i64;

/// Identity of a persisted heading, assigned by the store
pub type HeadingId = i64;

/// Represents a crawl job in the store
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub owner: OwnerId,
    pub url: String,
    pub status: JobStatus,
    /// Last persisted snapshot; default until the job first reaches `done`
    pub summary: PageSummary,
    pub created_at: String,
    pub updated_at: String,
}

/// One outbound link discovered on a crawled page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: LinkId,
    pub job_id: JobId,
    pub url: String,
    pub text: String,
    pub kind: LinkKind,
    /// Probe status code, 0 until probed or when the probe failed
    pub status_code: u16,
    /// Reachability verdict, true until proven otherwise
    pub reachable: bool,
}

/// A link about to be persisted (unprobed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub url: String,
    pub text: String,
    pub kind: LinkKind,
}

/// One heading element of a crawled page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    pub id: HeadingId,
    pub job_id: JobId,
    /// Tag name, `h1` through `h6`
    pub level: String,
    pub text: String,
    /// 1-based position among all headings of the page
    pub order: u32,
}

/// A heading about to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHeading {
    pub level: String,
    pub text: String,
    pub order: u32,
}
