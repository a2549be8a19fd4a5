//! Store trait and error types
//!
//! This module defines the persistence contract consumed by the orchestrator.

use crate::state::{JobStatus, PageSummary};
use crate::storage::{
    HeadingId, HeadingRecord, JobId, JobRecord, LinkId, LinkRecord, NewHeading, NewLink, OwnerId,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found for owner {owner}: {url}")]
    JobNotFound { owner: OwnerId, url: String },

    #[error("Job not found: {0}")]
    JobIdNotFound(JobId),

    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the error means the job row is not (yet) visible
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound { .. } | Self::JobIdNotFound(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence backend for crawl jobs and their child records
///
/// Implementations must be safe to share between a job's main sequence and
/// its verification tasks, and must accept verdict updates for links whose
/// job has already reached a terminal state.
#[async_trait]
pub trait Store: Send + Sync {
    // ===== Job Management =====

    /// Creates the job row in `pending` state
    ///
    /// Submitting an (owner, URL) pair that already has a row resets that row
    /// to `pending` and returns its existing id.
    async fn create_job(&self, owner: OwnerId, url: &str) -> StoreResult<JobId>;

    /// Looks up a job's id by (owner, URL), failing with `JobNotFound`
    async fn find_job_id(&self, owner: OwnerId, url: &str) -> StoreResult<JobId>;

    /// Gets a job by id
    async fn get_job(&self, job_id: JobId) -> StoreResult<JobRecord>;

    /// Sets the status of the (owner, URL) job; idempotent
    async fn set_status(&self, owner: OwnerId, url: &str, status: JobStatus) -> StoreResult<()>;

    /// Writes the final summary snapshot of a completed job
    async fn persist_summary(
        &self,
        owner: OwnerId,
        url: &str,
        summary: &PageSummary,
    ) -> StoreResult<()>;

    /// Deletes a job and, by cascade, its headings and links
    async fn delete_job(&self, job_id: JobId) -> StoreResult<()>;

    /// Removes headings and links left by a previous run of the job and
    /// resets its summary columns
    async fn clear_job_details(&self, job_id: JobId) -> StoreResult<()>;

    // ===== Child Records =====

    /// Persists one heading
    async fn create_heading(&self, job_id: JobId, heading: &NewHeading) -> StoreResult<HeadingId>;

    /// Persists one unprobed link (`status_code = 0`, `reachable = true`)
    async fn create_link(&self, job_id: JobId, link: &NewLink) -> StoreResult<LinkId>;

    /// Applies a probe verdict to a persisted link
    async fn update_link_verdict(
        &self,
        link_id: LinkId,
        status_code: u16,
        reachable: bool,
    ) -> StoreResult<()>;

    /// Gets a job's headings ordered by their order index
    async fn headings_for_job(&self, job_id: JobId) -> StoreResult<Vec<HeadingRecord>>;

    /// Gets a job's links in persistence order
    async fn links_for_job(&self, job_id: JobId) -> StoreResult<Vec<LinkRecord>>;
}
