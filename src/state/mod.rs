//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobStatus`: lifecycle of one crawl job (pending, running, done, error, stopped)
//! - `HostState`: per-host politeness state (concurrency slots, request counts)
//! - `PageSummary` / `SummaryAccumulator`: the aggregate extracted from one page
//!   and its synchronized in-memory accumulator

mod host_state;
mod job_status;
mod summary;

// Re-export main types
pub use host_state::HostState;
pub use job_status::{JobStatus, StatusTracker};
pub use summary::{DoctypeClass, PageSummary, SummaryAccumulator};
