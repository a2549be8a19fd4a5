//! Output module for crawl job reports
//!
//! This module handles:
//! - Loading a job with its headings and links from the store
//! - Plain-text reports for the terminal
//! - Markdown report files

mod markdown;
mod report;
mod text;

pub use markdown::{format_markdown_report, write_markdown_report};
pub use report::{JobReport, OutputError, OutputResult};
pub use text::{format_text_report, print_report};

use crate::storage::{JobId, Store};

/// Loads the report of one job from the store
///
/// # Arguments
///
/// * `store` - The store containing crawl data
/// * `job_id` - The job to report on
///
/// # Returns
///
/// * `Ok(JobReport)` - The job with its headings and links
/// * `Err(OutputError)` - The job does not exist or the store failed
pub async fn load_report(store: &dyn Store, job_id: JobId) -> OutputResult<JobReport> {
    let job = store.get_job(job_id).await?;
    let headings = store.headings_for_job(job_id).await?;
    let links = store.links_for_job(job_id).await?;

    Ok(JobReport {
        job,
        headings,
        links,
    })
}
