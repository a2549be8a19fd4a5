//! Crawler module for single-page crawl jobs
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-host politeness throttling
//! - HTML extraction of doctype, title, headings, links and login forms
//! - Bounded link verification
//! - Job orchestration through the crawl lifecycle

mod extractor;
mod fetcher;
mod orchestrator;
mod throttle;
mod verifier;

pub use extractor::{
    classify_doctype, extract, ExtractedHeading, PageExtract, RawLink, LOGIN_KEYWORDS,
};
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, PageFetcher, MAX_REDIRECTS};
pub use orchestrator::{JobHandle, JobOutcome, Orchestrator, OrchestratorSettings};
pub use throttle::{HostPermit, HostThrottle};
pub use verifier::{HttpProber, LinkProber, LinkVerifier, ProbeSlot, Verdict};
