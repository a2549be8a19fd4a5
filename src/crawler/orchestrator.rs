//! Crawl orchestrator - runs crawl jobs through their lifecycle
//!
//! Each submitted job runs as one supervised task that:
//! - resolves the job id, tolerating a short propagation delay
//! - moves the job to `running` and fetches its page
//! - persists every heading and link as it is extracted
//! - dispatches every persisted link to the shared verification pool
//! - persists the final summary and moves the job to `done`
//!
//! Only lookup exhaustion, fetch failure and failed job-level writes end a
//! job in `error`. Per-heading, per-link and per-verdict failures are logged
//! and skipped.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::verifier::LinkVerifier;
use crate::state::{JobStatus, PageSummary, StatusTracker, SummaryAccumulator};
use crate::storage::{JobId, LinkId, NewHeading, NewLink, OwnerId, Store};
use crate::url::{extract_host, LinkClassifier};
use crate::CrawlError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use url::Url;

/// Orchestrator behavior knobs
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Job id lookups attempted before the job fails
    pub lookup_attempts: u32,
    /// Fixed delay between lookups
    pub lookup_backoff: Duration,
    /// Wait for dispatched verifications before persisting the summary
    pub await_verification: bool,
    /// Probes without a slot this long after dispatch starts are skipped
    pub verification_deadline: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for OrchestratorSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            lookup_attempts: config.lookup_attempts,
            lookup_backoff: config.lookup_backoff(),
            await_verification: config.await_verification,
            verification_deadline: config.verification_deadline(),
        }
    }
}

/// What a finished job task reports
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub owner: OwnerId,
    pub url: String,
    /// `None` when the job id was never resolved
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    /// In-memory summary after all verification tasks finished
    pub summary: PageSummary,
    /// The snapshot written to the store, present only for `done` jobs
    pub persisted_summary: Option<PageSummary>,
    pub headings_persisted: u32,
    pub links_persisted: u32,
    pub verdicts_applied: u32,
    /// Description of the failure for `error` jobs
    pub error: Option<String>,
}

impl JobOutcome {
    fn unresolved(owner: OwnerId, url: String, error: &CrawlError) -> Self {
        Self {
            owner,
            url,
            job_id: None,
            status: JobStatus::Error,
            summary: PageSummary::default(),
            persisted_summary: None,
            headings_persisted: 0,
            links_persisted: 0,
            verdicts_applied: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Handle to a submitted job
pub struct JobHandle {
    owner: OwnerId,
    url: String,
    stop: Arc<watch::Sender<bool>>,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests the job to stop; observed at the job's next checkpoint
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the job task, including its trailing verifications
    pub async fn wait(self) -> Result<JobOutcome, CrawlError> {
        self.task
            .await
            .map_err(|e| CrawlError::Task(format!("job {} for owner {}: {}", self.url, self.owner, e)))
    }
}

struct ActiveJob {
    run_id: u64,
    stop: Arc<watch::Sender<bool>>,
}

struct Inner {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn PageFetcher>,
    verifier: LinkVerifier,
    settings: OrchestratorSettings,
    active: Mutex<HashMap<(OwnerId, String), ActiveJob>>,
    next_run: AtomicU64,
}

/// Runs crawl jobs; cheap to clone, clones share jobs and the probe pool
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `fetcher` - Fetches job pages
    /// * `verifier` - Shared link verification pool
    /// * `settings` - Lookup and verification behavior
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn PageFetcher>,
        verifier: LinkVerifier,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                fetcher,
                verifier,
                settings,
                active: Mutex::new(HashMap::new()),
                next_run: AtomicU64::new(0),
            }),
        }
    }

    /// Builds an HTTP-backed orchestrator over `store`
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self, CrawlError> {
        let fetcher = HttpFetcher::from_config(config)?;
        let verifier = LinkVerifier::from_config(config)?;
        Ok(Self::new(
            store,
            Arc::new(fetcher),
            verifier,
            OrchestratorSettings::from(&config.crawler),
        ))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Starts the job for (owner, URL) and returns immediately
    ///
    /// The caller must have created the job row (`Store::create_job`). The
    /// row may become visible to lookups slightly later.
    pub fn submit(&self, owner: OwnerId, url: impl Into<String>) -> JobHandle {
        let url = url.into();
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let run_id = self.inner.next_run.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.inner.active().insert(
            (owner, url.clone()),
            ActiveJob {
                run_id,
                stop: Arc::clone(&stop_tx),
            },
        ) {
            tracing::warn!(
                "Job {} for owner {} submitted while run {} is still active",
                url,
                owner,
                previous.run_id
            );
        }

        let inner = Arc::clone(&self.inner);
        let task_url = url.clone();
        let task = tokio::spawn(async move {
            let outcome = Arc::clone(&inner).run_job(owner, task_url.clone(), stop_rx).await;
            inner.unregister(owner, &task_url, run_id);
            outcome
        });

        JobHandle {
            owner,
            url,
            stop: stop_tx,
            task,
        }
    }

    /// Resets each job to `pending` and submits it again
    pub async fn rerun(&self, owner: OwnerId, urls: &[String]) -> Result<Vec<JobHandle>, CrawlError> {
        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            self.inner.store.create_job(owner, url).await?;
            tracing::info!("Re-running {} for owner {}", url, owner);
            handles.push(self.submit(owner, url.clone()));
        }
        Ok(handles)
    }

    /// Delivers a stop request to the active job for (owner, URL)
    ///
    /// Returns `false` when no such job is active.
    pub fn stop(&self, owner: OwnerId, url: &str) -> bool {
        match self.inner.active().get(&(owner, url.to_string())) {
            Some(job) => {
                job.stop.send_replace(true);
                tracing::info!("Stop requested for {} (owner {})", url, owner);
                true
            }
            None => false,
        }
    }

    /// Delivers a stop request to every active job, returning how many
    pub fn stop_all(&self) -> usize {
        let active = self.inner.active();
        for job in active.values() {
            job.stop.send_replace(true);
        }
        active.len()
    }

    /// (owner, URL) of every job whose task has not finished
    pub fn active_jobs(&self) -> Vec<(OwnerId, String)> {
        let mut jobs: Vec<_> = self.inner.active().keys().cloned().collect();
        jobs.sort();
        jobs
    }
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashMap<(OwnerId, String), ActiveJob>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unregister(&self, owner: OwnerId, url: &str, run_id: u64) {
        let mut active = self.active();
        let key = (owner, url.to_string());
        if active.get(&key).map(|job| job.run_id) == Some(run_id) {
            active.remove(&key);
        }
    }

    async fn lookup_job(&self, owner: OwnerId, url: &str) -> Result<JobId, CrawlError> {
        let attempts = self.settings.lookup_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.store.find_job_id(owner, url).await {
                Ok(job_id) => return Ok(job_id),
                Err(e) => {
                    tracing::debug!(
                        "Lookup {}/{} for {} (owner {}) missed: {}",
                        attempt,
                        attempts,
                        url,
                        owner,
                        e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.lookup_backoff).await;
            }
        }

        Err(match last_error {
            Some(e) if !e.is_not_found() => CrawlError::Store(e),
            _ => CrawlError::JobNotFound {
                owner,
                url: url.to_string(),
                attempts,
            },
        })
    }

    async fn run_job(
        self: Arc<Self>,
        owner: OwnerId,
        url: String,
        stop: watch::Receiver<bool>,
    ) -> JobOutcome {
        let job_id = match self.lookup_job(owner, &url).await {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::error!("Job {} for owner {} failed before start: {}", url, owner, e);
                if let Err(write_err) = self.store.set_status(owner, &url, JobStatus::Error).await {
                    tracing::error!("Failed to mark {} as error: {}", url, write_err);
                }
                return JobOutcome::unresolved(owner, url, &e);
            }
        };

        let mut run = JobRun {
            inner: self,
            owner,
            url,
            job_id,
            tracker: StatusTracker::new(),
            summary: Arc::new(SummaryAccumulator::new()),
            verifications: JoinSet::new(),
            stop,
            headings_persisted: 0,
            links_persisted: 0,
            persisted_summary: None,
        };

        let error = match run.execute().await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Job {} (id {}) failed: {}", run.url, run.job_id, e);
                run.fail().await;
                Some(e.to_string())
            }
        };

        run.drain_verifications().await;
        run.into_outcome(error)
    }
}

/// Resolves once a stop has been requested
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            if *stop.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}

async fn join_all(verifications: &mut JoinSet<()>) {
    while let Some(result) = verifications.join_next().await {
        if let Err(e) = result {
            tracing::warn!("Verification task failed: {}", e);
        }
    }
}

/// State of one job run
struct JobRun {
    inner: Arc<Inner>,
    owner: OwnerId,
    url: String,
    job_id: JobId,
    tracker: StatusTracker,
    summary: Arc<SummaryAccumulator>,
    verifications: JoinSet<()>,
    stop: watch::Receiver<bool>,
    headings_persisted: u32,
    links_persisted: u32,
    persisted_summary: Option<PageSummary>,
}

impl JobRun {
    async fn execute(&mut self) -> Result<(), CrawlError> {
        if self.stop_requested() {
            return self.transition(JobStatus::Stopped).await;
        }

        self.transition(JobStatus::Running).await?;
        tracing::info!("Crawling {} (job {}, owner {})", self.url, self.job_id, self.owner);

        self.inner.store.clear_job_details(self.job_id).await?;

        let page_url = Url::parse(&self.url)?;
        let base_host = extract_host(&page_url).ok_or_else(|| CrawlError::MissingHost {
            url: self.url.clone(),
        })?;

        let fetcher = Arc::clone(&self.inner.fetcher);
        let fetched = {
            let stop = &mut self.stop;
            tokio::select! {
                page = fetcher.fetch(&page_url) => Some(page),
                _ = wait_for_stop(stop) => None,
            }
        };
        let page = match fetched {
            Some(page) => page?,
            None => return self.finish_stopped().await,
        };

        let extracted = extract(&page.body);
        self.summary.record_page(
            extracted.doctype,
            extracted.title.clone(),
            extracted.has_login_form,
        );

        for heading in &extracted.headings {
            self.summary.record_heading(&heading.level);
            let new_heading = NewHeading {
                level: heading.level.clone(),
                text: heading.text.clone(),
                order: heading.order,
            };
            let created = self.inner.store.create_heading(self.job_id, &new_heading).await;
            match created {
                Ok(_) => self.headings_persisted += 1,
                Err(e) => tracing::warn!(
                    "Skipping heading {} of {}: {}",
                    heading.order,
                    self.url,
                    e
                ),
            }
        }

        if self.stop_requested() {
            return self.finish_stopped().await;
        }

        let classifier = LinkClassifier::new(base_host, extracted.effective_base(&page.final_url));
        let deadline = self
            .inner
            .settings
            .verification_deadline
            .map(|limit| Instant::now() + limit);

        for raw in &extracted.links {
            let Some(link) = classifier.classify(&raw.href) else {
                tracing::trace!("Skipping reference {:?} on {}", raw.href, self.url);
                continue;
            };

            let new_link = NewLink {
                url: link.url.to_string(),
                text: raw.text.clone(),
                kind: link.kind,
            };
            let created = self.inner.store.create_link(self.job_id, &new_link).await;
            match created {
                Ok(link_id) => {
                    self.summary.record_link(link.kind);
                    self.links_persisted += 1;
                    self.dispatch_verification(link_id, link.url, deadline);
                }
                Err(e) => tracing::warn!("Skipping link {} of {}: {}", link.url, self.url, e),
            }
        }

        tracing::debug!(
            "Extracted {} headings and {} links from {}",
            self.headings_persisted,
            self.links_persisted,
            self.url
        );

        if self.inner.settings.await_verification {
            let finished = {
                let stop = &mut self.stop;
                let verifications = &mut self.verifications;
                tokio::select! {
                    _ = join_all(verifications) => true,
                    _ = wait_for_stop(stop) => false,
                }
            };
            if !finished {
                return self.finish_stopped().await;
            }
        }

        if self.stop_requested() {
            return self.finish_stopped().await;
        }

        let snapshot = self.summary.snapshot();
        self.inner
            .store
            .persist_summary(self.owner, &self.url, &snapshot)
            .await?;
        self.persisted_summary = Some(snapshot);

        self.transition(JobStatus::Done).await?;
        tracing::info!(
            "Finished {} (job {}): {} links, {} headings",
            self.url,
            self.job_id,
            self.links_persisted,
            self.headings_persisted
        );
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Writes `next` to the store, then records it locally
    async fn transition(&mut self, next: JobStatus) -> Result<(), CrawlError> {
        let current = self.tracker.current();
        if !current.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        self.inner.store.set_status(self.owner, &self.url, next).await?;
        self.tracker.advance(next)?;
        tracing::debug!("Job {}: {} -> {}", self.job_id, current, next);
        Ok(())
    }

    async fn finish_stopped(&mut self) -> Result<(), CrawlError> {
        self.transition(JobStatus::Stopped).await?;
        tracing::info!("Stopped {} (job {})", self.url, self.job_id);
        Ok(())
    }

    async fn fail(&mut self) {
        if !self.tracker.current().can_transition_to(JobStatus::Error) {
            return;
        }
        if let Err(e) = self.transition(JobStatus::Error).await {
            tracing::error!("Failed to mark job {} as error: {}", self.job_id, e);
        }
    }

    fn dispatch_verification(&mut self, link_id: LinkId, url: Url, deadline: Option<Instant>) {
        let verifier = self.inner.verifier.clone();
        let store = Arc::clone(&self.inner.store);
        let summary = Arc::clone(&self.summary);
        let mut stop = self.stop.clone();

        self.verifications.spawn(async move {
            let slot = tokio::select! {
                biased;
                slot = verifier.acquire_slot(deadline) => slot,
                _ = wait_for_stop(&mut stop) => None,
            };
            let Some(slot) = slot else {
                tracing::debug!("Probe of {} skipped", url);
                return;
            };

            let verdict = verifier.probe(slot, &url).await;
            match store
                .update_link_verdict(link_id, verdict.status_code, verdict.reachable)
                .await
            {
                Ok(()) => summary.record_verdict(verdict.reachable),
                Err(e) => tracing::warn!("Failed to record verdict for {}: {}", url, e),
            }
        });
    }

    async fn drain_verifications(&mut self) {
        if !self.verifications.is_empty() {
            tracing::debug!(
                "Waiting for {} verification tasks of job {}",
                self.verifications.len(),
                self.job_id
            );
        }
        join_all(&mut self.verifications).await;
    }

    fn into_outcome(self, error: Option<String>) -> JobOutcome {
        JobOutcome {
            owner: self.owner,
            job_id: Some(self.job_id),
            status: self.tracker.current(),
            summary: self.summary.snapshot(),
            persisted_summary: self.persisted_summary,
            headings_persisted: self.headings_persisted,
            links_persisted: self.links_persisted,
            verdicts_applied: self.summary.verdicts_applied(),
            error,
            url: self.url,
        }
    }
}
