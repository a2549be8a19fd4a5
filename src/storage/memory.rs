//! In-memory storage implementation
//!
//! Backs the orchestrator in unit tests and in embedders that do not need
//! durability. A [`FailurePlan`] can inject the failure modes a real store
//! exhibits: lookups that miss while the row propagates, and individual
//! writes that fail.

use crate::state::{JobStatus, PageSummary};
use crate::storage::traits::{Store, StoreError, StoreResult};
use crate::storage::{
    HeadingId, HeadingRecord, JobId, JobRecord, LinkId, LinkRecord, NewHeading, NewLink, OwnerId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Failures to inject into a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    /// Number of `find_job_id` calls that miss before the row becomes visible
    pub hidden_lookups: u32,
    /// Heading order indexes whose writes fail
    pub failing_heading_orders: HashSet<u32>,
    /// Link writes fail when the URL contains any of these fragments
    pub failing_link_fragments: Vec<String>,
    /// Verdict writes fail for links whose URL contains any of these fragments
    pub failing_verdict_fragments: Vec<String>,
    pub fail_persist_summary: bool,
}

impl FailurePlan {
    /// Lookups miss `count` times before succeeding
    pub fn hide_job_for(mut self, count: u32) -> Self {
        self.hidden_lookups = count;
        self
    }

    /// Lookups never succeed
    pub fn never_find_job(self) -> Self {
        self.hide_job_for(u32::MAX)
    }

    pub fn fail_heading(mut self, order: u32) -> Self {
        self.failing_heading_orders.insert(order);
        self
    }

    pub fn fail_link_containing(mut self, fragment: impl Into<String>) -> Self {
        self.failing_link_fragments.push(fragment.into());
        self
    }

    pub fn fail_verdict_containing(mut self, fragment: impl Into<String>) -> Self {
        self.failing_verdict_fragments.push(fragment.into());
        self
    }

    pub fn fail_summary(mut self) -> Self {
        self.fail_persist_summary = true;
        self
    }
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    jobs: BTreeMap<JobId, JobRecord>,
    links: BTreeMap<LinkId, LinkRecord>,
    headings: BTreeMap<HeadingId, HeadingRecord>,
    lookups: u32,
    writes: usize,
    history: HashMap<(OwnerId, String), Vec<JobStatus>>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn job_by_key(&mut self, owner: OwnerId, url: &str) -> Option<&mut JobRecord> {
        self.jobs
            .values_mut()
            .find(|job| job.owner == owner && job.url == url)
    }
}

/// Store backed by in-process maps
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    plan: FailurePlan,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(plan: FailurePlan) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            plan,
        }
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    /// Every status written for (owner, URL), in order
    pub fn status_history(&self, owner: OwnerId, url: &str) -> Vec<JobStatus> {
        self.tables()
            .ok()
            .and_then(|t| t.history.get(&(owner, url.to_string())).cloned())
            .unwrap_or_default()
    }

    /// Number of write operations attempted since creation, job creation excluded
    pub fn write_count(&self) -> usize {
        self.tables().map(|t| t.writes).unwrap_or(0)
    }

    /// Number of `find_job_id` calls served so far
    pub fn lookup_count(&self) -> u32 {
        self.tables().map(|t| t.lookups).unwrap_or(0)
    }

    fn matches_any(url: &str, fragments: &[String]) -> bool {
        fragments.iter().any(|f| url.contains(f.as_str()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_job(&self, owner: OwnerId, url: &str) -> StoreResult<JobId> {
        let mut tables = self.tables()?;
        let now = Utc::now().to_rfc3339();

        if let Some(job) = tables.job_by_key(owner, url) {
            job.status = JobStatus::Pending;
            job.updated_at = now;
            return Ok(job.id);
        }

        let id = tables.allocate_id();
        tables.jobs.insert(
            id,
            JobRecord {
                id,
                owner,
                url: url.to_string(),
                status: JobStatus::Pending,
                summary: PageSummary::default(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_job_id(&self, owner: OwnerId, url: &str) -> StoreResult<JobId> {
        let mut tables = self.tables()?;
        tables.lookups = tables.lookups.saturating_add(1);

        let not_found = || StoreError::JobNotFound {
            owner,
            url: url.to_string(),
        };

        if tables.lookups <= self.plan.hidden_lookups {
            return Err(not_found());
        }
        tables.job_by_key(owner, url).map(|job| job.id).ok_or_else(not_found)
    }

    async fn get_job(&self, job_id: JobId) -> StoreResult<JobRecord> {
        self.tables()?
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::JobIdNotFound(job_id))
    }

    async fn set_status(&self, owner: OwnerId, url: &str, status: JobStatus) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        tables
            .history
            .entry((owner, url.to_string()))
            .or_default()
            .push(status);

        if let Some(job) = tables.job_by_key(owner, url) {
            job.status = status;
            job.updated_at = Utc::now().to_rfc3339();
        }
        Ok(())
    }

    async fn persist_summary(
        &self,
        owner: OwnerId,
        url: &str,
        summary: &PageSummary,
    ) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        if self.plan.fail_persist_summary {
            return Err(StoreError::Unavailable("summary write rejected".to_string()));
        }

        let job = tables
            .job_by_key(owner, url)
            .ok_or_else(|| StoreError::JobNotFound {
                owner,
                url: url.to_string(),
            })?;
        job.summary = summary.clone();
        job.updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    async fn delete_job(&self, job_id: JobId) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        if tables.jobs.remove(&job_id).is_none() {
            return Err(StoreError::JobIdNotFound(job_id));
        }
        tables.links.retain(|_, link| link.job_id != job_id);
        tables.headings.retain(|_, heading| heading.job_id != job_id);
        Ok(())
    }

    async fn clear_job_details(&self, job_id: JobId) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        tables.links.retain(|_, link| link.job_id != job_id);
        tables.headings.retain(|_, heading| heading.job_id != job_id);
        if let Some(job) = tables.jobs.get_mut(&job_id) {
            job.summary = PageSummary::default();
        }
        Ok(())
    }

    async fn create_heading(&self, job_id: JobId, heading: &NewHeading) -> StoreResult<HeadingId> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        if self.plan.failing_heading_orders.contains(&heading.order) {
            return Err(StoreError::Unavailable(format!(
                "heading {} rejected",
                heading.order
            )));
        }

        let id = tables.allocate_id();
        tables.headings.insert(
            id,
            HeadingRecord {
                id,
                job_id,
                level: heading.level.clone(),
                text: heading.text.clone(),
                order: heading.order,
            },
        );
        Ok(id)
    }

    async fn create_link(&self, job_id: JobId, link: &NewLink) -> StoreResult<LinkId> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        if Self::matches_any(&link.url, &self.plan.failing_link_fragments) {
            return Err(StoreError::Unavailable(format!("link {} rejected", link.url)));
        }

        let id = tables.allocate_id();
        tables.links.insert(
            id,
            LinkRecord {
                id,
                job_id,
                url: link.url.clone(),
                text: link.text.clone(),
                kind: link.kind,
                status_code: 0,
                reachable: true,
            },
        );
        Ok(id)
    }

    async fn update_link_verdict(
        &self,
        link_id: LinkId,
        status_code: u16,
        reachable: bool,
    ) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.writes += 1;
        let link = tables
            .links
            .get_mut(&link_id)
            .ok_or(StoreError::LinkNotFound(link_id))?;

        if Self::matches_any(&link.url, &self.plan.failing_verdict_fragments) {
            return Err(StoreError::Unavailable(format!("verdict for {} rejected", link.url)));
        }
        link.status_code = status_code;
        link.reachable = reachable;
        Ok(())
    }

    async fn headings_for_job(&self, job_id: JobId) -> StoreResult<Vec<HeadingRecord>> {
        let mut headings: Vec<HeadingRecord> = self
            .tables()?
            .headings
            .values()
            .filter(|h| h.job_id == job_id)
            .cloned()
            .collect();
        headings.sort_by_key(|h| h.order);
        Ok(headings)
    }

    async fn links_for_job(&self, job_id: JobId) -> StoreResult<Vec<LinkRecord>> {
        Ok(self
            .tables()?
            .links
            .values()
            .filter(|l| l.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::LinkKind;

    #[tokio::test]
    async fn test_hidden_lookups_then_visible() {
        let store = MemoryStore::with_failures(FailurePlan::default().hide_job_for(2));
        let id = store.create_job(1, "https://example.com/").await.unwrap();

        assert!(store.find_job_id(1, "https://example.com/").await.is_err());
        assert!(store.find_job_id(1, "https://example.com/").await.is_err());
        assert_eq!(store.find_job_id(1, "https://example.com/").await.unwrap(), id);
        assert_eq!(store.lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_status_history_and_write_count() {
        let store = MemoryStore::new();
        store.create_job(1, "https://example.com/").await.unwrap();
        store.set_status(1, "https://example.com/", JobStatus::Running).await.unwrap();
        store.set_status(1, "https://example.com/", JobStatus::Done).await.unwrap();

        assert_eq!(
            store.status_history(1, "https://example.com/"),
            vec![JobStatus::Running, JobStatus::Done]
        );
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_link_failure() {
        let store = MemoryStore::with_failures(FailurePlan::default().fail_link_containing("/bad"));
        let job = store.create_job(1, "https://example.com/").await.unwrap();

        let bad = NewLink {
            url: "https://example.com/bad".to_string(),
            text: String::new(),
            kind: LinkKind::Internal,
        };
        let good = NewLink {
            url: "https://example.com/good".to_string(),
            ..bad.clone()
        };

        assert!(store.create_link(job, &bad).await.is_err());
        assert!(store.create_link(job, &good).await.is_ok());
        assert_eq!(store.links_for_job(job).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_job_resets_existing() {
        let store = MemoryStore::new();
        let id = store.create_job(3, "https://example.com/").await.unwrap();
        store.set_status(3, "https://example.com/", JobStatus::Error).await.unwrap();

        assert_eq!(store.create_job(3, "https://example.com/").await.unwrap(), id);
        assert_eq!(store.get_job(id).await.unwrap().status, JobStatus::Pending);
    }
}
