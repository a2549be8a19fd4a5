//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::state::{DoctypeClass, JobStatus, PageSummary};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StoreError, StoreResult};
use crate::storage::{
    HeadingId, HeadingRecord, JobId, JobRecord, LinkId, LinkRecord, NewHeading, NewLink, OwnerId,
};
use crate::url::LinkKind;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const JOB_COLUMNS: &str = "id, owner_id, url, status, doctype, title, headings, internal_links,
     external_links, inaccessible_links, has_login_form, created_at, updated_at";

/// SQLite storage backend
///
/// A single connection is shared behind a mutex; every operation is a short
/// synchronous statement so the lock is never held across an await.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn unknown_value(idx: usize, value: String) -> rusqlite::Error {
    conversion_error(
        idx,
        StoreError::Serialization(format!("unknown value '{}'", value)),
    )
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(3)?;
    let status = JobStatus::from_db_string(&status).ok_or_else(|| unknown_value(3, status))?;

    let doctype = match row.get::<_, Option<String>>(4)? {
        Some(s) => Some(DoctypeClass::from_db_string(&s).ok_or_else(|| unknown_value(4, s))?),
        None => None,
    };

    let headings_json: String = row.get(6)?;
    let headings: BTreeMap<String, u32> =
        serde_json::from_str(&headings_json).map_err(|e| conversion_error(6, e))?;

    Ok(JobRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        url: row.get(2)?,
        status,
        summary: PageSummary {
            doctype,
            title: row.get(5)?,
            headings,
            internal_links: row.get(7)?,
            external_links: row.get(8)?,
            inaccessible_links: row.get(9)?,
            has_login_form: row.get(10)?,
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_link(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    let kind: String = row.get(4)?;
    let kind = LinkKind::from_db_string(&kind).ok_or_else(|| unknown_value(4, kind))?;

    Ok(LinkRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        text: row.get(3)?,
        kind,
        status_code: row.get(5)?,
        reachable: row.get(6)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    // ===== Job Management =====

    async fn create_job(&self, owner: OwnerId, url: &str) -> StoreResult<JobId> {
        let conn = self.conn()?;
        let now = now();
        conn.execute(
            "INSERT INTO crawl_jobs (owner_id, url, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner_id, url) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
            params![owner, url, JobStatus::Pending.to_db_string(), now],
        )?;

        let id = conn.query_row(
            "SELECT id FROM crawl_jobs WHERE owner_id = ?1 AND url = ?2",
            params![owner, url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    async fn find_job_id(&self, owner: OwnerId, url: &str) -> StoreResult<JobId> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id FROM crawl_jobs WHERE owner_id = ?1 AND url = ?2",
            params![owner, url],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::JobNotFound {
            owner,
            url: url.to_string(),
        })
    }

    async fn get_job(&self, job_id: JobId) -> StoreResult<JobRecord> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS);
        conn.query_row(&sql, params![job_id], row_to_job)
            .optional()?
            .ok_or(StoreError::JobIdNotFound(job_id))
    }

    async fn set_status(&self, owner: OwnerId, url: &str, status: JobStatus) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE crawl_jobs SET status = ?1, updated_at = ?2 WHERE owner_id = ?3 AND url = ?4",
            params![status.to_db_string(), now(), owner, url],
        )?;
        Ok(())
    }

    async fn persist_summary(
        &self,
        owner: OwnerId,
        url: &str,
        summary: &PageSummary,
    ) -> StoreResult<()> {
        let headings = serde_json::to_string(&summary.headings)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE crawl_jobs SET doctype = ?1, title = ?2, headings = ?3, internal_links = ?4,
             external_links = ?5, inaccessible_links = ?6, has_login_form = ?7, updated_at = ?8
             WHERE owner_id = ?9 AND url = ?10",
            params![
                summary.doctype.map(|d| d.as_str()),
                summary.title,
                headings,
                summary.internal_links,
                summary.external_links,
                summary.inaccessible_links,
                summary.has_login_form,
                now(),
                owner,
                url,
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::JobNotFound {
                owner,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_job(&self, job_id: JobId) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM crawl_jobs WHERE id = ?1", params![job_id])?;
        if deleted == 0 {
            return Err(StoreError::JobIdNotFound(job_id));
        }
        Ok(())
    }

    async fn clear_job_details(&self, job_id: JobId) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM crawl_links WHERE job_id = ?1", params![job_id])?;
        tx.execute("DELETE FROM crawl_headings WHERE job_id = ?1", params![job_id])?;
        tx.execute(
            "UPDATE crawl_jobs SET doctype = NULL, title = NULL, headings = '{}', internal_links = 0,
             external_links = 0, inaccessible_links = 0, has_login_form = 0, updated_at = ?1
             WHERE id = ?2",
            params![now(), job_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ===== Child Records =====

    async fn create_heading(&self, job_id: JobId, heading: &NewHeading) -> StoreResult<HeadingId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO crawl_headings (job_id, level, text, heading_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![job_id, heading.level, heading.text, heading.order, now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn create_link(&self, job_id: JobId, link: &NewLink) -> StoreResult<LinkId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO crawl_links (job_id, url, text, kind, status_code, reachable, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 1, ?5)",
            params![job_id, link.url, link.text, link.kind.as_str(), now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn update_link_verdict(
        &self,
        link_id: LinkId,
        status_code: u16,
        reachable: bool,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE crawl_links SET status_code = ?1, reachable = ?2 WHERE id = ?3",
            params![status_code, reachable, link_id],
        )?;
        if updated == 0 {
            return Err(StoreError::LinkNotFound(link_id));
        }
        Ok(())
    }

    async fn headings_for_job(&self, job_id: JobId) -> StoreResult<Vec<HeadingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_id, level, text, heading_order FROM crawl_headings
             WHERE job_id = ?1 ORDER BY heading_order ASC",
        )?;

        let headings = stmt
            .query_map(params![job_id], |row| {
                Ok(HeadingRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    level: row.get(2)?,
                    text: row.get(3)?,
                    order: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(headings)
    }

    async fn links_for_job(&self, job_id: JobId) -> StoreResult<Vec<LinkRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_id, url, text, kind, status_code, reachable FROM crawl_links
             WHERE job_id = ?1 ORDER BY id ASC",
        )?;

        let links = stmt
            .query_map(params![job_id], row_to_link)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new_in_memory().unwrap()
    }

    fn new_link(url: &str, kind: LinkKind) -> NewLink {
        NewLink {
            url: url.to_string(),
            text: "text".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_job() {
        let store = store();
        let id = store.create_job(1, "https://example.com/").await.unwrap();

        assert_eq!(store.find_job_id(1, "https://example.com/").await.unwrap(), id);

        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.owner, 1);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.summary, PageSummary::default());
    }

    #[tokio::test]
    async fn test_find_job_is_scoped_to_owner() {
        let store = store();
        store.create_job(1, "https://example.com/").await.unwrap();

        let err = store.find_job_id(2, "https://example.com/").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resubmission_resets_existing_row() {
        let store = store();
        let first = store.create_job(1, "https://example.com/").await.unwrap();
        store
            .set_status(1, "https://example.com/", JobStatus::Done)
            .await
            .unwrap();

        let second = store.create_job(1, "https://example.com/").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get_job(first).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_set_status_is_idempotent() {
        let store = store();
        let id = store.create_job(1, "https://example.com/").await.unwrap();

        store.set_status(1, "https://example.com/", JobStatus::Running).await.unwrap();
        store.set_status(1, "https://example.com/", JobStatus::Running).await.unwrap();

        assert_eq!(store.get_job(id).await.unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_persist_summary_roundtrip() {
        let store = store();
        let id = store.create_job(7, "https://example.com/").await.unwrap();

        let mut summary = PageSummary {
            doctype: Some(DoctypeClass::Modern),
            title: Some("Example".to_string()),
            internal_links: 3,
            external_links: 2,
            inaccessible_links: 1,
            has_login_form: true,
            ..PageSummary::default()
        };
        summary.headings.insert("h1".to_string(), 1);
        summary.headings.insert("h2".to_string(), 4);

        store
            .persist_summary(7, "https://example.com/", &summary)
            .await
            .unwrap();

        assert_eq!(store.get_job(id).await.unwrap().summary, summary);
    }

    #[tokio::test]
    async fn test_persist_summary_missing_job() {
        let store = store();
        let result = store
            .persist_summary(1, "https://missing.test/", &PageSummary::default())
            .await;
        assert!(matches!(result, Err(StoreError::JobNotFound { .. })));
    }

    #[tokio::test]
    async fn test_links_default_to_unprobed_and_accept_verdicts() {
        let store = store();
        let job = store.create_job(1, "https://example.com/").await.unwrap();
        let internal = store
            .create_link(job, &new_link("https://example.com/about", LinkKind::Internal))
            .await
            .unwrap();
        let external = store
            .create_link(job, &new_link("https://external.test/", LinkKind::External))
            .await
            .unwrap();

        let links = store.links_for_job(job).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.status_code == 0 && l.reachable));
        assert_eq!(links[0].id, internal);
        assert_eq!(links[1].kind, LinkKind::External);

        // Verdicts are accepted even once the job is terminal
        store
            .set_status(1, "https://example.com/", JobStatus::Done)
            .await
            .unwrap();
        store.update_link_verdict(external, 404, false).await.unwrap();

        let links = store.links_for_job(job).await.unwrap();
        assert_eq!(links[1].status_code, 404);
        assert!(!links[1].reachable);
    }

    #[tokio::test]
    async fn test_update_unknown_link() {
        let store = store();
        let result = store.update_link_verdict(42, 200, true).await;
        assert!(matches!(result, Err(StoreError::LinkNotFound(42))));
    }

    #[tokio::test]
    async fn test_headings_ordered_by_order_index() {
        let store = store();
        let job = store.create_job(1, "https://example.com/").await.unwrap();

        for (order, level) in [(2, "h2"), (1, "h1"), (3, "h2")] {
            store
                .create_heading(
                    job,
                    &NewHeading {
                        level: level.to_string(),
                        text: format!("Heading {}", order),
                        order,
                    },
                )
                .await
                .unwrap();
        }

        let orders: Vec<u32> = store
            .headings_for_job(job)
            .await
            .unwrap()
            .iter()
            .map(|h| h.order)
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_job_cascades() {
        let store = store();
        let job = store.create_job(1, "https://example.com/").await.unwrap();
        store
            .create_link(job, &new_link("https://example.com/a", LinkKind::Internal))
            .await
            .unwrap();
        store
            .create_heading(
                job,
                &NewHeading {
                    level: "h1".to_string(),
                    text: "Title".to_string(),
                    order: 1,
                },
            )
            .await
            .unwrap();

        store.delete_job(job).await.unwrap();

        assert!(store.get_job(job).await.unwrap_err().is_not_found());
        assert!(store.links_for_job(job).await.unwrap().is_empty());
        assert!(store.headings_for_job(job).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_job_details() {
        let store = store();
        let job = store.create_job(1, "https://example.com/").await.unwrap();
        store
            .create_link(job, &new_link("https://example.com/a", LinkKind::Internal))
            .await
            .unwrap();

        let mut summary = PageSummary {
            doctype: Some(DoctypeClass::Legacy),
            title: Some("Old".to_string()),
            internal_links: 1,
            inaccessible_links: 1,
            has_login_form: true,
            ..PageSummary::default()
        };
        summary.headings.insert("h1".to_string(), 2);
        store
            .persist_summary(1, "https://example.com/", &summary)
            .await
            .unwrap();

        store.clear_job_details(job).await.unwrap();

        assert!(store.links_for_job(job).await.unwrap().is_empty());
        let cleared = store.get_job(job).await.unwrap();
        assert_eq!(cleared.summary, PageSummary::default());
    }
}
