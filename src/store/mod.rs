//! Feedback document store.
//!
//! Feedback records live as JSON documents in a single SQLite table (the
//! "collection"). The connection is opened once at startup and shared by
//! every request; blocking SQLite calls run on tokio's blocking pool.

use crate::models::{Answers, FeedbackCreate, FeedbackRecord};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Page size used when the caller does not pass one.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Special database URL for a throwaway in-memory store.
pub const IN_MEMORY_URL: &str = ":memory:";

/// Errors raised by the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt document {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
    #[error("cannot create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store connection lock poisoned")]
    LockPoisoned,
    #[error("store is closed")]
    Closed,
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Filter and page for [`FeedbackStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub team_id: Option<u32>,
    pub skip: u64,
    pub limit: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            team_id: None,
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Shared handle to the feedback collection.
#[derive(Clone)]
pub struct FeedbackStore {
    conn: Arc<Mutex<Option<Connection>>>,
    collection: Arc<str>,
}

impl FeedbackStore {
    /// Open (or create) the store.
    ///
    /// `database_url` is a directory holding `<database_name>.sqlite3`, or
    /// [`IN_MEMORY_URL`]. The collection table and its indexes are created
    /// when missing.
    pub fn open(
        database_url: &str,
        database_name: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        validate_identifier(collection)?;

        let conn = if database_url == IN_MEMORY_URL {
            Connection::open_in_memory()?
        } else {
            let path = database_path(Path::new(database_url), database_name)?;
            info!("Opening feedback database at {}", path.display());
            Connection::open(&path)?
        };

        // Fail at startup rather than on the first request.
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {c} (
                id TEXT PRIMARY KEY,
                team_id INTEGER NOT NULL,
                answers TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{c}_created ON {c}(created_at);
            CREATE INDEX IF NOT EXISTS idx_{c}_team_created ON {c}(team_id, created_at);
            "#,
            c = collection
        ))?;

        info!(
            "Feedback store ready (database: {}, collection: {})",
            database_name, collection
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            collection: Arc::from(collection),
        })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory(collection: &str) -> Result<Self, StoreError> {
        Self::open(IN_MEMORY_URL, "memory", collection)
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Persist a validated feedback input and return the stored record.
    pub async fn create(&self, input: FeedbackCreate) -> Result<FeedbackRecord, StoreError> {
        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            team_id: input.team_id,
            answers: input.answers,
            // Stored text keeps microseconds; truncate so the returned record matches a re-read.
            created_at: Utc::now().trunc_subsecs(6),
        };
        let answers = serde_json::to_string(&record.answers)?;
        let collection = self.collection.clone();
        let row = record.clone();

        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, team_id, answers, created_at) VALUES (?1, ?2, ?3, ?4)",
                    collection
                ),
                params![
                    row.id.to_string(),
                    row.team_id,
                    answers,
                    format_timestamp(&row.created_at),
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!("Stored feedback {} for team {}", record.id, record.team_id);
        Ok(record)
    }

    /// List records newest first, optionally for a single team.
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<FeedbackRecord>, StoreError> {
        let collection = self.collection.clone();
        self.with_conn(move |conn| {
            let skip = i64::try_from(filter.skip).unwrap_or(i64::MAX);
            let limit = i64::from(filter.limit);
            match filter.team_id {
                Some(team_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, team_id, answers, created_at FROM {} \
                         WHERE team_id = ?1 \
                         ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                        collection
                    ))?;
                    let rows = stmt.query_map(params![team_id, limit, skip], read_row)?;
                    collect_rows(rows)
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, team_id, answers, created_at FROM {} \
                         ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                        collection
                    ))?;
                    let rows = stmt.query_map(params![limit, skip], read_row)?;
                    collect_rows(rows)
                }
            }
        })
        .await
    }

    /// Look up a record. Malformed identifiers are reported as not found.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<FeedbackRecord>, StoreError> {
        let id = match Uuid::parse_str(id) {
            Ok(id) => id,
            Err(_) => {
                warn!("Invalid feedback id format: {}", id);
                return Ok(None);
            }
        };

        let collection = self.collection.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT id, team_id, answers, created_at FROM {} WHERE id = ?1",
                        collection
                    ),
                    params![id.to_string()],
                    read_row,
                )
                .optional()?;
            row.map(RawRow::into_record).transpose()
        })
        .await
    }

    /// Every stored record, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        let collection = self.collection.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, team_id, answers, created_at FROM {} ORDER BY rowid ASC",
                collection
            ))?;
            let rows = stmt.query_map([], read_row)?;
            collect_rows(rows)
        })
        .await
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let collection = self.collection.clone();
        self.with_conn(move |conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", collection), [], |row| {
                    row.get(0)
                })?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Close the connection. Later operations fail with [`StoreError::Closed`].
    pub async fn close(&self) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let taken = tokio::task::spawn_blocking(move || {
            conn.lock()
                .map(|mut guard| guard.take())
                .map_err(|_| StoreError::LockPoisoned)
        })
        .await??;

        if let Some(conn) = taken {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
            info!("Feedback store closed");
        }
        Ok(())
    }

    /// Run `f` against the live connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

/// Row as read from SQLite, before the document is decoded.
struct RawRow {
    id: String,
    team_id: u32,
    answers: String,
    created_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<FeedbackRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let answers: Answers =
            serde_json::from_str(&self.answers).map_err(|e| corrupt(e.to_string()))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc);

        Ok(FeedbackRecord {
            id,
            team_id: self.team_id,
            answers,
            created_at,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        team_id: row.get(1)?,
        answers: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn collect_rows<I>(rows: I) -> Result<Vec<FeedbackRecord>, StoreError>
where
    I: Iterator<Item = rusqlite::Result<RawRow>>,
{
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// Fixed-width UTC text so lexical order equals chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn database_path(dir: &Path, database_name: &str) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.join(format!("{}.sqlite3", database_name)))
}

/// Collection names are spliced into SQL, so only plain identifiers pass.
fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;

    fn store() -> FeedbackStore {
        FeedbackStore::open_in_memory("customer_feedback").unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = store();
        let before = Utc::now().trunc_subsecs(6);

        let mut input = fixtures::create(4);
        input.answers.additional_comments = Some("شكراً للفريق".to_string());
        let created = store.create(input.clone()).await.unwrap();

        assert!(!created.id.is_nil());
        assert!(created.created_at >= before);

        let fetched = store
            .get_by_id(&created.id.to_string())
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(fetched, created);
        assert_eq!(fetched.team_id, input.team_id);
        assert_eq!(
            serde_json::to_string(&fetched.answers).unwrap(),
            serde_json::to_string(&input.answers).unwrap()
        );
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        let store = store();
        store.create(fixtures::create(1)).await.unwrap();

        assert_eq!(store.get_by_id("not-an-id").await.unwrap(), None);
        assert_eq!(store.get_by_id("").await.unwrap(), None);
        assert_eq!(
            store.get_by_id(&Uuid::new_v4().to_string()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_team_newest_first() {
        let store = store();
        for team in [1, 2, 1, 3, 1] {
            store.create(fixtures::create(team)).await.unwrap();
        }

        let team_one = store
            .list(ListFilter {
                team_id: Some(1),
                ..ListFilter::default()
            })
            .await
            .unwrap();

        assert_eq!(team_one.len(), 3);
        assert!(team_one.iter().all(|r| r.team_id == 1));
        assert!(team_one
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_pagination_reconstructs_full_listing() {
        let store = store();
        for team in 1..=7 {
            store.create(fixtures::create(team)).await.unwrap();
        }

        let full = store
            .list(ListFilter {
                limit: MAX_PAGE_LIMIT,
                ..ListFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(full.len(), 7);
        // Newest insert comes first.
        assert_eq!(full[0].team_id, 7);

        let mut paged = Vec::new();
        let mut skip = 0;
        loop {
            let page = store
                .list(ListFilter {
                    team_id: None,
                    skip,
                    limit: 3,
                })
                .await
                .unwrap();
            if page.is_empty() {
                break;
            }
            skip += page.len() as u64;
            paged.extend(page);
        }

        assert_eq!(paged, full);
    }

    #[tokio::test]
    async fn test_list_all_and_count() {
        let store = store();
        assert!(store.list_all().await.unwrap().is_empty());

        for team in [5, 6] {
            store.create(fixtures::create(team)).await.unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = store();
        store.close().await.unwrap();

        assert!(matches!(
            store.list_all().await,
            Err(StoreError::Closed)
        ));
        // Closing twice is harmless.
        tokio_test::assert_ok!(store.close().await);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("data");
        let url = url.to_str().unwrap();

        let created = {
            let store = FeedbackStore::open(url, "feedbacks", "customer_feedback").unwrap();
            let created = store.create(fixtures::create(9)).await.unwrap();
            store.close().await.unwrap();
            created
        };

        assert!(dir.path().join("data").join("feedbacks.sqlite3").exists());

        let reopened = FeedbackStore::open(url, "feedbacks", "customer_feedback").unwrap();
        let fetched = reopened.get_by_id(&created.id.to_string()).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[test]
    fn test_collection_name_validation() {
        assert!(validate_identifier("customer_feedback").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("feedback; DROP TABLE x").is_err());
        assert!(FeedbackStore::open_in_memory("bad-name").is_err());
    }
}
