//! SQLite-backed queue store.
//!
//! Persists queued operations on disk so they survive restarts and can be
//! shared by every context that opens the same database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use finpro_common::{Error, Result};

use crate::operation::{OperationId, OperationKind, OperationStatus, QueuedOperation};
use crate::store::QueueStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS operations (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    destination TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_operations_status ON operations(status);
CREATE INDEX IF NOT EXISTS idx_operations_enqueued_at ON operations(enqueued_at);
"#;

const RECOVER_INTERRUPTED: &str =
    "UPDATE operations SET status = 'pending' WHERE status = 'processing'";

const SELECT_COLUMNS: &str =
    "SELECT id, kind, destination, payload, enqueued_at, retry_count, status FROM operations";

/// Queue store backed by a SQLite database file.
pub struct SqliteQueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueueStore {
    /// Create or open a queue database.
    ///
    /// Entries left `processing` by a context that went away mid-attempt
    /// are returned to `pending`.
    ///
    /// # Errors
    /// - `StorageUnavailable` if the file cannot be opened or migrated
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path).map_err(|e| {
            Error::StorageUnavailable(format!("Cannot open {}: {}", db_path.display(), e))
        })?;
        let recovered = conn
            .execute_batch(SCHEMA)
            .and_then(|_| conn.execute(RECOVER_INTERRUPTED, []))
            .map_err(|e| Error::StorageUnavailable(format!("Schema setup failed: {}", e)))?;
        if recovered > 0 {
            warn!(recovered, "Returned interrupted operations to pending");
        }

        let store = Self::init(conn)?;
        info!(location = %db_path.display(), "Queue database opened");
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::StorageUnavailable(format!("Schema setup failed: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Storage("Queue connection lock poisoned".to_string()))?;
            f(&guard).map_err(map_sqlite_error)
        })
        .await
        .map_err(|e| Error::Storage(format!("Queue task failed: {}", e)))?
    }
}

/// Classify SQLite failures: anything that means "cannot write at all" is
/// reported as storage being unavailable.
fn map_sqlite_error(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DiskFull
                    | ErrorCode::CannotOpen
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
            ) =>
        {
            Error::StorageUnavailable(err.to_string())
        }
        _ => Error::Storage(err.to_string()),
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<QueuedOperation> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let payload: String = row.get(3)?;
    let enqueued_at: String = row.get(4)?;
    let status: String = row.get(6)?;

    Ok(QueuedOperation {
        id: OperationId::new(id).map_err(|e| conversion_error(0, e))?,
        kind: kind
            .parse::<OperationKind>()
            .map_err(|e| conversion_error(1, e))?,
        destination: row.get(2)?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(3, e))?,
        enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(4, e))?,
        retry_count: row.get(5)?,
        status: status
            .parse::<OperationStatus>()
            .map_err(|e| conversion_error(6, e))?,
    })
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn enqueue(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: serde_json::Value,
    ) -> Result<OperationId> {
        let operation = QueuedOperation::new(kind, destination, payload)?;
        let payload_json = serde_json::to_string(&operation.payload)?;
        let id = operation.id.clone();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO operations
                (id, kind, destination, payload, enqueued_at, retry_count, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    operation.id.as_str(),
                    operation.kind.as_str(),
                    operation.destination,
                    payload_json,
                    operation.enqueued_at.to_rfc3339(),
                    operation.retry_count,
                    operation.status.as_str(),
                ],
            )
        })
        .await
        .map_err(|e| match e {
            Error::Storage(msg) => Error::StorageUnavailable(msg),
            other => other,
        })?;

        debug!(%id, %kind, destination, "Queued operation");
        Ok(id)
    }

    async fn get(&self, id: &OperationId) -> Result<Option<QueuedOperation>> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                [id],
                row_to_operation,
            )
            .optional()
        })
        .await
    }

    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueuedOperation>> {
        self.with_conn(move |conn| match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!("{} WHERE status = ?1", SELECT_COLUMNS))?;
                let rows = stmt.query_map([status.as_str()], row_to_operation)?;
                let ops = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(ops)
            }
            None => {
                let mut stmt = conn.prepare(SELECT_COLUMNS)?;
                let rows = stmt.query_map([], row_to_operation)?;
                let ops = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(ops)
            }
        })
        .await
    }

    async fn mark_processing(&self, id: &OperationId) -> Result<bool> {
        let key = id.as_str().to_string();
        let changed = self
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE operations SET status = 'processing' WHERE id = ?1 AND status = 'pending'",
                    [key],
                )
            })
            .await?;

        if changed == 0 {
            debug!(%id, "Operation not claimable");
        }
        Ok(changed == 1)
    }

    async fn requeue(&self, id: &OperationId, retry_count: u32) -> Result<()> {
        let key = id.as_str().to_string();
        let changed = self
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE operations SET status = 'pending', retry_count = ?2 WHERE id = ?1",
                    params![key, retry_count],
                )
            })
            .await?;

        if changed == 0 {
            warn!(%id, "Cannot requeue missing operation");
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &OperationId) -> Result<()> {
        let key = id.as_str().to_string();
        let changed = self
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE operations SET status = 'failed' WHERE id = ?1",
                    [key],
                )
            })
            .await?;

        if changed == 0 {
            warn!(%id, "Cannot fail missing operation");
        }
        Ok(())
    }

    async fn delete(&self, id: &OperationId) -> Result<()> {
        let key = id.as_str().to_string();
        let changed = self
            .with_conn(move |conn| conn.execute("DELETE FROM operations WHERE id = ?1", [key]))
            .await?;

        if changed == 0 {
            warn!(%id, "Cannot delete missing operation");
        }
        Ok(())
    }

    async fn count(&self, status: OperationStatus) -> Result<usize> {
        let count: i64 = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM operations WHERE status = ?1",
                    [status.as_str()],
                    |row| row.get(0),
                )
            })
            .await?;
        Ok(count as usize)
    }
}
