use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use mirror_guard::{
    ActivityEntry, ActivitySink, Repository, RepositoryError, RepositoryStatus, RepositoryStore,
};

use crate::schema;

const REPOSITORY_COLUMNS: &str =
    "id, user_id, owner, name, mirror_owner, clone_url, status, error_message";

/// Fields needed to register a repository for mirroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    pub user_id: String,
    pub owner: String,
    pub name: String,
    pub mirror_owner: String,
    pub clone_url: String,
}

/// A stored activity log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: String,
    pub repository_id: String,
    pub message: String,
    pub details: Option<String>,
    pub status: RepositoryStatus,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

/// SQLite-backed repository registry and activity log.
pub struct MirrorStore {
    conn: Mutex<rusqlite::Connection>,
}

impl MirrorStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: rusqlite::Connection) -> Result<Self, StoreError> {
        schema::migrations()
            .to_latest(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    /// Register a repository. It starts out `imported`.
    pub fn add_repository(&self, new: &NewRepository) -> Result<Repository, StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO repositories
                (user_id, owner, name, mirror_owner, clone_url, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                new.user_id,
                new.owner,
                new.name,
                new.mirror_owner,
                new.clone_url,
                RepositoryStatus::Imported.as_str(),
                now_epoch_secs(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(format!("{}/{}", new.owner, new.name))
            }
            other => StoreError::Database(other.to_string()),
        })?;

        Ok(Repository {
            id: conn.last_insert_rowid().to_string(),
            user_id: new.user_id.clone(),
            owner: new.owner.clone(),
            name: new.name.clone(),
            mirror_owner: new.mirror_owner.clone(),
            clone_url: new.clone_url.clone(),
            status: RepositoryStatus::Imported,
            error_message: None,
        })
    }

    /// Every repository, in registration order.
    pub fn list_repositories(&self) -> Result<Vec<Repository>, StoreError> {
        self.query_repositories(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY id"
        ))
    }

    /// Repositories a scheduler may sync now. Those awaiting approval or
    /// already syncing are left out.
    pub fn list_schedulable(&self) -> Result<Vec<Repository>, StoreError> {
        self.query_repositories(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories
             WHERE status NOT IN ('{}', '{}')
             ORDER BY id",
            RepositoryStatus::PendingApproval.as_str(),
            RepositoryStatus::Syncing.as_str(),
        ))
    }

    pub fn get_repository(&self, id: &str) -> Result<Option<Repository>, StoreError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(None);
        };
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
            [rowid],
            row_to_repository,
        );

        match result {
            Ok(repo) => Ok(Some(repo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    /// Set a repository's status. `error_message` replaces the stored one.
    pub fn set_status(
        &self,
        id: &str,
        status: RepositoryStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let rowid: i64 = id
            .parse()
            .map_err(|_| StoreError::NotFound(id.to_owned()))?;
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE repositories
                 SET status = ?1, error_message = ?2, updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![status.as_str(), error_message, now_epoch_secs(), rowid],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    pub fn record_activity(&self, entry: &ActivityEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO activities
                (user_id, repository_id, message, details, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.user_id,
                entry.repository_id,
                entry.message,
                entry.details,
                entry.status.as_str(),
                now_epoch_secs(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Most recent activity first, optionally for one repository only.
    pub fn list_activities(
        &self,
        repository_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, repository_id, message, details, status, created_at
                 FROM activities
                 WHERE ?1 IS NULL OR repository_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let records = stmt
            .query_map(rusqlite::params![repository_id, limit], row_to_activity)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(records)
    }

    fn query_repositories(&self, sql: &str) -> Result<Vec<Repository>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let repos = stmt
            .query_map([], row_to_repository)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(repos)
    }
}

#[async_trait::async_trait]
impl RepositoryStore for MirrorStore {
    async fn get(&self, id: &str) -> Result<Option<Repository>, RepositoryError> {
        self.get_repository(id).map_err(RepositoryError::from)
    }

    async fn update_status(
        &self,
        id: &str,
        status: RepositoryStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.set_status(id, status, error_message)
            .map_err(RepositoryError::from)
    }
}

#[async_trait::async_trait]
impl ActivitySink for MirrorStore {
    async fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.record_activity(&entry) {
            tracing::warn!(repository_id = %entry.repository_id, error = %e, "could not record activity");
        }
    }
}

/// Errors specific to store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("repository already registered: {0}")]
    Duplicate(String),
}

impl From<StoreError> for RepositoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => RepositoryError::NotFound(id),
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

fn parse_status(idx: usize, raw: &str) -> rusqlite::Result<RepositoryStatus> {
    RepositoryStatus::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown repository status: {raw}").into(),
        )
    })
}

fn row_to_repository(row: &rusqlite::Row) -> rusqlite::Result<Repository> {
    let id: i64 = row.get(0)?;
    let status: String = row.get(6)?;

    Ok(Repository {
        id: id.to_string(),
        user_id: row.get(1)?,
        owner: row.get(2)?,
        name: row.get(3)?,
        mirror_owner: row.get(4)?,
        clone_url: row.get(5)?,
        status: parse_status(6, &status)?,
        error_message: row.get(7)?,
    })
}

fn row_to_activity(row: &rusqlite::Row) -> rusqlite::Result<ActivityRecord> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(ActivityRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        repository_id: row.get(2)?,
        message: row.get(3)?,
        details: row.get(4)?,
        status: parse_status(5, &status)?,
        created_at: created_at.parse().unwrap_or_default(),
    })
}

fn now_epoch_secs() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now.to_string()
}
