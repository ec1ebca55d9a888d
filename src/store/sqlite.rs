use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str = "id, name, email, password_hash, api_key, created_at";
const REPOSITORY_COLUMNS: &str = "id, name, display_name, link, owner_api_key, created_at";
const FILE_COLUMNS: &str =
    "id, repository_id, display_name, name, download_url, size_bytes, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Used by tests and tooling.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
fn map_insert_error(e: rusqlite::Error, message: &str) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::conflict(message)
        }
        e => Error::from(e),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        api_key: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        link: row.get(3)?,
        owner_api_key: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        display_name: row.get(2)?,
        name: row.get(3)?,
        download_url: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

impl SqliteStore {
    fn query_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            params![value],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn query_repository(&self, column: &str, value: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE {column} = ?1"),
            params![value],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn query_file(&self, repository_id: &str, column: &str, value: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE repository_id = ?1 AND {column} = ?2"),
            params![repository_id, value],
            file_from_row,
        )
        .optional()
        .map_err(Error::from)
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, api_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.password_hash,
                    user.api_key,
                    format_datetime(&user.created_at),
                ],
            )
            .map_err(|e| map_insert_error(e, "User with this email or username already exists"))?;
        Ok(())
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.query_user("name", name)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("email", email)
    }

    fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.query_user("api_key", api_key)
    }

    // Repository operations

    fn create_repository(&self, repo: &Repository) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO repositories (id, name, display_name, link, owner_api_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    repo.id,
                    repo.name,
                    repo.display_name,
                    repo.link,
                    repo.owner_api_key,
                    format_datetime(&repo.created_at),
                ],
            )
            .map_err(|e| map_insert_error(e, "Repository already exists"))?;
        Ok(())
    }

    fn get_repository_by_link(&self, link: &str) -> Result<Option<Repository>> {
        self.query_repository("link", link)
    }

    fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>> {
        self.query_repository("name", name)
    }

    fn get_owner_repository(
        &self,
        owner_api_key: &str,
        display_name: &str,
    ) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {REPOSITORY_COLUMNS} FROM repositories
                 WHERE owner_api_key = ?1 AND display_name = ?2"
            ),
            params![owner_api_key, display_name],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_repositories(
        &self,
        owner_api_key: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Repository>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories
             WHERE owner_api_key = ?1 ORDER BY rowid LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![owner_api_key, limit, skip], repository_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_repository_cascade(&self, id: &str) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let files = tx.execute("DELETE FROM files WHERE repository_id = ?1", params![id])?;
        let repos = tx.execute("DELETE FROM repositories WHERE id = ?1", params![id])?;

        if repos == 0 {
            // Dropping the transaction rolls back the file deletes.
            return Err(Error::not_found("repository does not exist"));
        }

        tx.commit()?;
        Ok(files)
    }

    // File operations

    fn create_file(&self, file: &FileRecord) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO files (id, repository_id, display_name, name, download_url, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    file.id,
                    file.repository_id,
                    file.display_name,
                    file.name,
                    file.download_url,
                    file.size_bytes,
                    format_datetime(&file.created_at),
                ],
            )
            .map_err(|e| map_insert_error(e, "file is already uploaded"))?;
        Ok(())
    }

    fn get_file_by_display_name(
        &self,
        repository_id: &str,
        display_name: &str,
    ) -> Result<Option<FileRecord>> {
        self.query_file(repository_id, "display_name", display_name)
    }

    fn get_file_by_name(&self, repository_id: &str, name: &str) -> Result<Option<FileRecord>> {
        self.query_file(repository_id, "name", name)
    }

    fn list_files(&self, repository_id: &str) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE repository_id = ?1 ORDER BY rowid"
        ))?;

        let rows = stmt.query_map(params![repository_id], file_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_file(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM files WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Reconciliation queue

    fn queue_orphaned_bucket(&self, bucket: &str, reason: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO orphaned_buckets (bucket, reason, attempts, created_at)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(bucket) DO UPDATE SET reason = excluded.reason",
            params![bucket, reason, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn list_orphaned_buckets(&self) -> Result<Vec<OrphanedBucket>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT bucket, reason, attempts, created_at, last_attempt_at
             FROM orphaned_buckets ORDER BY created_at",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(OrphanedBucket {
                bucket: row.get(0)?,
                reason: row.get(1)?,
                attempts: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                last_attempt_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn record_orphan_attempt(&self, bucket: &str, reason: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE orphaned_buckets SET attempts = attempts + 1, reason = ?1, last_attempt_at = ?2
             WHERE bucket = ?3",
            params![reason, format_datetime(&Utc::now()), bucket],
        )?;

        if rows == 0 {
            return Err(Error::not_found("orphaned bucket"));
        }
        Ok(())
    }

    fn delete_orphaned_bucket(&self, bucket: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM orphaned_buckets WHERE bucket = ?1",
            params![bucket],
        )?;
        Ok(rows > 0)
    }
}
