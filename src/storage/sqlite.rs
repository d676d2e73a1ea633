//! SQLite checkpoint store
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::state::{CrawlState, DocumentRef, PageToken};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, JobRecord, StorageError, StorageResult};
use crate::storage::JobStatus;
use crate::CrawlError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const TOKEN_START: &str = "start";
const TOKEN_NEXT: &str = "token";
const TOKEN_END: &str = "end";

/// SQLite checkpoint backend
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Creates a new SqliteCheckpointStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCheckpointStore)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }
}

fn encode_token(token: &Option<PageToken>) -> (&'static str, Option<&str>) {
    match token {
        None => (TOKEN_START, None),
        Some(PageToken::Token(value)) => (TOKEN_NEXT, Some(value.as_str())),
        Some(PageToken::End) => (TOKEN_END, None),
    }
}

fn decode_token(
    job_key: &str,
    state: &str,
    value: Option<String>,
) -> StorageResult<Option<PageToken>> {
    match (state, value) {
        (TOKEN_START, _) => Ok(None),
        (TOKEN_END, _) => Ok(Some(PageToken::End)),
        (TOKEN_NEXT, Some(value)) => Ok(Some(PageToken::Token(value))),
        (other, _) => Err(StorageError::Corrupt {
            job_key: job_key.to_string(),
            message: format!("unknown token state '{}'", other),
        }),
    }
}

fn read_job(row: &Row<'_>) -> rusqlite::Result<(JobRecord, String, Option<String>)> {
    let status: String = row.get(2)?;
    let record = JobRecord {
        job_key: row.get(0)?,
        label: row.get(1)?,
        status: JobStatus::from_db_string(&status).unwrap_or(JobStatus::Interrupted),
        resume_token: None,
        backoff_level: row.get(5)?,
        enumerated: row.get::<_, i64>(6)? as u64,
        downloaded: row.get::<_, i64>(7)? as u64,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    };
    Ok((record, row.get(3)?, row.get(4)?))
}

const JOB_COLUMNS: &str = "
    j.job_key, j.label, j.status, j.token_state, j.resume_token, j.backoff_level,
    (SELECT COUNT(*) FROM enumerated_refs e WHERE e.job_key = j.job_key),
    (SELECT COUNT(*) FROM downloaded_refs d WHERE d.job_key = j.job_key),
    j.created_at, j.updated_at";

impl CheckpointStore for SqliteCheckpointStore {
    fn register_job(&mut self, job_key: &str, label: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (job_key, label, status, token_state, backoff_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
             ON CONFLICT(job_key) DO UPDATE SET label = excluded.label",
            params![
                job_key,
                label,
                JobStatus::Running.to_db_string(),
                TOKEN_START,
                now
            ],
        )?;
        Ok(())
    }

    fn save(&mut self, state: &CrawlState, status: JobStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let (token_state, token_value) = encode_token(&state.resume_token);
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO jobs (job_key, label, status, token_state, resume_token, backoff_level, created_at, updated_at)
             VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(job_key) DO UPDATE SET
                status = excluded.status,
                token_state = excluded.token_state,
                resume_token = excluded.resume_token,
                backoff_level = excluded.backoff_level,
                updated_at = excluded.updated_at",
            params![
                state.job_key,
                status.to_db_string(),
                token_state,
                token_value,
                state.backoff_level,
                now
            ],
        )?;

        // Enumeration is append-only, so only the tail past the stored count is new
        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM enumerated_refs WHERE job_key = ?1",
            params![state.job_key],
            |row| row.get(0),
        )?;

        {
            let mut insert_ref = tx.prepare(
                "INSERT OR IGNORE INTO enumerated_refs (job_key, ordinal, doc_id, case_number, title)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (ordinal, doc) in state
                .enumerated()
                .iter()
                .enumerate()
                .skip(stored.max(0) as usize)
            {
                insert_ref.execute(params![
                    state.job_key,
                    ordinal as i64,
                    doc.id,
                    doc.case_number,
                    doc.title
                ])?;
            }

            let mut insert_download = tx.prepare(
                "INSERT OR IGNORE INTO downloaded_refs (job_key, doc_id, downloaded_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for id in state.downloaded_ids() {
                insert_download.execute(params![state.job_key, id, now])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load(&self, job_key: &str) -> StorageResult<Option<CrawlState>> {
        let job = self
            .conn
            .query_row(
                "SELECT token_state, resume_token, backoff_level FROM jobs WHERE job_key = ?1",
                params![job_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((token_state, token_value, backoff_level)) = job else {
            return Ok(None);
        };
        let resume_token = decode_token(job_key, &token_state, token_value)?;

        let mut stmt = self.conn.prepare(
            "SELECT doc_id, case_number, title FROM enumerated_refs
             WHERE job_key = ?1 ORDER BY ordinal",
        )?;
        let enumerated = stmt
            .query_map(params![job_key], |row| {
                Ok(DocumentRef::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT doc_id FROM downloaded_refs WHERE job_key = ?1")?;
        let downloaded = stmt
            .query_map(params![job_key], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CrawlState::from_parts(
            job_key,
            enumerated,
            downloaded,
            resume_token,
            backoff_level,
        )))
    }

    fn get_job(&self, job_key: &str) -> StorageResult<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs j WHERE j.job_key = ?1", JOB_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![job_key], read_job)
            .optional()?;

        match row {
            Some((mut record, token_state, token_value)) => {
                record.resume_token = decode_token(job_key, &token_state, token_value)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM jobs j ORDER BY j.updated_at DESC, j.job_key",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_job)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut record, token_state, token_value)| {
                record.resume_token = decode_token(&record.job_key, &token_state, token_value)?;
                Ok(record)
            })
            .collect()
    }

    fn clear_job(&mut self, job_key: &str) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM downloaded_refs WHERE job_key = ?1",
            params![job_key],
        )?;
        tx.execute(
            "DELETE FROM enumerated_refs WHERE job_key = ?1",
            params![job_key],
        )?;
        tx.execute("DELETE FROM jobs WHERE job_key = ?1", params![job_key])?;
        tx.commit()?;
        Ok(())
    }
}
