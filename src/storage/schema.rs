//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the checkpoint database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl job (one filter + date window)
CREATE TABLE IF NOT EXISTS jobs (
    job_key TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    status TEXT NOT NULL,
    token_state TEXT NOT NULL,
    resume_token TEXT,
    backoff_level INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- References emitted by the walker, in emission order
CREATE TABLE IF NOT EXISTS enumerated_refs (
    job_key TEXT NOT NULL REFERENCES jobs(job_key) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    doc_id TEXT NOT NULL,
    case_number TEXT NOT NULL,
    title TEXT NOT NULL,
    PRIMARY KEY (job_key, doc_id)
);

CREATE INDEX IF NOT EXISTS idx_enumerated_order ON enumerated_refs(job_key, ordinal);

-- References acknowledged by the document store
CREATE TABLE IF NOT EXISTS downloaded_refs (
    job_key TEXT NOT NULL REFERENCES jobs(job_key) ON DELETE CASCADE,
    doc_id TEXT NOT NULL,
    downloaded_at TEXT NOT NULL,
    PRIMARY KEY (job_key, doc_id)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
