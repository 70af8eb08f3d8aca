//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Safe to run on
/// every start.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;
    db.query(IMPORT_LOG_SCHEMA).await?.check()?;
    db.query(TASK_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
const JOB_SCHEMA: &str = r#"
-- Imported job postings, one per (external_id, source)
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS external_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS source ON job TYPE string;
DEFINE FIELD IF NOT EXISTS title ON job TYPE string ASSERT string::len($value) <= 200;
DEFINE FIELD IF NOT EXISTS company ON job TYPE string ASSERT string::len($value) <= 100;
DEFINE FIELD IF NOT EXISTS location ON job TYPE string DEFAULT "";
DEFINE FIELD IF NOT EXISTS description ON job TYPE string DEFAULT "";
DEFINE FIELD IF NOT EXISTS job_type ON job TYPE string DEFAULT "full-time";
DEFINE FIELD IF NOT EXISTS category ON job TYPE string DEFAULT "general";
DEFINE FIELD IF NOT EXISTS salary ON job TYPE string DEFAULT "";
DEFINE FIELD IF NOT EXISTS url ON job TYPE string;
DEFINE FIELD IF NOT EXISTS published_date ON job TYPE datetime;
DEFINE FIELD IF NOT EXISTS source_url ON job TYPE string;
DEFINE FIELD IF NOT EXISTS is_active ON job TYPE bool DEFAULT true;
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON job TYPE datetime DEFAULT time::now();

-- Identity of a posting
DEFINE INDEX IF NOT EXISTS job_identity ON job FIELDS external_id, source UNIQUE;

-- Indexes for listing and stats
DEFINE INDEX IF NOT EXISTS job_source ON job FIELDS source;
DEFINE INDEX IF NOT EXISTS job_category ON job FIELDS category;
DEFINE INDEX IF NOT EXISTS job_type ON job FIELDS job_type;
DEFINE INDEX IF NOT EXISTS job_created ON job FIELDS created_at;
"#;

/// Import log table schema.
const IMPORT_LOG_SCHEMA: &str = r#"
-- One audit record per (trigger, source) import run
DEFINE TABLE IF NOT EXISTS import_log SCHEMALESS;

DEFINE FIELD IF NOT EXISTS file_name ON import_log TYPE string;
DEFINE FIELD IF NOT EXISTS source ON import_log TYPE string;
DEFINE FIELD IF NOT EXISTS status ON import_log TYPE string DEFAULT "in_progress"
    ASSERT $value IN ["in_progress", "completed", "failed"];
DEFINE FIELD IF NOT EXISTS total_fetched ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS total_imported ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS new_jobs ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS updated_jobs ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS failed_jobs ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS skipped_jobs ON import_log TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS error_details ON import_log TYPE array DEFAULT [];
DEFINE FIELD IF NOT EXISTS processing_time_ms ON import_log TYPE option<int>;
DEFINE FIELD IF NOT EXISTS import_date_time ON import_log TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS completed_at ON import_log TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS created_at ON import_log TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON import_log TYPE datetime DEFAULT time::now();

-- Indexes for history queries and cleanup
DEFINE INDEX IF NOT EXISTS import_log_status ON import_log FIELDS status;
DEFINE INDEX IF NOT EXISTS import_log_source ON import_log FIELDS source;
DEFINE INDEX IF NOT EXISTS import_log_created ON import_log FIELDS created_at;
"#;

/// Queue task table schema.
const TASK_SCHEMA: &str = r#"
-- Durable copy of the task queue
DEFINE TABLE IF NOT EXISTS task SCHEMALESS;

DEFINE FIELD IF NOT EXISTS name ON task TYPE string;
DEFINE FIELD IF NOT EXISTS data ON task TYPE object;
DEFINE FIELD IF NOT EXISTS priority ON task TYPE string DEFAULT "normal";
DEFINE FIELD IF NOT EXISTS status ON task TYPE string DEFAULT "waiting";
DEFINE FIELD IF NOT EXISTS attempts_made ON task TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS max_attempts ON task TYPE int DEFAULT 3;
DEFINE FIELD IF NOT EXISTS retry_at ON task TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS created_at ON task TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS processed_on ON task TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS finished_on ON task TYPE option<datetime>;

DEFINE INDEX IF NOT EXISTS task_status ON task FIELDS status;
DEFINE INDEX IF NOT EXISTS task_created ON task FIELDS created_at;
"#;
