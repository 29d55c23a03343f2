use chrono::SecondsFormat;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

use super::{FileStatus, IngestOutcome, IngestRun};

/// SQLite log of ingestion runs and the files they read
pub struct IngestMeta {
    conn: Connection,
}

/// One row of the run log
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub outcome: String,
    pub dry_run: bool,
    pub detail: Option<String>,
    pub rows: i64,
    pub files: i64,
    pub failed_files: i64,
}

impl IngestMeta {
    pub fn open<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_runs (
                run_id      TEXT PRIMARY KEY,
                started_at  TEXT NOT NULL,
                outcome     TEXT NOT NULL,
                dry_run     INTEGER NOT NULL DEFAULT 0,
                detail      TEXT,
                row_count   INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ingest_files (
                run_id       TEXT NOT NULL,
                file_name    TEXT NOT NULL,
                fingerprint  TEXT,
                status       TEXT NOT NULL,
                detail       TEXT
            );
            CREATE INDEX IF NOT EXISTS ingest_files_fingerprint ON ingest_files (fingerprint);
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn record_run(&self, run: &IngestRun) -> anyhow::Result<()> {
        self.insert_run(run, false)
    }

    /// Record a run whose batch was validated but not stored; fingerprint
    /// lookups ignore it
    pub fn record_dry_run(&self, run: &IngestRun) -> anyhow::Result<()> {
        self.insert_run(run, true)
    }

    fn insert_run(&self, run: &IngestRun, dry_run: bool) -> anyhow::Result<()> {
        let (detail, rows) = match &run.outcome {
            IngestOutcome::Loaded(table) => (None, table.len() as i64),
            IngestOutcome::Empty => (None, 0),
            IngestOutcome::Rejected(e) => (Some(e.to_string()), 0),
        };
        let run_id = run.run_id.to_string();
        let started_at = run.started_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn.execute(
            "INSERT INTO ingest_runs (run_id, started_at, outcome, dry_run, detail, row_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, started_at, run.outcome.label(), dry_run, detail, rows],
        )?;

        for file in &run.files {
            let (status, detail) = match &file.status {
                FileStatus::Loaded { sheets, rows } => {
                    ("loaded", Some(format!("{sheets} sheets, {rows} rows")))
                }
                FileStatus::Failed { error } => ("failed", Some(error.clone())),
            };
            self.conn.execute(
                "INSERT INTO ingest_files (run_id, file_name, fingerprint, status, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, file.file_name, file.fingerprint, status, detail],
            )?;
        }
        Ok(())
    }

    /// Most recent earlier run that loaded a file with this fingerprint
    pub fn run_for_fingerprint(&self, fingerprint: &str) -> anyhow::Result<Option<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.run_id FROM ingest_files f JOIN ingest_runs r ON r.run_id = f.run_id
             WHERE f.fingerprint = ?1 AND f.status = 'loaded' AND r.outcome = 'loaded'
               AND r.dry_run = 0
             ORDER BY r.started_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![fingerprint])?;
        if let Some(row) = rows.next()? {
            let run_id: String = row.get(0)?;
            Ok(Some(run_id))
        } else {
            Ok(None)
        }
    }

    pub fn recent_runs(&self, limit: usize) -> anyhow::Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.run_id, r.started_at, r.outcome, r.dry_run, r.detail, r.row_count,
                    COUNT(f.file_name),
                    COALESCE(SUM(CASE WHEN f.status = 'failed' THEN 1 ELSE 0 END), 0)
             FROM ingest_runs r LEFT JOIN ingest_files f ON f.run_id = r.run_id
             GROUP BY r.run_id
             ORDER BY r.started_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunSummary {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                outcome: row.get(2)?,
                dry_run: row.get(3)?,
                detail: row.get(4)?,
                rows: row.get(5)?,
                files: row.get(6)?,
                failed_files: row.get(7)?,
            })
        })?;
        let mut summaries = Vec::new();
        for summary in rows {
            summaries.push(summary?);
        }
        Ok(summaries)
    }
}
