//! SQLite result sink
//!
//! Records one `runs` row per process and one `results` row per terminal
//! URL result.

use crate::output::traits::{Sink, SinkResult};
use crate::state::UrlResult;
use crate::storage::schema::initialize_schema;
use crate::storage::RunStatus;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
    path: Option<PathBuf>,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a run row
    pub fn open(path: &Path, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::start(conn, config_hash, Some(path.to_path_buf()))
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory(config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, config_hash, None)
    }

    fn start(conn: Connection, config_hash: &str, path: Option<PathBuf>) -> SinkResult<Self> {
        initialize_schema(&conn)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();
        Ok(Self { conn, run_id, path })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Number of result rows recorded for the current run
    pub fn count_results(&self) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM results WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn run_status(&self) -> SinkResult<Option<RunStatus>> {
        let status: String = self.conn.query_row(
            "SELECT status FROM runs WHERE id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(RunStatus::from_db_string(&status))
    }
}

impl Sink for SqliteSink {
    fn write(&mut self, result: &UrlResult) -> SinkResult<()> {
        let detection_json = result
            .detection
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let detected = result.detection.as_ref().is_some_and(|d| d.found);

        self.conn.execute(
            "INSERT INTO results (run_id, original_url, final_url, success, failure_reason,
                variation_used, http_status, attempts, detected, detection_json, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.run_id,
                result.original_url,
                result.final_url,
                result.success,
                result.failure_reason,
                result.variation_used,
                result.http_status,
                result.attempts,
                detected,
                detection_json,
                result.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn healthy(&mut self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    fn flush(&mut self) -> SinkResult<()> {
        // Every insert autocommits
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> SinkResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), self.run_id],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn result(url: &str) -> UrlResult {
        UrlResult {
            original_url: url.to_string(),
            final_url: Some(url.to_string()),
            success: true,
            failure_reason: None,
            variation_used: None,
            variation_kind: None,
            http_status: Some(200),
            status_class: None,
            attempts: 1,
            attempted_urls: vec![url.to_string()],
            detection: Some(Detection {
                found: true,
                signatures: vec!["hubspotutk".to_string()],
                ..Detection::default()
            }),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let sink = SqliteSink::in_memory("hash").unwrap();
        assert!(sink.run_id() > 0);
        assert_eq!(sink.run_status().unwrap(), Some(RunStatus::Running));
    }

    #[test]
    fn test_write_results() {
        let mut sink = SqliteSink::in_memory("hash").unwrap();
        sink.write(&result("https://a.com")).unwrap();
        sink.write(&result("https://b.com")).unwrap();

        assert_eq!(sink.count_results().unwrap(), 2);
        assert!(sink.healthy());
    }

    #[test]
    fn test_finish_records_status() {
        let mut sink = SqliteSink::in_memory("hash").unwrap();
        sink.finish(RunStatus::Interrupted).unwrap();
        assert_eq!(sink.run_status().unwrap(), Some(RunStatus::Interrupted));
    }

    #[test]
    fn test_runs_accumulate_in_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.db");

        let first = SqliteSink::open(&path, "hash").unwrap().run_id();
        let second = SqliteSink::open(&path, "hash").unwrap().run_id();
        assert!(second > first);
    }
}
