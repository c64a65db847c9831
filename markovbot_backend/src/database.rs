use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::corpus::CorpusStore;

/// Widest line the messages table accepts.
pub const MAX_STORED_LINE_CHARS: usize = 450;

/// SQLite-backed corpus of chat lines.
pub struct CorpusDatabase {
    conn: Mutex<Connection>,
}

impl CorpusDatabase {
    /// Helper to lock the connection
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    /// Open (or create) the database file. The schema is not touched until
    /// [`CorpusStore::ensure_schema`] runs.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open corpus database at {:?}", path))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn count_lines(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl CorpusStore for CorpusDatabase {
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS messages (
                    message TEXT NOT NULL CHECK (length(message) <= {}),
                    inserted_at TEXT NOT NULL
                )"#,
                MAX_STORED_LINE_CHARS
            ),
            [],
        )
        .context("Failed to create messages table")?;

        Ok(())
    }

    fn insert(&self, line: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO messages (message, inserted_at) VALUES (?1, ?2)",
            params![line, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert corpus line")?;
        Ok(())
    }

    fn fetch_all_random_order(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT message FROM messages ORDER BY RANDOM()")?;

        let lines = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read corpus lines")?;

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, CorpusDatabase) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = CorpusDatabase::open(dir.path().join("corpus.db")).expect("db open");
        db.ensure_schema().expect("schema");
        (dir, db)
    }

    #[test]
    fn insert_and_fetch_all_lines() {
        let (_dir, db) = temp_db();
        db.insert("hello world").expect("insert first");
        db.insert("/me waves hello").expect("insert second");

        let mut lines = db.fetch_all_random_order().expect("fetch");
        lines.sort();
        assert_eq!(lines, vec!["/me waves hello", "hello world"]);
        assert_eq!(db.count_lines().expect("count"), 2);
    }

    #[test]
    fn ensure_schema_is_idempotent_and_keeps_rows() {
        let (_dir, db) = temp_db();
        db.insert("kept across restarts").expect("insert");
        db.ensure_schema().expect("second schema pass");
        assert_eq!(db.count_lines().expect("count"), 1);
    }

    #[test]
    fn lines_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("corpus.db");
        {
            let db = CorpusDatabase::open(&path).expect("db open");
            db.ensure_schema().expect("schema");
            db.insert("persisted line here").expect("insert");
        }
        let reopened = CorpusDatabase::open(&path).expect("db reopen");
        reopened.ensure_schema().expect("schema");
        assert_eq!(
            reopened.fetch_all_random_order().expect("fetch"),
            vec!["persisted line here".to_string()]
        );
    }

    #[test]
    fn overlong_lines_are_rejected() {
        let db = CorpusDatabase::open_in_memory().expect("db open");
        db.ensure_schema().expect("schema");

        let limit = "w".repeat(MAX_STORED_LINE_CHARS);
        db.insert(&limit).expect("line at the limit fits");
        let overlong = "w".repeat(MAX_STORED_LINE_CHARS + 1);
        assert!(db.insert(&overlong).is_err());
        assert_eq!(db.count_lines().expect("count"), 1);
    }

    #[test]
    fn insert_before_schema_fails() {
        let db = CorpusDatabase::open_in_memory().expect("db open");
        assert!(db.insert("no table yet").is_err());
        assert!(db.fetch_all_random_order().is_err());
    }
}
