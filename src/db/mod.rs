//! SQLite expense store
//!
//! The expense tables are shared with the rest of the finance application.
//! The importer only needs user lookup and atomic batch inserts.

use crate::models::{ExpenseRecord, ImportBatch, User};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Collaborator interface used by the import pipeline
pub trait ExpenseStore {
    /// Look up a user; `Ok(None)` if the id is unknown
    fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Persist every record of the batch or none of them.
    ///
    /// Returns the number of expenses written.
    fn create_expenses(&mut self, batch: &ImportBatch) -> Result<usize>;
}

pub struct SqliteStore {
    conn: Connection,
}

/// Open (or create) the database file and make sure the schema exists
pub fn init_database(path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    // Enable WAL mode for better concurrent access
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

    SqliteStore::with_connection(conn)
}

/// In-memory database with the full schema
pub fn open_in_memory() -> Result<SqliteStore> {
    SqliteStore::with_connection(Connection::open_in_memory()?)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- One row per imported statement document
        CREATE TABLE IF NOT EXISTS expense_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            source_file TEXT NOT NULL,
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            expenses_count INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            amount REAL NOT NULL CHECK(amount > 0),
            notes TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            import_id INTEGER REFERENCES expense_imports(id) ON DELETE SET NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date);
        "#,
    )?;

    Ok(())
}

impl SqliteStore {
    pub fn with_connection(conn: Connection) -> Result<Self> {
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, active) VALUES (?1, ?2, ?3)",
            params![user.id, user.name, user.active],
        )?;
        Ok(())
    }

    pub fn expenses_for_user(&self, user_id: &str) -> Result<Vec<ExpenseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, amount, category_id, notes, date, created_at, active
             FROM expenses WHERE user_id = ?1 ORDER BY date, rowid",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(ExpenseRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                amount: row.get(2)?,
                category_id: row.get(3)?,
                notes: row.get(4)?,
                date: row.get(5)?,
                created_at: row.get(6)?,
                active: row.get(7)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Source names of the recorded imports, oldest first
    pub fn import_sources(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_file FROM expense_imports ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn import_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM expense_imports", [], |row| row.get(0))?)
    }
}

impl ExpenseStore for SqliteStore {
    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, active FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn create_expenses(&mut self, batch: &ImportBatch) -> Result<usize> {
        if batch.records.is_empty() {
            return Ok(0);
        }

        // Dropping the transaction without commit rolls back
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO expense_imports (user_id, source_file, expenses_count) VALUES (?1, ?2, ?3)",
            params![batch.user_id, batch.source_file, batch.records.len() as i64],
        )
        .context("Failed to record import")?;
        let import_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO expenses (id, user_id, category_id, amount, notes, date, created_at, active, import_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in &batch.records {
                stmt.execute(params![
                    record.id,
                    record.user_id,
                    record.category_id,
                    record.amount,
                    record.notes,
                    record.date,
                    record.created_at,
                    record.active,
                    import_id,
                ])
                .with_context(|| format!("Failed to insert expense {}", record.id))?;
            }
        }

        tx.commit().context("Failed to commit expense batch")?;
        Ok(batch.records.len())
    }
}
