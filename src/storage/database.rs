//! SQLite game database with migrations
//!
//! Holds the shared state of a running quiz: the current page, the selected
//! questions and every player's guesses. Host and player processes each
//! open their own connection; writes serialise through immediate
//! transactions.

use crate::error::{Result, WhosaidError};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Database manager with migration support
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WhosaidError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let mut db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes the lock up front
    ///
    /// Read-modify-write sequences must run inside one of these so a
    /// concurrent writer cannot interleave between the read and the write.
    pub fn write_transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn migrate(&mut self) -> Result<()> {
        let tx = self.write_transaction()?;

        tx.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying game database migration {}", version);
                tx.execute_batch(migration)?;
                tx.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Single-row game state
    CREATE TABLE game_state (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        session_id TEXT NOT NULL,
        page_id INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    );

    -- Questions picked for this session, in play order
    CREATE TABLE selection (
        position INTEGER PRIMARY KEY,
        quiz_index INTEGER NOT NULL
    );

    -- One guess per player per question
    CREATE TABLE answers (
        player TEXT NOT NULL,
        position INTEGER NOT NULL,
        choice TEXT NOT NULL,
        correct BOOLEAN NOT NULL,
        answered_at TEXT NOT NULL,
        PRIMARY KEY (player, position),
        FOREIGN KEY (position) REFERENCES selection(position) ON DELETE CASCADE
    );

    CREATE INDEX idx_answers_position ON answers(position);
    "#,
];
