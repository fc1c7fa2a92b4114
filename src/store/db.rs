// Cadence — SQLite Database Management
//
// Opens and migrates the SQLite file backing the credential repository.
// Credential values are already AES-GCM sealed before they reach this layer,
// so the database file itself only ever sees ciphertext.

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use super::StoreError;

/// Wrapper around a SQLite connection, shareable across threads.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)
                .map_err(|e| StoreError::Corrupt(format!("cannot restrict database permissions: {}", e)))?;
        }

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (non-durable).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Lock and borrow the underlying connection.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run schema migrations to create or update tables.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS credentials (
                owner_id        TEXT NOT NULL,
                name            TEXT NOT NULL,
                ciphertext      TEXT NOT NULL,
                iv              TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                last_used_at    TEXT NOT NULL,
                PRIMARY KEY (owner_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_credentials_owner
                ON credentials(owner_id);
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
