// Cadence — Credential Repositories
//
// Persistence behind the vault. A repository stores sealed records keyed by
// `(owner_id, name)` and knows nothing about encryption or locking; the vault
// owns both. Two backends ship: an in-memory map and SQLite.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rusqlite::{params, OptionalExtension};

use super::db::Database;
use super::models::{CredentialRecord, CredentialSummary};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over credential persistence.
pub trait CredentialRepository: Send + Sync {
    /// Insert the record, or replace ciphertext, IV and `last_used_at` of an
    /// existing one. `created_at` of an existing record is preserved.
    /// Returns true if the record was newly created.
    fn upsert(&self, record: &CredentialRecord) -> Result<bool, StoreError>;

    /// Fetch a sealed record.
    fn fetch(&self, owner_id: &str, name: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Refresh `last_used_at`. Returns false if the record does not exist.
    fn touch(&self, owner_id: &str, name: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// List one owner's credentials (metadata only), sorted by name.
    fn list(&self, owner_id: &str) -> Result<Vec<CredentialSummary>, StoreError>;

    /// Remove a record. Returns true if it existed.
    fn remove(&self, owner_id: &str, name: &str) -> Result<bool, StoreError>;
}

// ─── In-memory Implementation ────────────────────────────────────────────────

/// Process-local, non-durable repository.
#[derive(Default)]
pub struct InMemoryCredentialRepository {
    records: RwLock<HashMap<(String, String), CredentialRecord>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(owner_id: &str, name: &str) -> (String, String) {
    (owner_id.to_string(), name.to_string())
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn upsert(&self, record: &CredentialRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        match records.get_mut(&key(&record.owner_id, &record.name)) {
            Some(existing) => {
                existing.ciphertext = record.ciphertext.clone();
                existing.iv = record.iv.clone();
                existing.last_used_at = record.last_used_at;
                Ok(false)
            }
            None => {
                records.insert(key(&record.owner_id, &record.name), record.clone());
                Ok(true)
            }
        }
    }

    fn fetch(&self, owner_id: &str, name: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().get(&key(owner_id, name)).cloned())
    }

    fn touch(&self, owner_id: &str, name: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.records.write().get_mut(&key(owner_id, name)) {
            Some(existing) => {
                existing.last_used_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self, owner_id: &str) -> Result<Vec<CredentialSummary>, StoreError> {
        let mut summaries: Vec<CredentialSummary> = self
            .records
            .read()
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(CredentialRecord::summary)
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    fn remove(&self, owner_id: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(&key(owner_id, name)).is_some())
    }
}

// ─── SQLite Implementation ───────────────────────────────────────────────────

pub struct SqliteCredentialRepository {
    db: Database,
}

impl SqliteCredentialRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }

    /// Parse a full credential row from the database.
    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialRecord> {
        let created_at: String = row.get(4)?;
        let last_used_at: String = row.get(5)?;

        Ok(CredentialRecord {
            owner_id: row.get(0)?,
            name: row.get(1)?,
            ciphertext: row.get(2)?,
            iv: row.get(3)?,
            created_at: Self::parse_timestamp(4, &created_at)?,
            last_used_at: Self::parse_timestamp(5, &last_used_at)?,
        })
    }

    /// Parse a summary row (no ciphertext).
    fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialSummary> {
        let created_at: String = row.get(1)?;
        let last_used_at: String = row.get(2)?;

        Ok(CredentialSummary {
            name: row.get(0)?,
            created_at: Self::parse_timestamp(1, &created_at)?,
            last_used_at: Self::parse_timestamp(2, &last_used_at)?,
        })
    }
}

impl CredentialRepository for SqliteCredentialRepository {
    fn upsert(&self, record: &CredentialRecord) -> Result<bool, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM credentials WHERE owner_id = ?1 AND name = ?2",
                params![record.owner_id, record.name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            "INSERT INTO credentials
                (owner_id, name, ciphertext, iv, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(owner_id, name) DO UPDATE SET
                ciphertext   = excluded.ciphertext,
                iv           = excluded.iv,
                last_used_at = excluded.last_used_at",
            params![
                record.owner_id,
                record.name,
                record.ciphertext,
                record.iv,
                record.created_at.to_rfc3339(),
                record.last_used_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(!exists)
    }

    fn fetch(&self, owner_id: &str, name: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let record = self
            .db
            .conn()
            .query_row(
                "SELECT owner_id, name, ciphertext, iv, created_at, last_used_at
                 FROM credentials WHERE owner_id = ?1 AND name = ?2",
                params![owner_id, name],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn touch(&self, owner_id: &str, name: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let affected = self.db.conn().execute(
            "UPDATE credentials SET last_used_at = ?3 WHERE owner_id = ?1 AND name = ?2",
            params![owner_id, name, at.to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    fn list(&self, owner_id: &str) -> Result<Vec<CredentialSummary>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT name, created_at, last_used_at
             FROM credentials WHERE owner_id = ?1 ORDER BY name ASC",
        )?;

        let rows = stmt.query_map(params![owner_id], Self::row_to_summary)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }

        Ok(summaries)
    }

    fn remove(&self, owner_id: &str, name: &str) -> Result<bool, StoreError> {
        let affected = self.db.conn().execute(
            "DELETE FROM credentials WHERE owner_id = ?1 AND name = ?2",
            params![owner_id, name],
        )?;
        Ok(affected > 0)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::SealedSecret;

    fn record(owner: &str, name: &str, ciphertext: &str) -> CredentialRecord {
        CredentialRecord::new(
            owner,
            name,
            SealedSecret {
                ciphertext: ciphertext.to_string(),
                iv: "iv".to_string(),
            },
            Utc::now(),
        )
    }

    fn backends() -> Vec<Box<dyn CredentialRepository>> {
        vec![
            Box::new(InMemoryCredentialRepository::new()),
            Box::new(SqliteCredentialRepository::new(
                Database::open_in_memory().unwrap(),
            )),
        ]
    }

    #[test]
    fn test_upsert_then_fetch() {
        for repo in backends() {
            assert!(repo.upsert(&record("u1", "llm-api", "c1")).unwrap());
            let fetched = repo.fetch("u1", "llm-api").unwrap().expect("record should exist");
            assert_eq!(fetched.ciphertext, "c1");
            assert!(repo.fetch("u2", "llm-api").unwrap().is_none());
        }
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        for repo in backends() {
            let first = record("u1", "llm-api", "c1");
            repo.upsert(&first).unwrap();

            let mut second = record("u1", "llm-api", "c2");
            second.created_at = first.created_at + chrono::Duration::hours(1);
            second.last_used_at = second.created_at;
            assert!(!repo.upsert(&second).unwrap(), "second write is an update");

            let fetched = repo.fetch("u1", "llm-api").unwrap().unwrap();
            assert_eq!(fetched.ciphertext, "c2");
            assert_eq!(
                fetched.created_at.timestamp_micros(),
                first.created_at.timestamp_micros()
            );
            assert_eq!(
                fetched.last_used_at.timestamp_micros(),
                second.last_used_at.timestamp_micros()
            );
        }
    }

    #[test]
    fn test_touch_missing_returns_false() {
        for repo in backends() {
            assert!(!repo.touch("u1", "nothing", Utc::now()).unwrap());
        }
    }

    #[test]
    fn test_list_is_owner_scoped_and_sorted() {
        for repo in backends() {
            repo.upsert(&record("u1", "spotify", "a")).unwrap();
            repo.upsert(&record("u1", "calendar", "b")).unwrap();
            repo.upsert(&record("u2", "llm-api", "c")).unwrap();

            let names: Vec<String> = repo.list("u1").unwrap().into_iter().map(|s| s.name).collect();
            assert_eq!(names, vec!["calendar", "spotify"]);
            assert_eq!(repo.list("u2").unwrap().len(), 1);
            assert!(repo.list("u3").unwrap().is_empty());
        }
    }

    #[test]
    fn test_remove_is_idempotent() {
        for repo in backends() {
            repo.upsert(&record("u1", "llm-api", "c")).unwrap();
            assert!(repo.remove("u1", "llm-api").unwrap());
            assert!(!repo.remove("u1", "llm-api").unwrap());
        }
    }
}
