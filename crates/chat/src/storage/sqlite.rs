//! SQLite-backed bucket store

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::BucketStore;
use crate::models::UserId;

/// Database migrations, tracked through the user_version pragma
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE date_buckets (
                user_id TEXT NOT NULL,
                partner_id TEXT NOT NULL,
                label TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, partner_id)
            );
            "#,
        ),
    ])
}

/// Bucket labels in a SQLite file
pub struct SqliteBucketStore {
    conn: Mutex<Connection>,
}

impl SqliteBucketStore {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps the polling writer from blocking readers
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// Store backed by a private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BucketStore for SqliteBucketStore {
    fn load_all(&self, user: &UserId) -> Result<HashMap<UserId, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT partner_id, label FROM date_buckets WHERE user_id = ?")?;

        let rows = stmt.query_map([user.as_str()], |row| {
            Ok((UserId::new(row.get::<_, String>(0)?), row.get::<_, String>(1)?))
        })?;

        let mut labels = HashMap::new();
        for row in rows {
            let (partner, label) = row?;
            labels.insert(partner, label);
        }
        Ok(labels)
    }

    fn get(&self, user: &UserId, partner: &UserId) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let label = conn
            .query_row(
                "SELECT label FROM date_buckets WHERE user_id = ? AND partner_id = ?",
                params![user.as_str(), partner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(label)
    }

    fn put(&self, user: &UserId, partner: &UserId, label: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO date_buckets (user_id, partner_id, label, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT (user_id, partner_id)
             DO UPDATE SET label = excluded.label, updated_at = excluded.updated_at",
            params![user.as_str(), partner.as_str(), label],
        )
        .context("Failed to save date bucket")?;
        Ok(())
    }

    fn clear_user(&self, user: &UserId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM date_buckets WHERE user_id = ?", [user.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn test_put_replaces_label() {
        let store = SqliteBucketStore::in_memory().unwrap();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        store.put(&alice, &bob, "Yesterday").unwrap();
        store.put(&alice, &bob, "Today").unwrap();

        assert_eq!(store.get(&alice, &bob).unwrap().as_deref(), Some("Today"));
        assert_eq!(store.load_all(&alice).unwrap().len(), 1);
    }

    #[test]
    fn test_labels_survive_reopen() {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to keep test databases recognizable
        let db_path = dir.path().join("buckets.test.sqlite");
        let alice = UserId::new("alice");

        {
            let store = SqliteBucketStore::new(&db_path).unwrap();
            store.put(&alice, &UserId::new("bob"), "Today").unwrap();
            store.put(&alice, &UserId::new("carol"), "Mar 14, 2024").unwrap();
        }

        let store = SqliteBucketStore::new(&db_path).unwrap();
        let labels = store.load_all(&alice).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[&UserId::new("carol")], "Mar 14, 2024");
    }

    #[test]
    fn test_clear_user_leaves_others() {
        let store = SqliteBucketStore::in_memory().unwrap();
        let alice = UserId::new("alice");
        let carol = UserId::new("carol");
        let bob = UserId::new("bob");

        store.put(&alice, &bob, "Today").unwrap();
        store.put(&carol, &bob, "Today").unwrap();
        store.clear_user(&alice).unwrap();

        assert!(store.load_all(&alice).unwrap().is_empty());
        assert_eq!(store.load_all(&carol).unwrap().len(), 1);
    }
}
