//! String-keyed JSON blob storage.
//!
//! [`KeyValueStore`] is the seam the synchronized stores persist through.
//! [`Database`] implements it on top of the `kv_entries` table;
//! [`MemoryStore`](crate::MemoryStore) implements it in memory.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Raw key-value operations on serialized blobs.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    fn set_raw(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `true` if an entry was removed.
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Typed JSON helpers available on every [`KeyValueStore`].
pub trait JsonStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}

impl KeyValueStore for Database {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(key, bytes = value.len(), "stored entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}

impl Database {
    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.get_raw("cartItems").unwrap(), None);
        db.set_raw("cartItems", "[]").unwrap();
        db.set_raw("cartItems", "[1]").unwrap();
        assert_eq!(db.get_raw("cartItems").unwrap().as_deref(), Some("[1]"));
        assert_eq!(db.keys().unwrap(), vec!["cartItems".to_string()]);

        assert!(db.remove("cartItems").unwrap());
        assert!(!db.remove("cartItems").unwrap());
        assert_eq!(db.get_raw("cartItems").unwrap(), None);
    }

    #[test]
    fn json_helpers_through_trait_object() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn KeyValueStore = &db;

        store.set_json("wishlistItems", &vec!["a", "b"]).unwrap();
        let back: Option<Vec<String>> = store.get_json("wishlistItems").unwrap();
        assert_eq!(back, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn corrupt_blob_is_a_json_error() {
        let db = Database::open_in_memory().unwrap();
        db.set_raw("userData", "{not json").unwrap();

        let err = db.get_json::<serde_json::Value>("userData").unwrap_err();
        assert!(matches!(err, StoreError::Json { ref key, .. } if key == "userData"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.set_json("userData", &serde_json::json!({"id": "u1"})).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        let v: serde_json::Value = db.get_json("userData").unwrap().unwrap();
        assert_eq!(v["id"], "u1");
    }
}
