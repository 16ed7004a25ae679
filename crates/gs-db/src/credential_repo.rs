use gs_core::error::StoreError;
use gs_core::{ConversationId, CredentialStore};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::schema;

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        schema::open(path).map(Self::new).map_err(backend)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        schema::open_in_memory().map(Self::new).map_err(backend)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM credentials", [], |row| row.get(0))
            .map_err(backend)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Backend {
            message: "connection lock poisoned".to_string(),
        })
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend {
        message: err.to_string(),
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, id: ConversationId) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT token FROM credentials WHERE conversation_id = ?1",
            params![id.get()],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)
    }

    fn add(&self, id: ConversationId, token: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO credentials (conversation_id, token) VALUES (?1, ?2)
             ON CONFLICT(conversation_id) DO UPDATE SET
                token = excluded.token,
                created_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
            params![id.get(), token],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn delete(&self, id: ConversationId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM credentials WHERE conversation_id = ?1",
            params![id.get()],
        )
        .map_err(backend)?;
        Ok(())
    }
}
