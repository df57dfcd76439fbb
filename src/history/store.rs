//! Remote conversation store backed by libSQL (Turso).
//!
//! This module uses the `libsql` crate (async client) because it supports both:
//! - Remote Turso/libSQL databases via `TURSO_DATABASE_URL` / `LIBSQL_DATABASE_URL` (+ token).
//! - Local file fallback (`CHAT_DB_PATH`, default `chat.db`).
//!
//! Every mutation is a single parameterized statement touching only the
//! changed columns; the message sequence is stored as one JSON text column.

use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libsql::{Builder, Database, params};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::StoreError;
use super::types::{Conversation, Message, decode_messages, encode_messages};

const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_POOLED_CONNECTIONS: usize = 8;
const MAX_REMOTE_CONNECTIONS: usize = 8;
const MAX_LOCAL_CONNECTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbMode {
    Remote,
    Local,
}

#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<RemoteStoreInner>,
}

struct RemoteStoreInner {
    db: Database,
    db_mode: DbMode,
    /// Serialize *writes* for local file databases to reduce SQLITE_BUSY contention.
    /// For remote Turso/libSQL, this is disabled to avoid serializing network latency.
    write_gate: Option<Arc<Semaphore>>,
    /// Bound the number of concurrent connections (important for remote and local).
    conn_gate: Arc<Semaphore>,
    conn_pool: Mutex<Vec<libsql::Connection>>,
}

/// A pooled libSQL connection (returned to the pool on drop).
struct PooledConnection {
    conn: Option<libsql::Connection>,
    store: RemoteStore,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("PooledConnection must hold a connection")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let Ok(mut pool) = self.store.inner.conn_pool.lock() else {
            return;
        };
        if pool.len() >= MAX_POOLED_CONNECTIONS {
            return;
        }
        pool.push(conn);
    }
}

fn env_value(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RemoteStore {
    /// Open the store from environment configuration: remote Turso when a URL
    /// and token are present, otherwise a local file fallback.
    pub async fn connect_from_env() -> Result<Self, StoreError> {
        let url = env_value("TURSO_DATABASE_URL", "LIBSQL_DATABASE_URL");
        let token = env_value("TURSO_AUTH_TOKEN", "LIBSQL_AUTH_TOKEN");

        if let (Some(url), Some(token)) = (url, token) {
            log::info!("Conversation DB: using remote Turso/libSQL");
            let db = Builder::new_remote(url, token).build().await?;
            return Self::build(db, DbMode::Remote).await;
        }

        let path = std::env::var("CHAT_DB_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "chat.db".to_string());
        log::warn!(
            "Conversation DB: TURSO env missing, falling back to local file {}",
            path
        );
        let db = Builder::new_local(path).build().await?;
        Self::build(db, DbMode::Local).await
    }

    /// Open a local file database directly. Used by tests.
    pub async fn open_local(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        Self::build(db, DbMode::Local).await
    }

    async fn build(db: Database, db_mode: DbMode) -> Result<Self, StoreError> {
        let (conn_limit, write_gate) = match db_mode {
            DbMode::Remote => (MAX_REMOTE_CONNECTIONS, None),
            DbMode::Local => (MAX_LOCAL_CONNECTIONS, Some(Arc::new(Semaphore::new(1)))),
        };
        let store = Self {
            inner: Arc::new(RemoteStoreInner {
                db,
                db_mode,
                write_gate,
                conn_gate: Arc::new(Semaphore::new(conn_limit)),
                conn_pool: Mutex::new(Vec::new()),
            }),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn connect(&self) -> Result<PooledConnection, StoreError> {
        let permit = self
            .inner
            .conn_gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::internal("Conversation DB connection gate closed"))?;

        if let Ok(mut pool) = self.inner.conn_pool.lock() {
            if let Some(conn) = pool.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    store: self.clone(),
                    _permit: permit,
                });
            }
        }

        let conn = self.inner.db.connect()?;

        // Best-effort per-connection pragmas; remote mode may ignore them.
        if self.inner.db_mode == DbMode::Local {
            let _ = conn.busy_timeout(DB_BUSY_TIMEOUT);
            let _ = conn.query("PRAGMA journal_mode = WAL;", ()).await;
            let _ = conn.query("PRAGMA synchronous = NORMAL;", ()).await;
        }

        Ok(PooledConnection {
            conn: Some(conn),
            store: self.clone(),
            _permit: permit,
        })
    }

    async fn write_permit(&self) -> Result<Option<OwnedSemaphorePermit>, StoreError> {
        let Some(gate) = self.inner.write_gate.as_ref() else {
            return Ok(None);
        };
        gate.clone()
            .acquire_owned()
            .await
            .map(Some)
            .map_err(|_| StoreError::internal("Conversation DB write gate closed"))
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.connect().await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (\n  id TEXT PRIMARY KEY NOT NULL,\n  user_id TEXT NOT NULL,\n  title TEXT NOT NULL,\n  messages TEXT NOT NULL DEFAULT '[]',\n  created_at_ms INTEGER NOT NULL,\n  updated_at_ms INTEGER NOT NULL\n);",
            (),
        )
        .await?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user_updated ON conversations(user_id, updated_at_ms);",
            (),
        )
        .await?;

        Ok(())
    }

    pub async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let messages = encode_messages(&conversation.messages)?;
        let _write = self.write_permit().await?;
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO conversations (id, user_id, title, messages, created_at_ms, updated_at_ms)\nVALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                conversation.id.as_str(),
                conversation.user_id.as_str(),
                conversation.title.as_str(),
                messages,
                conversation.created_at_ms as i64,
                conversation.updated_at_ms as i64
            ],
        )
        .await?;
        Ok(())
    }

    /// All conversations for one user, most recently updated first. A row
    /// whose message payload fails to decode is skipped so the rest of the
    /// list still loads.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, user_id, title, messages, created_at_ms, updated_at_ms\n   FROM conversations\n  WHERE user_id = ?1\n  ORDER BY updated_at_ms DESC;",
                params![user_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let user_id: String = row.get(1)?;
            let title: String = row.get(2)?;
            let blob: String = row.get(3)?;
            let created_at_ms: i64 = row.get(4)?;
            let updated_at_ms: i64 = row.get(5)?;

            let messages = match decode_messages(&blob) {
                Ok(messages) => messages,
                Err(err) => {
                    log::warn!("Skipping conversation {}: bad message payload: {}", id, err);
                    continue;
                }
            };

            out.push(Conversation {
                id,
                user_id,
                title,
                messages,
                created_at_ms: created_at_ms.max(0) as u64,
                updated_at_ms: updated_at_ms.max(0) as u64,
            });
        }

        Ok(out)
    }

    pub async fn update_title(
        &self,
        conversation_id: &str,
        title: &str,
        updated_at_ms: u64,
    ) -> Result<(), StoreError> {
        let _write = self.write_permit().await?;
        let conn = self.connect().await?;
        conn.execute(
            "UPDATE conversations SET title = ?2, updated_at_ms = ?3 WHERE id = ?1;",
            params![conversation_id, title, updated_at_ms as i64],
        )
        .await?;
        Ok(())
    }

    pub async fn update_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
        updated_at_ms: u64,
    ) -> Result<(), StoreError> {
        let blob = encode_messages(messages)?;
        let _write = self.write_permit().await?;
        let conn = self.connect().await?;
        conn.execute(
            "UPDATE conversations SET messages = ?2, updated_at_ms = ?3 WHERE id = ?1;",
            params![conversation_id, blob, updated_at_ms as i64],
        )
        .await?;
        Ok(())
    }

    pub async fn update_title_and_messages(
        &self,
        conversation_id: &str,
        title: &str,
        messages: &[Message],
        updated_at_ms: u64,
    ) -> Result<(), StoreError> {
        let blob = encode_messages(messages)?;
        let _write = self.write_permit().await?;
        let conn = self.connect().await?;
        conn.execute(
            "UPDATE conversations SET title = ?2, messages = ?3, updated_at_ms = ?4 WHERE id = ?1;",
            params![conversation_id, title, blob, updated_at_ms as i64],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        let _write = self.write_permit().await?;
        let conn = self.connect().await?;
        conn.execute(
            "DELETE FROM conversations WHERE id = ?1;",
            params![conversation_id],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::new_id;

    async fn test_store() -> RemoteStore {
        let path = std::env::temp_dir().join(format!("chatpane-store-{}.db", new_id("t")));
        RemoteStore::open_local(path.to_string_lossy().as_ref())
            .await
            .expect("open test store")
    }

    #[tokio::test]
    async fn test_insert_and_list_orders_by_updated_at_desc() {
        let store = test_store().await;

        let mut a = Conversation::new("user-1", "first");
        a.created_at_ms = 1_000;
        a.updated_at_ms = 1_000;
        let mut b = Conversation::new("user-1", "second");
        b.created_at_ms = 2_000;
        b.updated_at_ms = 2_000;
        let other = Conversation::new("user-2", "not mine");

        store.insert_conversation(&a).await.unwrap();
        store.insert_conversation(&b).await.unwrap();
        store.insert_conversation(&other).await.unwrap();

        let listed = store.list_conversations("user-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "second");
        assert_eq!(listed[1].title, "first");
    }

    #[tokio::test]
    async fn test_update_touches_only_named_columns() {
        let store = test_store().await;

        let mut conversation = Conversation::new("user-1", "before");
        conversation.messages = vec![Message::user("kept as-is")];
        store.insert_conversation(&conversation).await.unwrap();

        store
            .update_title(&conversation.id, "after", conversation.updated_at_ms + 1)
            .await
            .unwrap();

        let listed = store.list_conversations("user-1").await.unwrap();
        assert_eq!(listed[0].title, "after");
        assert_eq!(listed[0].messages.len(), 1);
        assert_eq!(listed[0].messages[0].content, "kept as-is");
        assert_eq!(listed[0].updated_at_ms, conversation.updated_at_ms + 1);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let store = test_store().await;

        let conversation = Conversation::new("user-1", "doomed");
        store.insert_conversation(&conversation).await.unwrap();
        store.delete_conversation(&conversation.id).await.unwrap();

        assert!(store.list_conversations("user-1").await.unwrap().is_empty());
    }
}
