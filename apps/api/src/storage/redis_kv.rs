//! Redis-backed key-value store.
//!
//! Keys are laid out as `resumerx:<namespace>:<key>`. Listing and flushing use
//! SCAN so a large keyspace never blocks the server.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient};
use tracing::debug;

use crate::storage::{KeyPattern, KvItem, KvStore, Namespace, StoreError};

const KEY_ROOT: &str = "resumerx";

#[derive(Clone)]
pub struct RedisKv {
    client: RedisClient,
}

impl RedisKv {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }

    /// Collects every full key matching `glob`, sorted and deduplicated
    /// (SCAN may yield a key more than once).
    async fn scan(
        conn: &mut MultiplexedConnection,
        glob: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(glob).await.map_err(backend)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

fn full_key(ns: &Namespace, key: &str) -> String {
    format!("{KEY_ROOT}:{}:{key}", ns.as_str())
}

fn namespace_prefix(ns: &Namespace) -> String {
    format!("{KEY_ROOT}:{}:", ns.as_str())
}

/// Escapes Redis glob metacharacters so literal text matches only itself.
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn scan_glob(ns: &Namespace, pattern: &KeyPattern<'_>) -> String {
    let prefix = escape_glob(&namespace_prefix(ns));
    match pattern {
        KeyPattern::Exact(key) => format!("{prefix}{}", escape_glob(key)),
        KeyPattern::Prefix(key) => format!("{prefix}{}*", escape_glob(key)),
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(format!("redis: {e}"))
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, ns: &Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get(full_key(ns, key)).await.map_err(backend)
    }

    async fn set(&self, ns: &Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(full_key(ns, key), value)
            .await
            .map_err(backend)
    }

    async fn set_if_absent(
        &self,
        ns: &Namespace,
        key: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        conn.set_nx::<_, _, bool>(full_key(ns, key), value)
            .await
            .map_err(backend)
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(full_key(ns, key)).await.map_err(backend)
    }

    async fn list(
        &self,
        ns: &Namespace,
        pattern: &str,
        include_values: bool,
    ) -> Result<Vec<KvItem>, StoreError> {
        let pattern = KeyPattern::parse(pattern);
        let mut conn = self.connection().await?;
        let full_keys = Self::scan(&mut conn, &scan_glob(ns, &pattern)).await?;
        let prefix = namespace_prefix(ns);

        let mut items = Vec::with_capacity(full_keys.len());
        for full in full_keys {
            let Some(key) = full.strip_prefix(&prefix) else {
                continue;
            };
            let value = if include_values {
                // Deleted between SCAN and GET: skip rather than report a ghost.
                match conn.get::<_, Option<String>>(&full).await.map_err(backend)? {
                    Some(v) => Some(v),
                    None => continue,
                }
            } else {
                None
            };
            items.push(KvItem {
                key: key.to_string(),
                value,
            });
        }
        debug!(namespace = ns.as_str(), count = items.len(), "listed keys");
        Ok(items)
    }

    async fn flush(&self, ns: &Namespace) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let glob = format!("{}*", escape_glob(&namespace_prefix(ns)));
        let keys = Self::scan(&mut conn, &glob).await?;
        if keys.is_empty() {
            return Ok(());
        }
        debug!(namespace = ns.as_str(), count = keys.len(), "flushing namespace");
        conn.del::<_, ()>(keys).await.map_err(backend)
    }
}
