//! Storage seams: a namespaced key-value store and a namespaced file store.
//!
//! Handlers and the analysis pipeline only ever see `Arc<dyn KvStore>` and
//! `Arc<dyn FileStore>`; the concrete backend is chosen in `main` from config.

pub mod memory;
pub mod redis_kv;
pub mod s3_files;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::fs::FsItem;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Isolates one owner's keys and files from every other owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn user(username: &str) -> Self {
        Self(format!("user/{username}"))
    }

    pub fn sessions() -> Self {
        Self("sessions".to_string())
    }

    /// Credentials, keyed by username.
    pub fn accounts() -> Self {
        Self("accounts".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvItem {
    pub key: String,
    /// Present only when the listing asked for values.
    pub value: Option<String>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, ns: &Namespace, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, ns: &Namespace, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes `value` only if `key` is absent. Returns whether it was written.
    async fn set_if_absent(
        &self,
        ns: &Namespace,
        key: &str,
        value: &str,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, ns: &Namespace, key: &str) -> Result<(), StoreError>;

    /// Lists keys matching `pattern` (an exact key, or a prefix ending in `*`)
    /// in key order.
    async fn list(
        &self,
        ns: &Namespace,
        pattern: &str,
        include_values: bool,
    ) -> Result<Vec<KvItem>, StoreError>;

    /// Removes every key in the namespace.
    async fn flush(&self, ns: &Namespace) -> Result<(), StoreError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `bytes` at `name` in the namespace root and returns the new item.
    async fn upload(
        &self,
        ns: &Namespace,
        name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<FsItem, StoreError>;

    async fn read(&self, ns: &Namespace, path: &str) -> Result<Bytes, StoreError>;

    /// Deletes a file, or everything under a directory path ending in `/`.
    async fn delete(&self, ns: &Namespace, path: &str) -> Result<(), StoreError>;

    /// Non-recursive listing of `dir`. `""`, `"/"` and `"./"` are the root.
    async fn read_dir(&self, ns: &Namespace, dir: &str) -> Result<Vec<FsItem>, StoreError>;
}

/// Splits a key pattern into its match mode.
pub(crate) enum KeyPattern<'a> {
    Exact(&'a str),
    Prefix(&'a str),
}

impl<'a> KeyPattern<'a> {
    pub(crate) fn parse(pattern: &'a str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => KeyPattern::Prefix(prefix),
            None => KeyPattern::Exact(pattern),
        }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == *exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Validates a file path relative to a namespace root.
pub(crate) fn validate_path(path: &str) -> Result<&str, StoreError> {
    let trimmed = path.strip_prefix("./").unwrap_or(path).trim_start_matches('/');
    let body = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if body.is_empty() || body.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(trimmed)
}

/// Normalizes a directory argument to `""` (root) or `"<dir>/"`.
pub(crate) fn normalize_dir(dir: &str) -> Result<String, StoreError> {
    match dir {
        "" | "/" | "." | "./" => Ok(String::new()),
        other => {
            let valid = validate_path(other)?;
            Ok(format!("{}/", valid.trim_end_matches('/')))
        }
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
