//! Process-local store backends for `STORAGE_BACKEND=memory` and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::models::fs::FsItem;
use crate::storage::{
    normalize_dir, validate_path, FileStore, KeyPattern, KvItem, KvStore, Namespace, StoreError,
};

#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<(Namespace, String), String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, ns: &Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(ns.clone(), key.to_string())).cloned())
    }

    async fn set(&self, ns: &Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert((ns.clone(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn set_if_absent(
        &self,
        ns: &Namespace,
        key: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let slot = (ns.clone(), key.to_string());
        if entries.contains_key(&slot) {
            return Ok(false);
        }
        entries.insert(slot, value.to_string());
        Ok(true)
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(ns.clone(), key.to_string()));
        Ok(())
    }

    async fn list(
        &self,
        ns: &Namespace,
        pattern: &str,
        include_values: bool,
    ) -> Result<Vec<KvItem>, StoreError> {
        let pattern = KeyPattern::parse(pattern);
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|((owner, key), _)| owner == ns && pattern.matches(key))
            .map(|((_, key), value)| KvItem {
                key: key.clone(),
                value: include_values.then(|| value.clone()),
            })
            .collect())
    }

    async fn flush(&self, ns: &Namespace) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.retain(|(owner, _), _| owner != ns);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFiles {
    files: RwLock<BTreeMap<(Namespace, String), Bytes>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn upload(
        &self,
        ns: &Namespace,
        name: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<FsItem, StoreError> {
        let path = validate_path(name)?.to_string();
        let mut files = self.files.write().await;
        files.insert((ns.clone(), path.clone()), bytes);
        Ok(FsItem::file(path))
    }

    async fn read(&self, ns: &Namespace, path: &str) -> Result<Bytes, StoreError> {
        let path = validate_path(path)?;
        let files = self.files.read().await;
        files
            .get(&(ns.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, ns: &Namespace, path: &str) -> Result<(), StoreError> {
        let path = validate_path(path)?;
        let mut files = self.files.write().await;
        if path.ends_with('/') {
            files.retain(|(owner, key), _| !(owner == ns && key.starts_with(path)));
            return Ok(());
        }
        files
            .remove(&(ns.clone(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, ns: &Namespace, dir: &str) -> Result<Vec<FsItem>, StoreError> {
        let dir = normalize_dir(dir)?;
        let files = self.files.read().await;
        let mut items: Vec<FsItem> = Vec::new();
        for (owner, key) in files.keys() {
            if owner != ns {
                continue;
            }
            let Some(rest) = key.strip_prefix(dir.as_str()) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    let item = FsItem::dir(format!("{dir}{child}/"));
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                None => items.push(FsItem::file(key.clone())),
            }
        }
        Ok(items)
    }
}
