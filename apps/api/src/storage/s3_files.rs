//! S3 / MinIO-backed file store. Each namespace is a key prefix in one bucket.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info};

use crate::models::fs::FsItem;
use crate::storage::{normalize_dir, validate_path, FileStore, Namespace, StoreError};

#[derive(Clone)]
pub struct S3Files {
    client: S3Client,
    bucket: String,
}

impl S3Files {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Every object key under `prefix`, following continuation tokens.
    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string)),
            );

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;
        Ok(())
    }
}

fn object_key(ns: &Namespace, path: &str) -> String {
    format!("{}/{path}", ns.as_str())
}

#[async_trait]
impl FileStore for S3Files {
    async fn upload(
        &self,
        ns: &Namespace,
        name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<FsItem, StoreError> {
        let path = validate_path(name)?;
        let key = object_key(ns, path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(FsItem::file(path))
    }

    async fn read(&self, ns: &Namespace, path: &str) -> Result<Bytes, StoreError> {
        let path = validate_path(path)?;
        let key = object_key(ns, path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    StoreError::NotFound(path.to_string())
                } else {
                    StoreError::Backend(err.to_string())
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(body.into_bytes())
    }

    async fn delete(&self, ns: &Namespace, path: &str) -> Result<(), StoreError> {
        let path = validate_path(path)?;
        let key = object_key(ns, path);
        if !path.ends_with('/') {
            return self.delete_key(&key).await;
        }
        // S3 has no directories: remove every object under the prefix.
        for child in self.keys_under(&key).await? {
            self.delete_key(&child).await?;
        }
        debug!("Deleted prefix s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn read_dir(&self, ns: &Namespace, dir: &str) -> Result<Vec<FsItem>, StoreError> {
        let dir = normalize_dir(dir)?;
        let root = format!("{}/", ns.as_str());
        let prefix = format!("{root}{dir}");

        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;

            for object in resp.contents() {
                if let Some(path) = object.key().and_then(|k| k.strip_prefix(&root)) {
                    items.push(FsItem::file(path));
                }
            }
            for common in resp.common_prefixes() {
                if let Some(path) = common.prefix().and_then(|p| p.strip_prefix(&root)) {
                    items.push(FsItem::dir(path));
                }
            }

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }
        Ok(items)
    }
}
