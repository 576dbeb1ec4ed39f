//! Durable object store port.
//!
//! Not used by the workflow core. Surrounding code stores order documents
//! and artifacts through it.

use crate::errors::BackendError;
use async_trait::async_trait;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Content type used when a put does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// An object held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// The payload.
    pub body: Vec<u8>,
    /// MIME type of the payload.
    pub content_type: String,
    /// Hex MD5 digest of the payload.
    pub etag: String,
}

impl StoredObject {
    /// Returns the body as UTF-8 text, if it is valid.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Byte payloads under string keys in one named container.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the container name.
    fn container(&self) -> &str;

    /// Stores `body` under `key`, replacing any existing object. Returns the
    /// ETag.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Fetches the object under `key`.
    async fn get(&self, key: &str) -> Result<StoredObject, BackendError>;

    /// Lists keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BackendError>;

    /// Deletes the object under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Copies `source_key` to `destination_key`. Returns the destination key.
    async fn copy(&self, source_key: &str, destination_key: &str) -> Result<String, BackendError>;
}

/// An [`ObjectStore`] kept in memory.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    container: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn not_found(&self, key: &str) -> BackendError {
        BackendError::not_found("object", format!("{}/{key}", self.container))
    }
}

fn etag(body: &[u8]) -> String {
    hex::encode(Md5::digest(body))
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, BackendError> {
        if key.is_empty() {
            return Err(BackendError::invalid_request("put", "object key is empty"));
        }

        let object = StoredObject {
            etag: etag(&body),
            content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            body,
        };
        let tag = object.etag.clone();
        self.objects.write().insert(key.to_string(), object);
        Ok(tag)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, BackendError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| self.not_found(key))
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BackendError> {
        let prefix = prefix.unwrap_or("");
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn copy(&self, source_key: &str, destination_key: &str) -> Result<String, BackendError> {
        let mut objects = self.objects.write();
        let object = objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| self.not_found(source_key))?;
        objects.insert(destination_key.to_string(), object);
        Ok(destination_key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryObjectStore::new("orders");

        let tag = store.put("a.txt", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(tag, "5d41402abc4b2a76b9719d911017c592");

        let object = store.get("a.txt").await.unwrap();
        assert_eq!(object.text(), Some("hello"));
        assert_eq!(object.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(object.etag, tag);
    }

    #[tokio::test]
    async fn test_missing_objects() {
        let store = InMemoryObjectStore::new("orders");

        let err = store.get("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "object not found: orders/missing");
        assert!(store.copy("missing", "b").await.is_err());
        assert!(store.delete("missing").await.is_ok());
        assert!(store.put("", Vec::new(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = InMemoryObjectStore::new("orders");
        for key in ["in/2.json", "out/1.json", "in/1.json", "inbox.json"] {
            store.put(key, b"{}".to_vec(), Some("application/json")).await.unwrap();
        }

        assert_eq!(
            store.list(Some("in/")).await.unwrap(),
            vec!["in/1.json", "in/2.json"]
        );
        assert_eq!(store.list(None).await.unwrap().len(), 4);
        assert!(store.list(Some("zzz")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let store = InMemoryObjectStore::new("orders");
        store.put("src", b"data".to_vec(), Some("application/octet-stream")).await.unwrap();

        assert_eq!(store.copy("src", "dst").await.unwrap(), "dst");
        assert_eq!(store.get("dst").await.unwrap(), store.get("src").await.unwrap());

        store.delete("src").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.container(), "orders");
    }
}
