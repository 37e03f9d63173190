//! Process-local object store used for development and tests.

use super::{Existence, ObjectStore, StoreError, StoreResult};
use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

type ObjectKey = (String, String);

#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    // Key: (bucket, object key), Value: (data, content type)
    map: Arc<RwLock<HashMap<ObjectKey, (Bytes, String)>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }

    fn entry_key(bucket: &str, key: &str) -> ObjectKey {
        (bucket.to_string(), key.to_string())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn head(&self, bucket: &str, key: &str) -> Existence {
        if self.map.read().await.contains_key(&Self::entry_key(bucket, key)) {
            Existence::Found
        } else {
            Existence::NotFound
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let map = self.map.read().await;
        let (data, content_type) = map
            .get(&Self::entry_key(bucket, key))
            .ok_or(StoreError::NotFound)?;
        Ok(StoredObject {
            key: key.to_string(),
            content: data.clone(),
            content_type: Some(content_type.clone()),
            size: Some(data.len() as u64),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        self.map
            .write()
            .await
            .insert(Self::entry_key(bucket, key), (content, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.map.write().await.remove(&Self::entry_key(bucket, key));
        Ok(())
    }
}
