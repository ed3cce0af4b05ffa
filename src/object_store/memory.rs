use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ObjectMetadata, ObjectStore};
use crate::error::CoreError;

struct Object {
    bytes: Vec<u8>,
    content_type: Option<String>,
    user_metadata: HashMap<String, String>,
}

/// In-memory reference `ObjectStore`. Signed URLs are an opaque token string
/// with no real network capability, consistent with the non-goal on
/// presigned-URL generation mechanics.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Object>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        let objects = self.objects.lock().expect("object store lock poisoned");
        objects
            .get(key)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| CoreError::permanent_input(format!("object not found: {key}")))
    }

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        user_metadata: HashMap<String, String>,
    ) -> Result<(), CoreError> {
        let mut objects = self.objects.lock().expect("object store lock poisoned");
        objects.insert(
            key.to_string(),
            Object {
                bytes,
                content_type,
                user_metadata,
            },
        );
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, CoreError> {
        let objects = self.objects.lock().expect("object store lock poisoned");
        let object = objects
            .get(key)
            .ok_or_else(|| CoreError::permanent_input(format!("object not found: {key}")))?;
        Ok(ObjectMetadata {
            size: object.bytes.len() as u64,
            content_type: object.content_type.clone(),
            user_metadata: object.user_metadata.clone(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        let mut objects = self.objects.lock().expect("object store lock poisoned");
        objects.remove(key);
        Ok(())
    }

    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<String, CoreError> {
        let objects = self.objects.lock().expect("object store lock poisoned");
        if !objects.contains_key(key) {
            return Err(CoreError::permanent_input(format!("object not found: {key}")));
        }
        Ok(format!("memory-signed-url://{key}?token={}&expires_in={}", Uuid::new_v4(), expiry.as_secs()))
    }
}
