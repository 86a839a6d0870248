//! In-memory object store, for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::AppResult;

use super::ObjectStore;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Object store backed by a plain map. Mirrors the S3 backend's observable
/// behaviour: `head` yields metadata for known keys and `None` otherwise,
/// `put` overwrites unconditionally.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, e.g. to simulate a previous service version's write.
    pub fn seed(&self, key: &str, object: StoredObject) {
        self.objects
            .lock()
            .expect("object map poisoned")
            .insert(key.to_string(), object);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .expect("object map poisoned")
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("object map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> AppResult<Option<HashMap<String, String>>> {
        Ok(self.get(key).map(|object| object.metadata))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<()> {
        self.seed(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                metadata,
            },
        );
        Ok(())
    }
}
