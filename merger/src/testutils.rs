use crate::object_store::{ObjectLocation, ObjectMetadata, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory object store recording what was written.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectLocation, (Bytes, Option<ObjectMetadata>)>>,
    write_error: Mutex<Option<StoreError>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &ObjectLocation, document: &Value) {
        self.insert_raw(location, Bytes::from(document.to_string()));
    }

    pub fn insert_raw(&self, location: &ObjectLocation, data: Bytes) {
        self.objects
            .lock()
            .unwrap()
            .insert(location.clone(), (data, None));
    }

    pub fn document(&self, location: &ObjectLocation) -> Option<Value> {
        let objects = self.objects.lock().unwrap();
        let (data, _) = objects.get(location)?;
        serde_json::from_slice(data).ok()
    }

    pub fn metadata(&self, location: &ObjectLocation) -> Option<ObjectMetadata> {
        let objects = self.objects.lock().unwrap();
        objects.get(location)?.1.clone()
    }

    /// The next `put` fails with `err`.
    pub fn fail_writes(&self, err: StoreError) {
        *self.write_error.lock().unwrap() = Some(err);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Bytes, StoreError> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(location)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StoreError::NotFound(location.clone()))
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        if let Some(err) = self.write_error.lock().unwrap().take() {
            return Err(err);
        }

        self.puts.fetch_add(1, Ordering::Relaxed);
        self.objects
            .lock()
            .unwrap()
            .insert(location.clone(), (data, Some(metadata.clone())));
        Ok(())
    }
}
