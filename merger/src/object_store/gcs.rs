use super::{ObjectLocation, ObjectMetadata, ObjectStore, StoreError, Visibility};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use google_cloud_storage::client::Storage;

pub struct GcsStore {
    client: Storage,
}

impl GcsStore {
    pub async fn new() -> Result<Self, StoreError> {
        let client = Storage::builder()
            .build()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(GcsStore { client })
    }
}

fn bucket_name(bucket: &str) -> String {
    format!("projects/_/buckets/{bucket}")
}

fn map_error(e: google_cloud_storage::Error, location: &ObjectLocation) -> StoreError {
    match e.http_status_code() {
        Some(404) => StoreError::NotFound(location.clone()),
        Some(401) | Some(403) => StoreError::AccessDenied(e.to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Bytes, StoreError> {
        let mut response = self
            .client
            .read_object(bucket_name(&location.bucket), location.key.clone())
            .send()
            .await
            .map_err(|e| map_error(e, location))?;

        let mut data = BytesMut::new();
        while let Some(chunk) = response.next().await {
            let chunk = chunk.map_err(|e| map_error(e, location))?;
            data.extend_from_slice(&chunk);
        }
        Ok(data.freeze())
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        // Public access on GCS is granted through bucket IAM, not per object.
        if metadata.visibility == Visibility::PublicRead {
            tracing::debug!(%location, "Relying on bucket IAM for public read access");
        }

        let object = self
            .client
            .write_object(bucket_name(&location.bucket), location.key.clone(), data)
            .set_content_type(metadata.content_type.clone())
            .set_cache_control(metadata.cache_control.clone())
            .send_buffered()
            .await
            .map_err(|e| map_error(e, location))?;

        tracing::debug!(%location, generation = object.generation, "Put object to GCS");
        Ok(())
    }
}
