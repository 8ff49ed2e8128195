use super::{ObjectLocation, ObjectMetadata, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};

/// Stores objects as files under `<base_dir>/<bucket>/<key>`.
///
/// Object metadata has no filesystem equivalent and is dropped.
pub struct FilesystemStore {
    base_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(base_dir: &str) -> Self {
        FilesystemStore {
            base_dir: PathBuf::from(base_dir),
        }
    }

    fn path(&self, location: &ObjectLocation) -> PathBuf {
        self.base_dir
            .join(&location.bucket)
            .join(Path::new(&location.key))
    }
}

fn map_io_error(e: io::Error, location: &ObjectLocation) -> StoreError {
    match e.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(location.clone()),
        io::ErrorKind::PermissionDenied => StoreError::AccessDenied(e.to_string()),
        _ => StoreError::Io(e),
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Bytes, StoreError> {
        let data = tokio::fs::read(self.path(location))
            .await
            .map_err(|e| map_io_error(e, location))?;
        Ok(Bytes::from(data))
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        _metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Create or overwrite file
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| map_io_error(e, location))?;

        tracing::debug!(path = ?path, bytes = data.len(), "Stored object");
        Ok(())
    }
}
