//! Object storage for the shared document.
//!
//! The merger only ever touches one object, so the trait is reduced to a
//! whole-object `get` and `put`. Backends map their native failures onto
//! [`StoreError`] so the merger can report them uniformly.
use crate::config::{StoreConfig, StoreType};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::sync::Arc;

mod filesystem;
mod gcs;
mod s3;

pub use filesystem::FilesystemStore;
pub use gcs::GcsStore;
pub use s3::S3Store;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectLocation),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: &str, key: &str) -> Self {
        ObjectLocation {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Private,
    PublicRead,
}

/// Attributes attached to the object on every write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub visibility: Visibility,
    pub cache_control: String,
}

impl ObjectMetadata {
    /// Metadata for the published document: readable by the overlay page and never cached.
    pub fn public_json() -> Self {
        ObjectMetadata {
            content_type: "application/json".into(),
            visibility: Visibility::PublicRead,
            cache_control: "no-cache".into(),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, location: &ObjectLocation) -> Result<Bytes, StoreError>;

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError>;
}

pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match &config.r#type {
        StoreType::S3 => Arc::new(S3Store::from_env().await),
        StoreType::Gcs => Arc::new(GcsStore::new().await?),
        StoreType::Filesystem { base_dir } => Arc::new(FilesystemStore::new(base_dir)),
    };
    Ok(store)
}
