use super::{ObjectLocation, ObjectMetadata, ObjectStore, StoreError, Visibility};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;

pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Region and credentials come from the standard AWS environment chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        S3Store::new(Client::new(&config))
    }

    pub fn new(client: Client) -> Self {
        S3Store { client }
    }
}

fn classify<E: ProvideErrorMetadata + std::error::Error>(err: &E) -> StoreError {
    match err.code() {
        Some("AccessDenied") | Some("AllAccessDisabled") | Some("InvalidAccessKeyId") => {
            StoreError::AccessDenied(DisplayErrorContext(err).to_string())
        }
        _ => StoreError::Backend(DisplayErrorContext(err).to_string()),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, location: &ObjectLocation) -> Result<Bytes, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => StoreError::NotFound(location.clone()),
                other => classify(&other),
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let acl = match metadata.visibility {
            Visibility::PublicRead => Some(ObjectCannedAcl::PublicRead),
            Visibility::Private => None,
        };

        let output = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(data))
            .content_type(&metadata.content_type)
            .cache_control(&metadata.cache_control)
            .set_acl(acl)
            .send()
            .await
            .map_err(|e| classify(&e.into_service_error()))?;

        tracing::debug!(%location, e_tag = ?output.e_tag(), "Put object to S3");
        Ok(())
    }
}
