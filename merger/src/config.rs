use crate::object_store::ObjectLocation;
use serde::Deserialize;
use thiserror::Error;

/// Environment variables naming the stored document when no config file is used.
pub const BUCKET_ENV: &str = "BUCKET";
pub const DATA_KEY_ENV: &str = "DATA_KEY";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty bucket name")]
    EmptyBucket,

    #[error("Empty object key")]
    EmptyKey,

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),
}

/// Backend holding the document
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreType {
    S3,
    Gcs,
    Filesystem { base_dir: String },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub r#type: StoreType,
    pub bucket: String,
    pub key: String,
}

impl StoreConfig {
    /// S3 location read from `BUCKET` and `DATA_KEY`.
    pub fn from_env() -> Result<Self, ValidationError> {
        let bucket = std::env::var(BUCKET_ENV).map_err(|_| ValidationError::MissingEnv(BUCKET_ENV))?;
        let key =
            std::env::var(DATA_KEY_ENV).map_err(|_| ValidationError::MissingEnv(DATA_KEY_ENV))?;

        let config = StoreConfig {
            r#type: StoreType::S3,
            bucket,
            key,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.key)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bucket.is_empty() {
            return Err(ValidationError::EmptyBucket);
        }
        if self.key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 3000,
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 3001,
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Listener accepting document updates
    #[serde(default = "default_listener")]
    pub listener: Listener,
    /// Listener for `/health` and `/ready`
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    pub store: StoreConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.store.validate()
    }
}
