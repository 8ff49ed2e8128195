use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for merger operations
pub type Result<T, E = MergerError> = std::result::Result<T, E>;

/// Reasons a request ends without a successful write.
///
/// Each one is reported to the caller as a 500 carrying the error text.
/// Malformed `speed` or `expires` values are not errors; they are coerced.
#[derive(Error, Debug)]
pub enum MergerError {
    #[error("Error getting data file from storage : {0}")]
    StorageReadFailure(String),

    #[error("Error uploading new data to storage : {0}")]
    StorageWriteFailure(String),

    #[error(
        "Received an API call, but it doesn't contain any useful data, not doing anything. This is what we received : {0}"
    )]
    NoUsefulData(Value),

    #[error("Could not parse request body as a JSON object : {0}")]
    InvalidRequestBody(String),
}

impl MergerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Short label used for metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            MergerError::StorageReadFailure(_) => "storage_read_failure",
            MergerError::StorageWriteFailure(_) => "storage_write_failure",
            MergerError::NoUsefulData(_) => "no_useful_data",
            MergerError::InvalidRequestBody(_) => "invalid_request_body",
        }
    }
}
