//! Request and response shapes shared by the HTTP and Lambda surfaces.
use crate::errors::MergerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// API Gateway proxy event. Only the body matters to the merger.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ApiEvent {
    /// Decodes the body into JSON. A missing or blank body reads as `{}`.
    pub fn json_body(&self) -> Result<Value, MergerError> {
        let Some(body) = self.body.as_deref() else {
            return Ok(json!({}));
        };

        let raw = if self.is_base64_encoded {
            BASE64
                .decode(body)
                .map_err(|e| MergerError::InvalidRequestBody(e.to_string()))?
        } else {
            body.as_bytes().to_vec()
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(json!({}));
        }

        serde_json::from_slice(&raw).map_err(|e| MergerError::InvalidRequestBody(e.to_string()))
    }
}

/// Response in API Gateway proxy form.
///
/// `body` is itself a JSON document, `{"status": <message>}`, encoded as a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, message: &str) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            headers: BTreeMap::from([("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())]),
            body: json!({ "status": message }).to_string(),
        }
    }

    pub fn ok(message: &str) -> Self {
        ApiResponse::new(StatusCode::OK, message)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The `status` message carried in the body.
    pub fn message(&self) -> Option<String> {
        let body: Value = serde_json::from_str(&self.body).ok()?;
        body.get("status")?.as_str().map(str::to_string)
    }
}

impl From<&MergerError> for ApiResponse {
    fn from(err: &MergerError) -> Self {
        ApiResponse::new(err.status_code(), &err.to_string())
    }
}
