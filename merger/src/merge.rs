//! Merges partial updates into the stored overlay document.
//!
//! A request may carry any of `metrics`, `ticker` and `expires`. The stored
//! document is read fresh, cleared when its expiry has passed, updated with
//! only the keys present in the request, and written back whole. Concurrent
//! requests are not coordinated; the last write wins.
use crate::api::ApiResponse;
use crate::document::{Document, Ticker, message_text, parse_speed};
use crate::errors::{MergerError, Result};
use crate::flatten::flatten_metrics;
use crate::metrics_defs::{
    COERCED_VALUES, EXPIRED_RESETS, REQUESTS, STORE_READ_DURATION, STORE_WRITE_DURATION,
};
use crate::object_store::{ObjectLocation, ObjectMetadata, ObjectStore};
use bytes::Bytes;
use serde_json::{Map, Value};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

pub const METRICS_KEY: &str = "metrics";
pub const TICKER_KEY: &str = "ticker";
pub const EXPIRES_KEY: &str = "expires";

pub const SUCCESS_MESSAGE: &str = "Completed upload of new data to storage";

/// Speed used when a request carries an invalid one.
pub const DEFAULT_SPEED: u8 = 1;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

#[derive(Clone)]
pub struct DocumentMerger {
    store: Arc<dyn ObjectStore>,
    location: ObjectLocation,
}

impl DocumentMerger {
    pub fn new(store: Arc<dyn ObjectStore>, location: ObjectLocation) -> Self {
        DocumentMerger { store, location }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub async fn handle(&self, body: &Value) -> ApiResponse {
        self.handle_at(body, unix_now()).await
    }

    /// Handles one request as of `now` (Unix seconds).
    pub async fn handle_at(&self, body: &Value, now: u64) -> ApiResponse {
        tracing::info!(%body, "API call received");

        match self.merge(body, now).await {
            Ok(()) => {
                counter!(REQUESTS, "outcome" => "ok").increment(1);
                ApiResponse::ok(SUCCESS_MESSAGE)
            }
            Err(e) => {
                match &e {
                    MergerError::NoUsefulData(_) => tracing::warn!("{e}"),
                    _ => tracing::error!("{e}"),
                }
                counter!(REQUESTS, "outcome" => e.kind()).increment(1);
                ApiResponse::from(&e)
            }
        }
    }

    /// Loads, merges and stores the document.
    pub async fn merge(&self, body: &Value, now: u64) -> Result<()> {
        let update = body.as_object().ok_or_else(|| {
            MergerError::InvalidRequestBody(format!("expected a JSON object, got {body}"))
        })?;

        let mut document = self.load().await?;

        if document.is_expired(now) {
            tracing::info!(expires = document.expires, now, "Stored document expired, clearing it");
            counter!(EXPIRED_RESETS).increment(1);
            document.reset();
        }

        if !apply_update(&mut document, update, now) {
            return Err(MergerError::NoUsefulData(body.clone()));
        }

        self.save(&document).await?;
        tracing::info!(document = ?document, "Stored new document");
        Ok(())
    }

    async fn load(&self) -> Result<Document> {
        let start = Instant::now();
        let data = self
            .store
            .get(&self.location)
            .await
            .map_err(|e| MergerError::StorageReadFailure(e.to_string()))?;
        let document = Document::from_slice(&data)
            .map_err(|e| MergerError::StorageReadFailure(e.to_string()))?;
        histogram!(STORE_READ_DURATION).record(start.elapsed().as_secs_f64());

        Ok(document)
    }

    async fn save(&self, document: &Document) -> Result<()> {
        let start = Instant::now();
        let data = document
            .to_vec()
            .map_err(|e| MergerError::StorageWriteFailure(e.to_string()))?;
        self.store
            .put(&self.location, Bytes::from(data), &ObjectMetadata::public_json())
            .await
            .map_err(|e| MergerError::StorageWriteFailure(e.to_string()))?;
        histogram!(STORE_WRITE_DURATION).record(start.elapsed().as_secs_f64());

        Ok(())
    }
}

/// Applies the recognized keys of `update` to `document`.
///
/// Returns whether any of `metrics`, `ticker` or `expires` was present,
/// regardless of whether their values were valid.
pub fn apply_update(document: &mut Document, update: &Map<String, Value>, now: u64) -> bool {
    let mut got_new_data = false;

    if let Some(metrics) = update.get(METRICS_KEY) {
        tracing::info!(%metrics, "Received metrics in API call");
        document.metrics = match metrics.as_object() {
            Some(metrics) => flatten_metrics(metrics),
            None => {
                tracing::warn!(%metrics, "Received metrics that are not an object, clearing metrics");
                Default::default()
            }
        };
        got_new_data = true;
    }

    if let Some(ticker) = update.get(TICKER_KEY) {
        tracing::info!(%ticker, "Received ticker data in API call");
        document.ticker = merge_ticker(&document.ticker, ticker);
        got_new_data = true;
    }

    if let Some(expires) = update.get(EXPIRES_KEY) {
        tracing::info!(%expires, "Received expiry value in API call");
        document.expires = match parse_ttl(expires) {
            Some(0) => 0,
            Some(ttl) => now.saturating_add(ttl),
            None => {
                tracing::warn!(
                    %expires,
                    "The expires value sent doesn't seem to be an integer, defaulting to no expiry"
                );
                counter!(COERCED_VALUES, "field" => EXPIRES_KEY).increment(1);
                0
            }
        };
        got_new_data = true;
    }

    got_new_data
}

/// Builds the replacement ticker. Sub-fields missing from the request keep
/// their previous value.
fn merge_ticker(current: &Ticker, update: &Value) -> Ticker {
    let Some(update) = update.as_object() else {
        tracing::warn!(ticker = %update, "Received ticker that is not an object, keeping current ticker");
        return current.clone();
    };

    let message = match update.get("message") {
        Some(message) => {
            if !(message.is_string() || message.is_null()) {
                tracing::warn!(%message, "Received non-string ticker message, storing its text");
            }
            message_text(message)
        }
        None => current.message.clone(),
    };

    let speed = match update.get("speed") {
        Some(speed) => match parse_speed(speed) {
            Some(speed) => Some(speed),
            None => {
                tracing::warn!(
                    %speed,
                    "Received ticker speed value but it was not valid. Expected 1-5"
                );
                counter!(COERCED_VALUES, "field" => "speed").increment(1);
                Some(DEFAULT_SPEED)
            }
        },
        None => current.speed,
    };

    Ticker { message, speed }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A TTL is made of digits only; the empty string counts as zero.
pub fn parse_ttl(value: &Value) -> Option<u64> {
    let text = value_text(value);
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.is_empty() {
        return Some(0);
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{StoreError, Visibility};
    use crate::testutils::MemoryStore;
    use http::StatusCode;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000;

    fn location() -> ObjectLocation {
        ObjectLocation::new("overlay", "data.json")
    }

    fn stored_document() -> Value {
        json!({
            "metrics": {"..viewers": 10},
            "ticker": {"message": "welcome", "speed": 4},
            "expires": 0
        })
    }

    fn merger_with(document: Value) -> (Arc<MemoryStore>, DocumentMerger) {
        let store = Arc::new(MemoryStore::new());
        store.insert(&location(), &document);
        let merger = DocumentMerger::new(store.clone(), location());
        (store, merger)
    }

    fn stored(store: &MemoryStore) -> Value {
        store.document(&location()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_only_keeps_ticker_and_expires() {
        let mut document = stored_document();
        document["expires"] = json!(NOW + 600);
        let (store, merger) = merger_with(document);

        let body = json!({"metrics": {"stream": {"bitrate": 6000, "fps": 60}, "live": true}});
        let response = merger.handle_at(&body, NOW).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.message().as_deref(), Some(SUCCESS_MESSAGE));
        assert_eq!(
            stored(&store),
            json!({
                "metrics": {"..stream..bitrate": 6000, "..stream..fps": 60, "..live": true},
                "ticker": {"message": "welcome", "speed": 4},
                "expires": NOW + 600
            })
        );
    }

    #[tokio::test]
    async fn test_metrics_are_replaced_not_merged() {
        let (store, merger) = merger_with(stored_document());

        merger
            .handle_at(&json!({"metrics": {"bitrate": 1}}), NOW)
            .await;
        assert_eq!(stored(&store)["metrics"], json!({"..bitrate": 1}));
    }

    #[tokio::test]
    async fn test_ticker_message_keeps_speed() {
        let (store, merger) = merger_with(stored_document());

        let response = merger
            .handle_at(&json!({"ticker": {"message": "hello"}}), NOW)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = stored(&store);
        assert_eq!(document["ticker"], json!({"message": "hello", "speed": 4}));
        assert_eq!(document["metrics"], json!({"..viewers": 10}));
    }

    #[tokio::test]
    async fn test_ticker_speed_validation() {
        for (speed, expected) in [
            (json!("3"), 3),
            (json!(5), 5),
            (json!(3.0), 3),
            (json!("9"), 1),
            (json!("abc"), 1),
            (json!("35"), 1),
            (json!(2.5), 1),
            (json!(""), 1),
        ] {
            let (store, merger) = merger_with(stored_document());
            merger
                .handle_at(&json!({"ticker": {"speed": speed}}), NOW)
                .await;
            assert_eq!(
                stored(&store)["ticker"],
                json!({"message": "welcome", "speed": expected}),
                "speed {speed}"
            );
        }
    }

    #[tokio::test]
    async fn test_expires_values() {
        for (expires, expected) in [
            (json!("0"), 0),
            (json!(0), 0),
            (json!("120"), NOW + 120),
            (json!(120), NOW + 120),
            (json!(""), 0),
            (json!("12a"), 0),
            (json!(-5), 0),
            (json!("99999999999999999999999"), 0),
        ] {
            let (store, merger) = merger_with(stored_document());
            let response = merger
                .handle_at(&json!({"expires": expires}), NOW)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(stored(&store)["expires"], json!(expected), "expires {expires}");
        }
    }

    #[tokio::test]
    async fn test_expired_document_is_reset_first() {
        let mut document = stored_document();
        document["expires"] = json!(NOW - 1);
        let (store, merger) = merger_with(document);

        merger
            .handle_at(&json!({"ticker": {"message": "fresh"}}), NOW)
            .await;

        assert_eq!(
            stored(&store),
            json!({"metrics": {}, "ticker": {"message": "fresh"}, "expires": 0})
        );
    }

    #[tokio::test]
    async fn test_expired_document_not_written_on_noop() {
        let mut document = stored_document();
        document["expires"] = json!(NOW - 1);
        let (store, merger) = merger_with(document.clone());

        let response = merger.handle_at(&json!({}), NOW).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(stored(&store), document);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_unexpired_document_is_kept() {
        let mut document = stored_document();
        document["expires"] = json!(NOW);
        let (store, merger) = merger_with(document);

        merger.handle_at(&json!({"metrics": {}}), NOW).await;

        let document = stored(&store);
        assert_eq!(document["ticker"], json!({"message": "welcome", "speed": 4}));
        assert_eq!(document["expires"], json!(NOW));
    }

    #[tokio::test]
    async fn test_loose_stored_ticker_is_repaired() {
        for ticker in [
            json!({"message": 42, "speed": 3}),
            json!({"message": "old", "speed": 3000}),
            json!({"message": "old", "speed": "3"}),
        ] {
            let (store, merger) = merger_with(json!({"metrics": {}, "ticker": ticker, "expires": 0}));

            let response = merger
                .handle_at(&json!({"ticker": {"message": "fix", "speed": "2"}}), NOW)
                .await;

            assert_eq!(response.status(), StatusCode::OK, "ticker {ticker}");
            assert_eq!(stored(&store)["ticker"], json!({"message": "fix", "speed": 2}));
        }
    }

    #[tokio::test]
    async fn test_stored_message_kept_as_text() {
        let (store, merger) =
            merger_with(json!({"metrics": {}, "ticker": {"message": 42, "speed": 3}, "expires": 0}));

        merger.handle_at(&json!({"ticker": {"speed": 5}}), NOW).await;

        assert_eq!(stored(&store)["ticker"], json!({"message": "42", "speed": 5}));
    }

    #[tokio::test]
    async fn test_no_useful_data() {
        let (store, merger) = merger_with(stored_document());

        let response = merger
            .handle_at(&json!({"unrelated": 1}), NOW)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = response.message().unwrap();
        assert!(message.contains("doesn't contain any useful data"));
        assert!(message.contains("unrelated"));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_sub_values_still_persist() {
        let (store, merger) = merger_with(stored_document());

        let response = merger
            .handle_at(&json!({"ticker": {"speed": "fast"}, "expires": "soon"}), NOW)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.put_count(), 1);
        let document = stored(&store);
        assert_eq!(document["ticker"]["speed"], json!(1));
        assert_eq!(document["expires"], json!(0));
    }

    #[tokio::test]
    async fn test_write_metadata() {
        let (store, merger) = merger_with(stored_document());

        merger.handle_at(&json!({"expires": 0}), NOW).await;

        let metadata = store.metadata(&location()).unwrap();
        assert_eq!(metadata.content_type, "application/json");
        assert_eq!(metadata.visibility, Visibility::PublicRead);
        assert_eq!(metadata.cache_control, "no-cache");
    }

    #[tokio::test]
    async fn test_read_failure() {
        let store = Arc::new(MemoryStore::new());
        let merger = DocumentMerger::new(store.clone(), location());

        let response = merger
            .handle_at(&json!({"ticker": {"message": "hi"}}), NOW)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            response
                .message()
                .unwrap()
                .starts_with("Error getting data file from storage")
        );
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let store = Arc::new(MemoryStore::new());
        store.insert_raw(&location(), Bytes::from("not json"));
        let merger = DocumentMerger::new(store.clone(), location());

        let err = merger
            .merge(&json!({"expires": 0}), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, MergerError::StorageReadFailure(_)));
    }

    #[tokio::test]
    async fn test_write_failure() {
        let (store, merger) = merger_with(stored_document());
        store.fail_writes(StoreError::AccessDenied("read-only bucket".into()));

        let response = merger.handle_at(&json!({"expires": 0}), NOW).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = response.message().unwrap();
        assert!(message.starts_with("Error uploading new data to storage"));
        assert!(message.contains("read-only bucket"));
    }

    #[tokio::test]
    async fn test_non_object_body() {
        let (store, merger) = merger_with(stored_document());

        let response = merger.handle_at(&json!(["metrics"]), NOW).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.put_count(), 0);
    }

    #[test]
    fn test_apply_update_ticker_defaults_after_reset() {
        let mut document = Document::default();
        let update = json!({"ticker": {"speed": "2"}});

        assert!(apply_update(&mut document, update.as_object().unwrap(), NOW));
        assert_eq!(
            document.ticker,
            Ticker {
                message: None,
                speed: Some(2)
            }
        );
    }

    #[test]
    fn test_apply_update_non_object_fields() {
        let mut document = Document::from_slice(&serde_json::to_vec(&stored_document()).unwrap())
            .unwrap();
        let update = json!({"metrics": 5, "ticker": "scroll"});

        assert!(apply_update(&mut document, update.as_object().unwrap(), NOW));
        assert!(document.metrics.is_empty());
        assert_eq!(document.ticker.message.as_deref(), Some("welcome"));
        assert_eq!(document.ticker.speed, Some(4));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_speed(&json!("6")), None);
        assert_eq!(parse_ttl(&json!("007")), Some(7));
        assert_eq!(parse_ttl(&json!("1.5")), None);
        assert_eq!(parse_ttl(&json!(true)), None);
    }
}
