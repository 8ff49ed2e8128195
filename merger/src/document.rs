//! The persisted overlay document.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const MIN_SPEED: u8 = 1;
const MAX_SPEED: u8 = 5;

/// Scrolling message overlay. Both fields are absent after an expiry reset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_message"
    )]
    pub message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_speed"
    )]
    pub speed: Option<u8>,
}

/// Text shown for a message value. `null` means no message; other
/// non-string values are shown as their JSON text.
pub fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A speed is a whole number from 1 to 5.
///
/// Strings must start with a digit 1-5 and parse as an integer; numbers
/// may be written in float form as long as they are integral.
pub fn parse_speed(value: &Value) -> Option<u8> {
    let speed = match value {
        Value::String(text) => {
            if !text.starts_with(|c: char| ('1'..='5').contains(&c)) {
                return None;
            }
            text.parse::<u8>().ok()?
        }
        Value::Number(number) => {
            let speed = number.as_f64()?;
            if speed.fract() != 0.0 || !(f64::from(MIN_SPEED)..=f64::from(MAX_SPEED)).contains(&speed)
            {
                return None;
            }
            speed as u8
        }
        _ => return None,
    };

    (MIN_SPEED..=MAX_SPEED).contains(&speed).then_some(speed)
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(message_text))
}

// Earlier writers stored any integer that started with 1-5.
fn deserialize_speed<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let speed = parse_speed(&value);
            if speed.is_none() {
                tracing::warn!(speed = %value, "Stored ticker speed is not valid, ignoring it");
            }
            Ok(speed)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Flattened metrics keyed by `..`-joined paths.
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    #[serde(default)]
    pub ticker: Ticker,
    /// Unix timestamp in seconds, `0` when the content never expires.
    #[serde(default, deserialize_with = "deserialize_expires")]
    pub expires: u64,
    /// Top-level fields written by other tools, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires > 0 && self.expires < now
    }

    pub fn reset(&mut self) {
        self.metrics.clear();
        self.ticker = Ticker::default();
        self.expires = 0;
    }
}

// Older writers stored the timestamp as a decimal string.
fn deserialize_expires<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Expires {
        Number(u64),
        Text(String),
    }

    match Expires::deserialize(deserializer)? {
        Expires::Number(n) => Ok(n),
        Expires::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid expires value: {s:?}"))),
    }
}
