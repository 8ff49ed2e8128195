use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Joins path segments of flattened metric keys.
pub const PATH_SEPARATOR: &str = "..";

/// Flattens a nested object into one entry per leaf.
///
/// Keys are built from the empty root, so a top-level key `a` becomes `..a`
/// and `{"a": {"b": 1}}` becomes `..a..b`. Arrays are leaves. Empty objects
/// contribute nothing.
pub fn flatten_metrics(metrics: &Map<String, Value>) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    flatten_into("", metrics, &mut flat);
    flat
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, flat: &mut BTreeMap<String, Value>) {
    for (key, value) in object {
        let path = format!("{prefix}{PATH_SEPARATOR}{key}");
        match value {
            Value::Object(nested) => flatten_into(&path, nested, flat),
            leaf => {
                flat.insert(path, leaf.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten(value: Value) -> BTreeMap<String, Value> {
        flatten_metrics(value.as_object().unwrap())
    }

    #[test]
    fn test_top_level_keys_get_leading_separator() {
        let flat = flatten(json!({"viewers": 120, "title": "live"}));
        assert_eq!(
            flat,
            BTreeMap::from([
                ("..title".to_string(), json!("live")),
                ("..viewers".to_string(), json!(120)),
            ])
        );
    }

    #[test]
    fn test_nested_objects() {
        let flat = flatten(json!({
            "encoder": {
                "video": {"bitrate": 6000, "fps": 59.94},
                "audio": {"codec": "aac"}
            },
            "up": true,
            "empty": {}
        }));

        assert_eq!(flat.len(), 4);
        assert_eq!(flat["..encoder..video..bitrate"], json!(6000));
        assert_eq!(flat["..encoder..video..fps"], json!(59.94));
        assert_eq!(flat["..encoder..audio..codec"], json!("aac"));
        assert_eq!(flat["..up"], json!(true));
        assert!(flat.values().all(|v| !v.is_object()));
    }

    #[test]
    fn test_arrays_and_nulls_are_leaves() {
        let flat = flatten(json!({"list": [1, {"a": 2}], "nothing": null}));
        assert_eq!(flat["..list"], json!([1, {"a": 2}]));
        assert_eq!(flat["..nothing"], Value::Null);
    }

    #[test]
    fn test_empty() {
        assert!(flatten(json!({})).is_empty());
    }
}
