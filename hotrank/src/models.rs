use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw record from the popular list, kept as the JSON object the endpoint
/// returned.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    raw: Map<String, Value>,
}

impl CatalogEntry {
    /// Wraps a list element; anything other than a JSON object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(raw) => Some(Self { raw }),
            _ => None,
        }
    }

    /// The video id, if present as a non-empty string.
    pub fn bvid(&self) -> Option<&str> {
        self.raw
            .get("bvid")
            .and_then(Value::as_str)
            .filter(|bvid| !bvid.is_empty())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

/// One ranked video in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub bvid: String,
    pub title: String,
    pub pic: String,
    pub owner: Option<Value>,
    /// Display text such as "1.7万+"
    pub online_total: Option<String>,
    pub online_count: Option<i64>,
    pub view: Option<i64>,
    pub danmaku: Option<i64>,
    pub pubdate: String,
}

/// The document served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub updated_at: String,
    pub items: Vec<EnrichedItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}
