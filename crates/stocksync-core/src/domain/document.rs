//! Document - ストア上の 1 レコード

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::DocumentId;

/// Field map of a document (a JSON object).
pub type Fields = Map<String, Value>;

/// A document as returned by the store.
///
/// `created_at` is store metadata: pagination always orders by it, so it is
/// kept outside of `fields` where callers cannot overwrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: DocumentId, created_at: DateTime<Utc>, fields: Fields) -> Self {
        Self {
            id,
            created_at,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn number_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }
}

/// Convert a serializable value into a field map.
///
/// Anything that does not serialize to a JSON object yields an empty map.
pub fn to_fields<T: Serialize>(value: &T) -> Fields {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Fields::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn typed_field_accessors() {
        let fields = to_fields(&json!({ "sku": "TH-001", "currentStock": 12 }));
        let doc = Document::new(
            DocumentId::new("p1"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            fields,
        );

        assert_eq!(doc.str_field("sku"), Some("TH-001"));
        assert_eq!(doc.number_field("currentStock"), Some(12.0));
        assert_eq!(doc.number_field("sku"), None);
        assert!(doc.field("missing").is_none());
    }

    #[test]
    fn non_object_values_become_empty_fields() {
        assert!(to_fields(&42).is_empty());
        assert!(to_fields(&"text").is_empty());
    }
}
