use serde::{Deserialize, Serialize};

/// Flat field map of a row. Keys are column names, values pass through as-is.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A single row as returned by the table service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque identifier assigned by the service.
    pub id: String,
    /// RFC 3339 creation timestamp.
    #[serde(rename = "createdTime")]
    pub created_time: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Numeric value of a field, if it holds a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(serde_json::Value::as_f64)
    }
}
