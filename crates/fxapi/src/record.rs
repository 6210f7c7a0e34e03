//! Records and typed results returned by the Data API.

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

/// Result of creating or updating a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifyRecordResult {
    pub id: String,
}

/// A single record as returned by a query.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub object_type: String,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Builds a record from its JSON form, reading the object type from `attributes.type`.
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else { return None };
        let object_type = fields
            .remove("attributes")
            .and_then(|attrs| attrs.get("type").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        Some(Self { object_type, fields })
    }

    /// The JSON form of the record, with `attributes.type` restored.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("attributes".into(), serde_json::json!({ "type": self.object_type }));
        for (name, value) in &self.fields {
            out.insert(name.clone(), value.clone());
        }
        Value::Object(out)
    }

    /// Looks up a field. Field names are case-insensitive, an exact match wins.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }
}

/// One page of query results.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordQueryResult {
    pub done: bool,
    pub total_size: u64,
    pub records: Vec<Record>,
    pub next_records_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub next_records_url: Option<String>,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl From<QueryResponse> for RecordQueryResult {
    fn from(response: QueryResponse) -> Self {
        Self {
            done: response.done,
            total_size: response.total_size,
            records: response.records.into_iter().filter_map(Record::from_json).collect(),
            next_records_url: response.next_records_url,
        }
    }
}
