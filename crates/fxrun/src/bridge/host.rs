//! Host side of the contract, shared by every adapter.
//!
//! Adapters differ only in how they present these operations to the guest. Errors
//! are returned as plain messages; the guest sees them as the `err` case of the
//! contract function's result.

use fxapi::DataApiClient;
use fxapi::Record;
use fxapi::RecordQueryResult;
use serde_json::Map;
use serde_json::Value;

/// A query page as handed to the guest: records are JSON text.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPage {
    pub done: bool,
    pub next_records_url: Option<String>,
    pub records: Vec<String>,
}

impl From<RecordQueryResult> for QueryPage {
    fn from(result: RecordQueryResult) -> Self {
        Self {
            done: result.done,
            next_records_url: result.next_records_url,
            records: result.records.iter().map(|r| r.to_json().to_string()).collect(),
        }
    }
}

/// Field values arrive as JSON text. Anything that does not parse is taken as a
/// plain string, so `Acme` and `"Acme"` mean the same thing.
pub fn coerce_fields(fields: Vec<(String, String)>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(name, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (name, value)
        })
        .collect()
}

pub async fn create_record(
    api: Result<DataApiClient, String>,
    object_type: String,
    fields: Vec<(String, String)>,
) -> Result<String, String> {
    let api = api?;
    api.create_record(&object_type, coerce_fields(fields))
        .await
        .map(|result| result.id)
        .map_err(|e| e.to_string())
}

pub async fn update_record(
    api: Result<DataApiClient, String>,
    object_type: String,
    id: String,
    fields: Vec<(String, String)>,
) -> Result<String, String> {
    let api = api?;
    api.update_record(&object_type, &id, coerce_fields(fields))
        .await
        .map(|result| result.id)
        .map_err(|e| e.to_string())
}

pub async fn query(api: Result<DataApiClient, String>, soql: String) -> Result<QueryPage, String> {
    let api = api?;
    api.query(&soql).await.map(QueryPage::from).map_err(|e| e.to_string())
}

pub async fn query_more(api: Result<DataApiClient, String>, next_records_url: String) -> Result<QueryPage, String> {
    let api = api?;
    api.query_more(&next_records_url)
        .await
        .map(QueryPage::from)
        .map_err(|e| e.to_string())
}

/// Reads one field of a record in its JSON text form.
///
/// String values come back bare, other values as JSON text. A missing field, a
/// null value, or a record that is not a JSON object yield `None`.
pub fn record_field(record: &str, field: &str) -> Option<String> {
    let value: Value = serde_json::from_str(record).ok()?;
    let record = Record::from_json(value)?;
    match record.field(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
