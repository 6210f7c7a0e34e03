//! # Data API requests
//!
//! The set of requests is closed: [`DataApiRequest`] is sealed, and each request
//! carries its own response processor. Processors only see success responses; the
//! client routes everything else through the error parser first.

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;
use crate::record::ModifyRecordResult;
use crate::record::QueryResponse;
use crate::record::RecordQueryResult;
use crate::uri;
use crate::version::ApiVersion;

mod sealed {
    pub trait Sealed {}
}

/// A request against the Data API.
pub trait DataApiRequest: sealed::Sealed {
    type Output;

    fn method(&self) -> Method;

    fn uri(&self, base: &Url, version: ApiVersion) -> Result<Url>;

    fn body(&self) -> Option<Value> {
        None
    }

    /// Maps a success response to the typed result.
    fn process_response(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Result<Self::Output>;
}

/// `POST /sobjects/<type>`
#[derive(Clone, Debug)]
pub struct CreateRecord {
    pub object_type: String,
    pub fields: Map<String, Value>,
}

/// `PATCH /sobjects/<type>/<id>`
#[derive(Clone, Debug)]
pub struct UpdateRecord {
    pub object_type: String,
    pub id: String,
    pub fields: Map<String, Value>,
}

/// `GET /query?q=<soql>`
#[derive(Clone, Debug)]
pub struct QueryRecords {
    pub soql: String,
}

/// `GET <nextRecordsUrl>`
#[derive(Clone, Debug)]
pub struct QueryNextRecords {
    pub next_records_url: String,
}

impl sealed::Sealed for CreateRecord {}
impl sealed::Sealed for UpdateRecord {}
impl sealed::Sealed for QueryRecords {}
impl sealed::Sealed for QueryNextRecords {}

impl DataApiRequest for CreateRecord {
    type Output = ModifyRecordResult;

    fn method(&self) -> Method {
        Method::POST
    }

    fn uri(&self, base: &Url, version: ApiVersion) -> Result<Url> {
        uri::service_uri(base, version, &["sobjects", self.object_type.as_str()])
    }

    fn body(&self) -> Option<Value> {
        Some(Value::Object(self.fields.clone()))
    }

    fn process_response(&self, _status: StatusCode, _headers: &HeaderMap, body: Option<Value>) -> Result<Self::Output> {
        let id = body
            .as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Response("create response carries no record id".into()))?;
        Ok(ModifyRecordResult { id: id.to_string() })
    }
}

impl DataApiRequest for UpdateRecord {
    type Output = ModifyRecordResult;

    fn method(&self) -> Method {
        Method::PATCH
    }

    fn uri(&self, base: &Url, version: ApiVersion) -> Result<Url> {
        uri::service_uri(base, version, &["sobjects", self.object_type.as_str(), self.id.as_str()])
    }

    fn body(&self) -> Option<Value> {
        Some(Value::Object(self.fields.clone()))
    }

    fn process_response(&self, _status: StatusCode, _headers: &HeaderMap, _body: Option<Value>) -> Result<Self::Output> {
        // 204 No Content on success.
        Ok(ModifyRecordResult { id: self.id.clone() })
    }
}

impl DataApiRequest for QueryRecords {
    type Output = RecordQueryResult;

    fn method(&self) -> Method {
        Method::GET
    }

    fn uri(&self, base: &Url, version: ApiVersion) -> Result<Url> {
        let mut url = uri::service_uri(base, version, &["query"])?;
        url.query_pairs_mut().append_pair("q", &self.soql);
        Ok(url)
    }

    fn process_response(&self, _status: StatusCode, _headers: &HeaderMap, body: Option<Value>) -> Result<Self::Output> {
        parse_query(body)
    }
}

impl DataApiRequest for QueryNextRecords {
    type Output = RecordQueryResult;

    fn method(&self) -> Method {
        Method::GET
    }

    fn uri(&self, base: &Url, _version: ApiVersion) -> Result<Url> {
        uri::resolve_path(base, &self.next_records_url)
    }

    fn process_response(&self, _status: StatusCode, _headers: &HeaderMap, body: Option<Value>) -> Result<Self::Output> {
        parse_query(body)
    }
}

fn parse_query(body: Option<Value>) -> Result<RecordQueryResult> {
    let body = body.ok_or_else(|| Error::Response("query response has no body".into()))?;
    let response: QueryResponse = serde_json::from_value(body)
        .map_err(|e| Error::Response(format!("malformed query response: {}", e)))?;
    Ok(response.into())
}
