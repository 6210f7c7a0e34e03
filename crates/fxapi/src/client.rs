//! # Data API client
//!
//! [`DataApiClient`] binds an org URL, an API version and an access token to an
//! [`HttpClient`]. It adds authentication and JSON headers, runs the request, and
//! sends every non-success status through the error parser before any response
//! processor sees it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::error::parse_errors;
use crate::record::ModifyRecordResult;
use crate::record::RecordQueryResult;
use crate::request::CreateRecord;
use crate::request::DataApiRequest;
use crate::request::QueryNextRecords;
use crate::request::QueryRecords;
use crate::request::UpdateRecord;
use crate::version::ApiVersion;

/// An outgoing HTTP request.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// A received HTTP response with its body fully read.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Transport used by the client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

/// Client for one org, one API version and one access token.
#[derive(Clone)]
pub struct DataApiClient {
    base: Url,
    version: ApiVersion,
    access_token: String,
    http: Arc<dyn HttpClient>,
}

impl DataApiClient {
    pub fn new(
        org_domain_url: &str,
        version: ApiVersion,
        access_token: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let base = Url::parse(org_domain_url)
            .map_err(|e| Error::InvalidUri(format!("'{}': {}", org_domain_url, e)))?;
        Ok(Self {
            base,
            version,
            access_token: access_token.into(),
            http,
        })
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Runs a request and processes its response.
    pub async fn execute<R>(&self, request: &R) -> Result<R::Output>
    where
        R: DataApiRequest + Sync,
    {
        let method = request.method();
        let url = request.uri(&self.base, self.version)?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| Error::Transport("access token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let body = match request.body() {
            Some(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(&value).map_err(|e| Error::Transport(e.to_string()))?)
            }
            None => None,
        };

        debug!(method = %method, url = %url, "data api request");
        let response = self
            .http
            .execute(HttpRequest { method, url, headers, body })
            .await?;
        debug!(status = %response.status, "data api response");

        if !response.status.is_success() {
            return Err(Error::RestApiErrors(parse_errors(response.status, &response.body)));
        }

        let body = if response.body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(&response.body)
                    .map_err(|e| Error::Response(format!("body is not JSON: {}", e)))?,
            )
        };

        request.process_response(response.status, &response.headers, body)
    }

    pub async fn create_record(&self, object_type: &str, fields: Map<String, Value>) -> Result<ModifyRecordResult> {
        self.execute(&CreateRecord {
            object_type: object_type.to_string(),
            fields,
        })
        .await
    }

    pub async fn update_record(&self, object_type: &str, id: &str, fields: Map<String, Value>) -> Result<ModifyRecordResult> {
        self.execute(&UpdateRecord {
            object_type: object_type.to_string(),
            id: id.to_string(),
            fields,
        })
        .await
    }

    pub async fn query(&self, soql: &str) -> Result<RecordQueryResult> {
        self.execute(&QueryRecords { soql: soql.to_string() }).await
    }

    pub async fn query_more(&self, next_records_url: &str) -> Result<RecordQueryResult> {
        self.execute(&QueryNextRecords {
            next_records_url: next_records_url.to_string(),
        })
        .await
    }
}

impl std::fmt::Debug for DataApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataApiClient")
            .field("base", &self.base.as_str())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
