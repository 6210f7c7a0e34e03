//! # fxapi
//!
//! Typed client for the org Data API used by functions at invocation time.
//!
//! Requests are a closed set of types, each knowing how to build its URI and body
//! and how to turn a response into a typed result. Transport is abstracted behind
//! [`HttpClient`] so the host and the tests can swap the network out.

pub mod client;
pub mod error;
pub mod record;
pub mod request;
pub mod uri;
pub mod version;

pub use client::DataApiClient;
pub use client::HttpClient;
pub use client::HttpRequest;
pub use client::HttpResponse;
pub use client::ReqwestClient;
pub use error::Error;
pub use error::RestApiError;
pub use error::Result;
pub use record::ModifyRecordResult;
pub use record::Record;
pub use record::RecordQueryResult;
pub use request::CreateRecord;
pub use request::DataApiRequest;
pub use request::QueryNextRecords;
pub use request::QueryRecords;
pub use request::UpdateRecord;
pub use version::ApiVersion;
