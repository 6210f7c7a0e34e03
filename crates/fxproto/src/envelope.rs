//! # Invocation envelope
//!
//! The transport-neutral form of one invocation event, plus decoding from a
//! structured-mode CloudEvent encoded as JSON.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::extension::FUNCTION_CONTEXT;
use crate::extension::FunctionContext;
use crate::extension::ORG_CONTEXT;
use crate::extension::OrgContext;
use crate::extension::decode_extension;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The event is not a JSON object.
    Malformed(String),
    /// A required attribute is missing or not a string.
    MissingAttribute(&'static str),
    /// `data_base64` could not be decoded.
    InvalidData(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "Malformed event: {}", msg),
            Self::MissingAttribute(name) => write!(f, "Event is missing required attribute '{}'", name),
            Self::InvalidData(msg) => write!(f, "Invalid event data: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Attributes that are part of the event itself rather than extensions.
const CORE_ATTRIBUTES: &[&str] = &[
    "id",
    "source",
    "type",
    "specversion",
    "time",
    "subject",
    "dataschema",
    "datacontenttype",
    "data",
    "data_base64",
];

/// One invocation event as delivered by the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationEnvelope {
    pub id: String,
    pub source: Option<String>,
    pub event_type: Option<String>,
    pub time: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub extensions: BTreeMap<String, String>,
}

impl InvocationEnvelope {
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            content_type: Some(crate::outcome::APPLICATION_JSON.to_string()),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name).map(String::as_str)
    }

    /// The decoded `sfcontext` extension, if present and well formed.
    pub fn org_context(&self) -> Option<OrgContext> {
        decode_extension(ORG_CONTEXT, self.extension(ORG_CONTEXT))
    }

    /// The decoded `sffncontext` extension, if present and well formed.
    pub fn function_context(&self) -> Option<FunctionContext> {
        decode_extension(FUNCTION_CONTEXT, self.extension(FUNCTION_CONTEXT))
    }

    /// Whether the payload is declared as JSON. A missing content type counts as JSON.
    pub fn is_json(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
                essence == "application/json" || essence.ends_with("+json")
            }
        }
    }

    /// Decodes a structured-mode CloudEvent.
    ///
    /// `data` is kept as its JSON text when the content type is JSON; a string `data`
    /// with any other content type is taken verbatim. String-valued attributes that are
    /// not part of the core event become extensions.
    pub fn from_cloudevent_json(bytes: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| Error::Malformed(e.to_string()))?;
        let Value::Object(attrs) = value else {
            return Err(Error::Malformed("expected a JSON object".into()));
        };

        let string_attr = |name: &str| attrs.get(name).and_then(Value::as_str).map(str::to_string);

        let id = string_attr("id").ok_or(Error::MissingAttribute("id"))?;
        let mut envelope = Self {
            id,
            source: string_attr("source"),
            event_type: string_attr("type"),
            time: string_attr("time"),
            content_type: string_attr("datacontenttype"),
            ..Default::default()
        };

        envelope.data = match (attrs.get("data_base64"), attrs.get("data")) {
            (Some(Value::String(encoded)), _) => STANDARD
                .decode(encoded)
                .map_err(|e| Error::InvalidData(e.to_string()))?,
            (Some(_), _) => return Err(Error::InvalidData("data_base64 must be a string".into())),
            (None, Some(Value::String(text))) if !envelope.is_json() => text.clone().into_bytes(),
            (None, Some(data)) => serde_json::to_vec(data).map_err(|e| Error::InvalidData(e.to_string()))?,
            (None, None) => Vec::new(),
        };

        for (name, value) in &attrs {
            if CORE_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            if let Value::String(s) = value {
                envelope.extensions.insert(name.clone(), s.clone());
            }
        }

        Ok(envelope)
    }
}
