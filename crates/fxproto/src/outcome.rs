//! # Invocation outcome
//!
//! Every invocation ends in exactly one outcome. Failures are classified by kind
//! and carry a message, the chain of causes, and a stack trace that has already
//! been rebased onto the user's code.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

pub const APPLICATION_JSON: &str = "application/json";

/// Per-invocation failure classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The payload could not be turned into the function's input.
    #[serde(rename = "PayloadUnmarshallingException")]
    PayloadUnmarshalling,
    /// The function's return value could not be encoded.
    #[serde(rename = "FunctionResultMarshallingException")]
    FunctionResultMarshalling,
    /// The function reported an error or trapped.
    #[serde(rename = "FunctionThrewException")]
    FunctionThrew,
    /// No function matches the requested name.
    #[serde(rename = "FunctionNotFoundException")]
    FunctionNotFound,
    /// The host could not set up the invocation.
    #[serde(rename = "InternalRuntimeException")]
    Internal,
}

impl FailureKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::PayloadUnmarshalling => "PayloadUnmarshallingException",
            Self::FunctionResultMarshalling => "FunctionResultMarshallingException",
            Self::FunctionThrew => "FunctionThrewException",
            Self::FunctionNotFound => "FunctionNotFoundException",
            Self::Internal => "InternalRuntimeException",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified invocation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            causes: Vec::new(),
            stack_trace: Vec::new(),
        }
    }

    pub fn with_causes(mut self, causes: Vec<String>) -> Self {
        self.causes = causes;
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: Vec<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "kind": self.kind.name(), "message": self.message }))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

/// The result of one invocation, ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success {
        id: String,
        content_type: String,
        data: Vec<u8>,
    },
    Failure {
        id: String,
        failure: Failure,
    },
}

impl InvocationOutcome {
    pub fn success(id: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Success {
            id: id.into(),
            content_type: APPLICATION_JSON.to_string(),
            data,
        }
    }

    pub fn failure(id: impl Into<String>, failure: Failure) -> Self {
        Self::Failure { id: id.into(), failure }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Failure { .. } => Status::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure { failure, .. } => Some(failure),
            Self::Success { .. } => None,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Success { content_type, .. } => content_type,
            Self::Failure { .. } => APPLICATION_JSON,
        }
    }

    /// The bytes the transport sends back: the result, or the structured failure.
    pub fn body(&self) -> Vec<u8> {
        match self {
            Self::Success { data, .. } => data.clone(),
            Self::Failure { failure, .. } => failure.to_json().to_string().into_bytes(),
        }
    }

    /// A structured-mode response event, as written by the local harness.
    pub fn to_cloudevent_json(&self) -> Value {
        let status = match self.status() {
            Status::Success => "success",
            Status::Failure => "failure",
        };
        let data = match self {
            Self::Success { data, .. } => {
                serde_json::from_slice(data).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(data).into_owned()))
            }
            Self::Failure { failure, .. } => failure.to_json(),
        };
        json!({
            "id": self.id(),
            "status": status,
            "datacontenttype": self.content_type(),
            "data": data,
        })
    }
}
