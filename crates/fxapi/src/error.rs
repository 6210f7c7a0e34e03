//! # Data API errors
//!
//! Every non-success response is routed through [`parse_errors`], which always yields
//! at least one [`RestApiError`]. Bodies that are not in the structured error format
//! are preserved verbatim under an `HTTP_<status>` code.

use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;

/// One structured error reported by the Data API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiError {
    pub error_code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl std::fmt::Display for RestApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)?;
        if !self.fields.is_empty() {
            write!(f, " [{}]", self.fields.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum Error {
    /// The server answered with a non-success status.
    RestApiErrors(Vec<RestApiError>),
    /// The request URI could not be formed.
    InvalidUri(String),
    /// The API version is not one of the supported versions.
    UnsupportedApiVersion(String),
    /// The request never produced a response.
    Transport(String),
    /// A success response did not have the expected shape.
    Response(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RestApiErrors(errors) => {
                let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "Data API request failed: {}", rendered.join("; "))
            }
            Self::InvalidUri(msg) => write!(f, "Invalid URI: {}", msg),
            Self::UnsupportedApiVersion(v) => write!(f, "Unsupported API version: {}", v),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Response(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Token-endpoint style error body.
#[derive(Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Parses the body of a non-success response into its structured errors.
pub fn parse_errors(status: StatusCode, body: &[u8]) -> Vec<RestApiError> {
    if let Ok(errors) = serde_json::from_slice::<Vec<RestApiError>>(body) {
        if !errors.is_empty() {
            return errors;
        }
    }

    if let Ok(single) = serde_json::from_slice::<RestApiError>(body) {
        return vec![single];
    }

    if let Ok(oauth) = serde_json::from_slice::<OAuthError>(body) {
        return vec![RestApiError {
            error_code: oauth.error,
            message: oauth.error_description.unwrap_or_default(),
            fields: Vec::new(),
        }];
    }

    vec![RestApiError {
        error_code: format!("HTTP_{}", status.as_u16()),
        message: String::from_utf8_lossy(body).trim().to_string(),
        fields: Vec::new(),
    }]
}
