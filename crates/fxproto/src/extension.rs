//! # Context extensions
//!
//! `sfcontext` describes the org and the invoking user, `sffncontext` the function
//! invocation itself (access token, request id, target function). Both travel as
//! base64-encoded JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Extension carrying the [`OrgContext`].
pub const ORG_CONTEXT: &str = "sfcontext";

/// Extension carrying the [`FunctionContext`].
pub const FUNCTION_CONTEXT: &str = "sffncontext";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrgContext {
    pub api_version: String,
    pub payload_version: String,
    pub user_context: UserContext,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserContext {
    pub org_id: String,
    pub user_id: String,
    pub on_behalf_of_user_id: Option<String>,
    pub username: String,
    pub salesforce_base_url: String,
    pub org_domain_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionContext {
    pub access_token: String,
    pub request_id: String,
    pub function_invocation_id: Option<String>,
    pub function_name: String,
    pub apex_class_id: Option<String>,
    #[serde(rename = "apexClassFQN")]
    pub apex_class_fqn: Option<String>,
    pub resource: String,
}

impl FunctionContext {
    /// The function part of `functionName`, which is `<project>.<function>`.
    pub fn target_function(&self) -> Option<&str> {
        let name = self.function_name.rsplit('.').next()?;
        (!name.is_empty()).then_some(name)
    }
}

/// Decodes a base64-encoded JSON extension.
///
/// Returns `None` when the extension is absent, not valid base64, or not valid JSON
/// for `T`. Malformed values are logged and otherwise ignored.
pub fn decode_extension<T: DeserializeOwned>(name: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let bytes = match STANDARD.decode(raw) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(extension = name, error = %e, "extension is not valid base64, ignoring");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(extension = name, error = %e, "extension is not valid JSON, ignoring");
            None
        }
    }
}

/// Encodes a value the way [`decode_extension`] expects it.
pub fn encode_extension<T: Serialize>(value: &T) -> serde_json::Result<String> {
    Ok(STANDARD.encode(serde_json::to_vec(value)?))
}
