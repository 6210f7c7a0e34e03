//! Supported Data API versions.

use std::str::FromStr;

use crate::error::Error;

/// A Data API version the host can talk to. Ordered oldest first.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApiVersion {
    V53,
    V54,
    V55,
}

impl ApiVersion {
    pub const SUPPORTED: [ApiVersion; 3] = [ApiVersion::V53, ApiVersion::V54, ApiVersion::V55];

    pub fn latest() -> Self {
        ApiVersion::V55
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V53 => "53.0",
            ApiVersion::V54 => "54.0",
            ApiVersion::V55 => "55.0",
        }
    }

    /// The `v<version>` path segment used under `/services/data`.
    pub fn path_segment(self) -> String {
        format!("v{}", self.as_str())
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        Self::SUPPORTED
            .into_iter()
            .find(|v| v.as_str() == bare)
            .ok_or_else(|| Error::UnsupportedApiVersion(s.to_string()))
    }
}
