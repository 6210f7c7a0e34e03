//! URI construction for Data API resources.

use reqwest::Url;

use crate::error::Error;
use crate::error::Result;
use crate::version::ApiVersion;

/// Builds `<base>/services/data/v<version>/<segments...>`.
///
/// Segments are percent-encoded individually, so a `/` inside a segment never
/// introduces a new path level.
pub fn service_uri(base: &Url, version: ApiVersion, segments: &[&str]) -> Result<Url> {
    if let Some(position) = segments.iter().position(|s| s.is_empty()) {
        return Err(Error::InvalidUri(format!("path segment {} is empty", position)));
    }

    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidUri(format!("'{}' cannot be used as a base URI", base)))?;
        path.pop_if_empty();
        path.push("services").push("data").push(&version.path_segment());
        path.extend(segments);
    }
    Ok(url)
}

/// Resolves a server-provided path (such as `nextRecordsUrl`) against the base URI.
pub fn resolve_path(base: &Url, path: &str) -> Result<Url> {
    if !path.starts_with('/') {
        return Err(Error::InvalidUri(format!("'{}' is not an absolute path", path)));
    }
    base.join(path)
        .map_err(|e| Error::InvalidUri(format!("'{}': {}", path, e)))
}
