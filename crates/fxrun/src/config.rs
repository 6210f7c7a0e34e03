//! # Runtime configuration
//!
//! Read from TOML. Every field has a default, so an empty file is a valid config.
//!
//! ```toml
//! api-version = "55.0"
//! inherit-stdio = true
//!
//! [[json-libraries]]
//! name = "snake-case"
//! marker = "sf.functions.json.SnakeCase"
//! naming = "snake-case"
//!
//! [[entry-points]]
//! type = "acme.Greeter"
//! name = "greet"
//!
//! [project]
//! provenance = "Function Bundle"
//! classpath = ["target/functions", "sdk"]
//! ```

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use fxapi::ApiVersion;
use serde::Deserialize;

use crate::codec::JsonLibrary;
use crate::discovery::EntryPoint;
use crate::error::Error;
use crate::error::Result;
use crate::project::Project;

/// Environment variable naming the harness config file.
pub const CONFIG_ENV: &str = "FXRUN_CONFIG";

/// Config file used when `FXRUN_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "fxrun.toml";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Data API version handed to functions.
    pub api_version: String,
    /// Supported JSON libraries, most preferred first.
    pub json_libraries: Vec<JsonLibrary>,
    /// Functions to expose. Empty means manifests, then a scan.
    pub entry_points: Vec<EntryPoint>,
    /// Whether functions write to the host's stdout and stderr.
    pub inherit_stdio: bool,
    pub project: Option<ProjectConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::latest().as_str().to_string(),
            json_libraries: JsonLibrary::defaults(),
            entry_points: Vec::new(),
            inherit_stdio: false,
            project: None,
        }
    }
}

/// The project the harness serves.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default = "default_provenance")]
    pub provenance: String,
    pub classpath: Vec<PathBuf>,
}

impl ProjectConfig {
    pub fn to_project(&self) -> Arc<Project> {
        Project::new(self.provenance.clone(), self.classpath.iter().cloned())
    }
}

fn default_provenance() -> String {
    "Function Bundle".to_string()
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads a config file. Relative classpath entries are resolved against the
    /// directory holding the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Self =
            toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let base = path.parent().unwrap_or(Path::new(""));
        if let Some(project) = config.project.as_mut() {
            for entry in project.classpath.iter_mut() {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
        Ok(config)
    }

    /// The configured Data API version, which must be a supported one.
    pub fn api_version(&self) -> Result<ApiVersion> {
        self.api_version.parse().map_err(|e: fxapi::Error| Error::Config(e.to_string()))
    }
}
