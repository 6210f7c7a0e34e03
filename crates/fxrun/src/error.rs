//! Startup errors.
//!
//! Anything that goes wrong before the first invocation is fatal: the host refuses to
//! start rather than serve a project it cannot run correctly. Per-invocation failures
//! are not errors in this sense; they become [`fxproto::Failure`] outcomes.

use crate::environment;

#[derive(Debug)]
pub enum Error {
    /// A classpath entry is missing or unreadable, or a type failed to compile.
    EnvironmentLoad(environment::Error),
    /// No valid function, or the project cannot be linked against a known SDK version.
    IncompatibleFunction(String),
    /// The configuration could not be read or holds unsupported values.
    Config(String),
    /// The wasm engine could not be set up.
    Engine(wasmtime::Error),
}

impl Error {
    /// The stable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnvironmentLoad(_) => "EnvironmentLoadError",
            Self::IncompatibleFunction(_) => "IncompatibleFunctionException",
            Self::Config(_) => "ConfigError",
            Self::Engine(_) => "EngineError",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvironmentLoad(e) => write!(f, "{}: {}", self.kind(), e),
            Self::IncompatibleFunction(msg) => write!(f, "{}: {}", self.kind(), msg),
            Self::Config(msg) => write!(f, "{}: {}", self.kind(), msg),
            Self::Engine(e) => write!(f, "{}: {:#}", self.kind(), e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EnvironmentLoad(e) => Some(e),
            _ => None,
        }
    }
}

impl From<environment::Error> for Error {
    fn from(e: environment::Error) -> Self {
        Self::EnvironmentLoad(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
