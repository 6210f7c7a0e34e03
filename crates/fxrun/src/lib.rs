//! # fxrun
//!
//! Hosts user functions compiled as WebAssembly components.
//!
//! A [`Project`](project::Project) names an ordered classpath. The [`Runtime`](runtime::Runtime)
//! builds one isolated [`Environment`](environment::Environment) per project, detects which
//! SDK contract version the project was built against, discovers its functions and picks a
//! JSON codec. The resulting [`FunctionHost`](invoke::FunctionHost) turns invocation envelopes
//! into outcomes, one fresh store per invocation.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod context;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod project;
pub mod runtime;
pub mod trace;

pub use error::Error;
pub use error::Result;

#[cfg(test)]
mod tests;
