//! # fxproto
//!
//! The invocation protocol spoken between the transport and the function host.
//!
//! An [`InvocationEnvelope`] carries one event: its id, payload bytes, content type
//! and a set of extension attributes. Two extensions matter to the host, the org
//! context (`sfcontext`) and the function context (`sffncontext`), both base64-encoded
//! JSON. Decoding them is tolerant: anything missing or malformed becomes an empty
//! context rather than a failed invocation.
//!
//! An [`InvocationOutcome`] is what goes back: either the encoded result, or a
//! [`Failure`] classified by [`FailureKind`].

pub mod envelope;
pub mod extension;
pub mod outcome;

pub use envelope::Error;
pub use envelope::InvocationEnvelope;
pub use extension::FunctionContext;
pub use extension::OrgContext;
pub use extension::UserContext;
pub use outcome::APPLICATION_JSON;
pub use outcome::Failure;
pub use outcome::FailureKind;
pub use outcome::InvocationOutcome;
pub use outcome::Status;
