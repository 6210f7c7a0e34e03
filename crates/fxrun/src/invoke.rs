//! # Invocation
//!
//! A [`FunctionHost`] serves one started project. Each invocation walks
//! `Received -> Decoding -> Dispatching -> Encoding -> Completed`, or drops to `Failed`
//! from any phase, and always ends in exactly one [`InvocationOutcome`].
//!
//! Everything shared between invocations (registry, codec, linked components) is fixed
//! at start. Each invocation gets its own store and context, so a trap or a bad payload
//! never reaches another invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use fxapi::ApiVersion;
use fxapi::HttpClient;
use fxproto::Failure;
use fxproto::FailureKind;
use fxproto::FunctionContext;
use fxproto::InvocationEnvelope;
use fxproto::InvocationOutcome;
use tracing::debug;
use tracing::info;
use tracing::warn;
use wasmtime::Store;
use wasmtime::component::InstancePre;
use wasmtime::component::Val;

use crate::bridge::Bridge;
use crate::codec::Codec;
use crate::context::EventInfo;
use crate::context::InvocationContext;
use crate::discovery::DiscoveredFunction;
use crate::discovery::ENTRY_EXPORT;
use crate::discovery::FunctionRegistry;
use crate::environment::Environment;
use crate::project::Project;
use crate::trace;

/// Where an invocation is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Received,
    Decoding,
    Dispatching,
    Encoding,
    Completed,
    Failed,
}

/// Logs phase transitions of one invocation.
struct Lifecycle<'a> {
    id: &'a str,
    phase: Phase,
}

impl<'a> Lifecycle<'a> {
    fn new(id: &'a str) -> Self {
        debug!(invocation = %id, phase = ?Phase::Received, "invocation received");
        Self { id, phase: Phase::Received }
    }

    fn advance(&mut self, next: Phase) {
        debug!(invocation = %self.id, from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }
}

/// A started project, ready to serve invocations.
pub struct FunctionHost {
    pub(crate) project: Arc<Project>,
    pub(crate) environment: Arc<Environment>,
    pub(crate) bridge: Bridge,
    pub(crate) registry: FunctionRegistry,
    pub(crate) codec: Option<Arc<dyn Codec>>,
    pub(crate) prepared: BTreeMap<String, InstancePre<InvocationContext>>,
    pub(crate) api_version: ApiVersion,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) inherit_stdio: bool,
}

impl FunctionHost {
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn codec(&self) -> Option<&Arc<dyn Codec>> {
        self.codec.as_ref()
    }

    /// Invokes the function the envelope targets.
    pub async fn invoke(&self, envelope: &InvocationEnvelope) -> InvocationOutcome {
        self.invoke_function(None, envelope).await
    }

    /// Invokes a function by name, or the one the envelope targets when `name` is `None`.
    pub async fn invoke_function(&self, name: Option<&str>, envelope: &InvocationEnvelope) -> InvocationOutcome {
        let mut lifecycle = Lifecycle::new(&envelope.id);
        match self.run(name, envelope, &mut lifecycle).await {
            Ok(data) => {
                lifecycle.advance(Phase::Completed);
                InvocationOutcome::success(envelope.id.clone(), data)
            }
            Err(failure) => {
                lifecycle.advance(Phase::Failed);
                info!(invocation = %envelope.id, kind = %failure.kind, message = %failure.message, "invocation failed");
                InvocationOutcome::failure(envelope.id.clone(), failure)
            }
        }
    }

    async fn run(
        &self,
        name: Option<&str>,
        envelope: &InvocationEnvelope,
        lifecycle: &mut Lifecycle<'_>,
    ) -> Result<Vec<u8>, Failure> {
        lifecycle.advance(Phase::Decoding);
        let org = envelope.org_context();
        let function_context = envelope.function_context();
        if org.is_none() {
            debug!(invocation = %envelope.id, "no org context, using an empty one");
        }

        lifecycle.advance(Phase::Dispatching);
        let function = self.resolve(name, function_context.as_ref())?;
        let codec = self.codec.as_ref().ok_or_else(|| {
            Failure::new(
                FailureKind::PayloadUnmarshalling,
                "no supported JSON library is on the classpath",
            )
        })?;

        if !envelope.is_json() {
            return Err(Failure::new(
                FailureKind::PayloadUnmarshalling,
                format!(
                    "unsupported content type {}",
                    envelope.content_type.as_deref().unwrap_or_default()
                ),
            ));
        }
        let input = codec
            .deserialize(&envelope.data, function.input())
            .map_err(|e| Failure::new(FailureKind::PayloadUnmarshalling, e.to_string()))?;

        let pre = self.prepared.get(function.name()).ok_or_else(|| {
            Failure::new(
                FailureKind::Internal,
                format!("function {} was not linked", function.name()),
            )
        })?;

        let context = InvocationContext::new(
            EventInfo::from(envelope),
            org,
            function_context,
            self.api_version,
            self.http.clone(),
            self.inherit_stdio,
        );
        let mut store = Store::new(self.environment.engine(), context);
        let instance = pre
            .instantiate_async(&mut store)
            .await
            .map_err(|e| Failure::new(FailureKind::Internal, format!("{:#}", e)))?;
        let handle = instance.get_func(&mut store, ENTRY_EXPORT).ok_or_else(|| {
            Failure::new(
                FailureKind::Internal,
                format!("{} lost its `{}` export", function.type_name(), ENTRY_EXPORT),
            )
        })?;

        debug!(invocation = %envelope.id, function = %function.name(), "calling function");
        let mut results = vec![Val::Bool(false)];
        handle.call_async(&mut store, &[input], &mut results).await.map_err(threw)?;
        handle.post_return_async(&mut store).await.map_err(threw)?;

        let result = results.pop().unwrap_or(Val::Option(None));
        let value = returned(function, &**codec, result)?;

        lifecycle.advance(Phase::Encoding);
        codec
            .serialize(&value)
            .map_err(|e| Failure::new(FailureKind::FunctionResultMarshalling, e.to_string()))
    }

    fn resolve(
        &self,
        name: Option<&str>,
        function_context: Option<&FunctionContext>,
    ) -> Result<&Arc<DiscoveredFunction>, Failure> {
        let not_found = |name: &str| {
            Failure::new(
                FailureKind::FunctionNotFound,
                format!(
                    "no function named '{}'; available: {}",
                    name,
                    self.registry.names().collect::<Vec<_>>().join(", ")
                ),
            )
        };

        if let Some(name) = name {
            return self.registry.get(name).ok_or_else(|| not_found(name));
        }
        if let Some(function) = self.registry.single() {
            return Ok(function);
        }
        match function_context.and_then(FunctionContext::target_function) {
            Some(target) => self.registry.get(target).ok_or_else(|| not_found(target)),
            None => {
                warn!("invocation names no function and the project has several");
                Err(not_found(""))
            }
        }
    }
}

impl std::fmt::Debug for FunctionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionHost")
            .field("project", &self.project.id())
            .field("sdk", &self.bridge.version())
            .field("functions", &self.registry.names().collect::<Vec<_>>())
            .field("json", &self.codec.as_ref().map(|c| c.library().name.clone()))
            .finish()
    }
}

/// Classifies an error raised while the function ran.
fn threw(error: wasmtime::Error) -> Failure {
    let frames = trace::rebase(trace::capture(&error));
    Failure::new(FailureKind::FunctionThrew, trace::message(&error))
        .with_causes(trace::causes(&error))
        .with_stack_trace(trace::render(&frames))
}

/// The success value of a call, or the error it reported through `result`.
fn returned(function: &DiscoveredFunction, codec: &dyn Codec, result: Val) -> Result<Val, Failure> {
    if !function.reports_errors() {
        return Ok(result);
    }
    match result {
        Val::Result(Ok(value)) => Ok(value.map_or(Val::Option(None), |v| *v)),
        Val::Result(Err(error)) => {
            let message = match error.as_deref() {
                None => format!("{} reported an error", function.name()),
                Some(Val::String(message)) => message.clone(),
                Some(other) => match codec.serialize(other) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => format!("{} reported an unprintable error: {}", function.name(), e),
                },
            };
            Err(Failure::new(FailureKind::FunctionThrew, message))
        }
        other => Ok(other),
    }
}
