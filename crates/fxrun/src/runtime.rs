//! # Runtime
//!
//! Owns the wasm engine and the registry of environments, one per project.
//! [`Runtime::start`] takes a project from classpath to a ready [`FunctionHost`]:
//! SDK detection, function discovery, codec selection and linking all happen here,
//! so every incompatibility surfaces before the first invocation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use fxapi::ApiVersion;
use fxapi::HttpClient;
use fxapi::ReqwestClient;
use tracing::debug;
use tracing::info;
use wasmtime::Engine;
use wasmtime::component::Linker;

use crate::bridge::Bridge;
use crate::bridge::CONTRACT_TYPE;
use crate::codec;
use crate::config::RuntimeConfig;
use crate::context::InvocationContext;
use crate::discovery;
use crate::environment::Environment;
use crate::error::Error;
use crate::error::Result;
use crate::invoke::FunctionHost;
use crate::project::Project;
use crate::project::ProjectId;

/// The central registry of environments.
pub struct Runtime {
    engine: Engine,
    config: RuntimeConfig,
    api_version: ApiVersion,
    http: Arc<dyn HttpClient>,
    environments: DashMap<ProjectId, Arc<Environment>>,
}

impl Runtime {
    /// A runtime talking to the Data API over HTTPS.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let http = ReqwestClient::new().map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Self::with_http_client(config, Arc::new(http))
    }

    pub fn with_http_client(config: RuntimeConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        let api_version = config.api_version()?;

        let mut wasm = wasmtime::Config::new();
        wasm.async_support(true);
        wasm.wasm_component_model(true);
        wasm.wasm_backtrace(true);
        let engine = Engine::new(&wasm).map_err(Error::Engine)?;

        info!(api_version = %api_version, "runtime ready");
        Ok(Self {
            engine,
            config,
            api_version,
            http,
            environments: DashMap::new(),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// The project's environment, built on first request.
    ///
    /// Concurrent first requests build it once; every caller gets the same `Arc`.
    pub fn environment(&self, project: &Project) -> Result<Arc<Environment>> {
        if let Some(environment) = self.environments.get(&project.id()) {
            return Ok(environment.value().clone());
        }

        let environment = self
            .environments
            .entry(project.id())
            .or_try_insert_with(|| {
                info!(project = %project, "building environment");
                Environment::build(&self.engine, project).map(Arc::new)
            })?;
        Ok(environment.value().clone())
    }

    /// Prepares a project for invocation.
    pub async fn start(&self, project: Arc<Project>) -> Result<FunctionHost> {
        let environment = self.environment(&project)?;

        let bridge = Bridge::detect(&environment)?;
        let registry = discovery::discover(&environment, &project, &self.config.entry_points)?;
        let codec = codec::select(&environment, &self.config.json_libraries);

        let mut linker: Linker<InvocationContext> = Linker::new(&self.engine);
        wasmtime_wasi::p2::add_to_linker_async(&mut linker).map_err(Error::Engine)?;

        let import_names = discovery::contract_import_names(&environment, &registry)?;
        bridge.install(&mut linker, &import_names).map_err(|e| {
            Error::IncompatibleFunction(format!("SDK {} cannot be installed: {:#}", bridge.version(), e))
        })?;

        // The contract type must link against its own adapter.
        let contract = environment.load(CONTRACT_TYPE)?;
        linker.instantiate_pre(&contract).map_err(|e| {
            Error::IncompatibleFunction(format!(
                "{} does not link against SDK {}: {:#}",
                CONTRACT_TYPE,
                bridge.version(),
                e
            ))
        })?;

        let mut prepared = BTreeMap::new();
        for function in registry.iter() {
            let pre = linker.instantiate_pre(function.component()).map_err(|e| {
                Error::IncompatibleFunction(format!(
                    "function {} ({}) does not link against SDK {}: {:#}",
                    function.name(),
                    function.type_name(),
                    bridge.version(),
                    e
                ))
            })?;
            debug!(function = %function.name(), "function linked");
            prepared.insert(function.name().to_string(), pre);
        }

        info!(
            project = %project.id(),
            sdk = %bridge.version(),
            functions = registry.len(),
            json = codec.as_ref().map(|c| c.library().name.as_str()).unwrap_or("none"),
            "project started"
        );

        Ok(FunctionHost {
            project,
            environment,
            bridge,
            registry,
            codec,
            prepared,
            api_version: self.api_version,
            http: self.http.clone(),
            inherit_stdio: self.config.inherit_stdio,
        })
    }

    /// Projects with a built environment.
    pub fn projects(&self) -> BTreeSet<ProjectId> {
        self.environments.iter().map(|entry| *entry.key()).collect()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("api_version", &self.api_version)
            .field("environments", &self.environments.len())
            .finish()
    }
}
