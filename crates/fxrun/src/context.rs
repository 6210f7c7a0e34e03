//! Store data for one invocation.

use std::sync::Arc;
use std::sync::OnceLock;

use fxapi::ApiVersion;
use fxapi::DataApiClient;
use fxapi::HttpClient;
use fxproto::FunctionContext;
use fxproto::InvocationEnvelope;
use fxproto::OrgContext;
use fxproto::UserContext;
use wasmtime::component::ResourceTable;
use wasmtime_wasi::WasiCtx;
use wasmtime_wasi::WasiCtxView;
use wasmtime_wasi::WasiView;

/// Event metadata visible to the function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventInfo {
    pub id: String,
    pub source: Option<String>,
    pub event_type: Option<String>,
    pub time: Option<String>,
}

impl From<&InvocationEnvelope> for EventInfo {
    fn from(envelope: &InvocationEnvelope) -> Self {
        Self {
            id: envelope.id.clone(),
            source: envelope.source.clone(),
            event_type: envelope.event_type.clone(),
            time: envelope.time.clone(),
        }
    }
}

/// Per-invocation state held by the wasmtime Store.
///
/// Built for exactly one invocation and dropped with its store. The Data API client
/// is only constructed if the function asks for it.
pub struct InvocationContext {
    event: EventInfo,
    org: OrgContext,
    function: FunctionContext,
    api_version: ApiVersion,
    http: Arc<dyn HttpClient>,
    data_api: OnceLock<DataApiClient>,
    wasi: WasiCtx,
    table: ResourceTable,
}

impl InvocationContext {
    pub fn new(
        event: EventInfo,
        org: Option<OrgContext>,
        function: Option<FunctionContext>,
        api_version: ApiVersion,
        http: Arc<dyn HttpClient>,
        inherit_stdio: bool,
    ) -> Self {
        let mut wasi = WasiCtx::builder();
        if inherit_stdio {
            wasi.inherit_stdout().inherit_stderr();
        }

        Self {
            event,
            org: org.unwrap_or_default(),
            function: function.unwrap_or_default(),
            api_version,
            http,
            data_api: OnceLock::new(),
            wasi: wasi.build(),
            table: ResourceTable::new(),
        }
    }

    pub fn event(&self) -> &EventInfo {
        &self.event
    }

    pub fn org(&self) -> &OrgContext {
        &self.org
    }

    pub fn user(&self) -> &UserContext {
        &self.org.user_context
    }

    pub fn function(&self) -> &FunctionContext {
        &self.function
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// The Data API client for this invocation, built on first use.
    pub fn data_api(&self) -> Result<DataApiClient, String> {
        if let Some(client) = self.data_api.get() {
            return Ok(client.clone());
        }

        let url = &self.org.user_context.org_domain_url;
        if url.is_empty() {
            return Err("invocation carries no org domain URL".to_string());
        }
        if self.function.access_token.is_empty() {
            return Err("invocation carries no access token".to_string());
        }

        let client = DataApiClient::new(url, self.api_version, self.function.access_token.clone(), self.http.clone())
            .map_err(|e| e.to_string())?;
        Ok(self.data_api.get_or_init(|| client).clone())
    }
}

impl WasiView for InvocationContext {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.wasi,
            table: &mut self.table,
        }
    }
}
