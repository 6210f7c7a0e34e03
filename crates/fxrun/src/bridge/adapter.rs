//! # Context adapters
//!
//! One adapter per SDK contract version. An adapter installs host functions for the
//! capabilities of its version, shaping arguments and results to that version's
//! signatures and delegating to the shared host logic. Most capabilities look the
//! same in every version and go through [`link_common`]; only the ones whose
//! signature changed have version-specific code.
//!
//! Capabilities newer than the project's version are installed by
//! [`link_unsupported`] as stubs that fail when called.

use wasmtime::StoreContextMut;
use wasmtime::component::ComponentNamedList;
use wasmtime::component::Lift;
use wasmtime::component::LinkerInstance;
use wasmtime::component::Lower;

use crate::bridge::UnsupportedCapability;
use crate::bridge::host;
use crate::bridge::version::Capability;
use crate::bridge::version::SdkVersion;
use crate::context::InvocationContext;

/// Installs the contract functions of one SDK version.
pub trait ContextAdapter: Send + Sync {
    fn version(&self) -> SdkVersion;

    /// Installs the host function for `capability` into the contract instance.
    ///
    /// Only called for capabilities that [`Bridge::require`](crate::bridge::Bridge::require)
    /// accepts for this version.
    fn link(&self, instance: &mut LinkerInstance<'_, InvocationContext>, capability: Capability) -> wasmtime::Result<()>;
}

/// The adapter for a version.
pub fn adapter_for(version: SdkVersion) -> &'static dyn ContextAdapter {
    match version {
        SdkVersion::V1_0_0 => &V1_0_0,
        SdkVersion::V1_1_0 => &V1_1_0,
        SdkVersion::V1_1_1 => &V1_1_1,
    }
}

/// 1.0.0: queries return only the records of the first page.
pub struct V1_0_0;

/// 1.1.0: queries return `(done, next-records-url, records)` and can be continued.
pub struct V1_1_0;

/// 1.1.1: adds the record field accessor.
pub struct V1_1_1;

impl ContextAdapter for V1_0_0 {
    fn version(&self) -> SdkVersion {
        SdkVersion::V1_0_0
    }

    fn link(&self, instance: &mut LinkerInstance<'_, InvocationContext>, capability: Capability) -> wasmtime::Result<()> {
        match capability {
            Capability::QueryRecords => instance.func_wrap_async(
                "query-records",
                |store: StoreContextMut<'_, InvocationContext>, (soql,): (String,)| {
                    let api = store.data().data_api();
                    Box::new(async move {
                        let page = host::query(api, soql).await;
                        Ok((page.map(|page| page.records),))
                    })
                },
            ),
            other => link_common(instance, other),
        }
    }
}

impl ContextAdapter for V1_1_0 {
    fn version(&self) -> SdkVersion {
        SdkVersion::V1_1_0
    }

    fn link(&self, instance: &mut LinkerInstance<'_, InvocationContext>, capability: Capability) -> wasmtime::Result<()> {
        match capability {
            Capability::QueryRecords => instance.func_wrap_async(
                "query-records",
                |store: StoreContextMut<'_, InvocationContext>, (soql,): (String,)| {
                    let api = store.data().data_api();
                    Box::new(async move {
                        let page = host::query(api, soql).await;
                        Ok((page.map(paged),))
                    })
                },
            ),
            Capability::QueryMore => instance.func_wrap_async(
                "query-more",
                |store: StoreContextMut<'_, InvocationContext>, (next_records_url,): (String,)| {
                    let api = store.data().data_api();
                    Box::new(async move {
                        let page = host::query_more(api, next_records_url).await;
                        Ok((page.map(paged),))
                    })
                },
            ),
            other => link_common(instance, other),
        }
    }
}

impl ContextAdapter for V1_1_1 {
    fn version(&self) -> SdkVersion {
        SdkVersion::V1_1_1
    }

    fn link(&self, instance: &mut LinkerInstance<'_, InvocationContext>, capability: Capability) -> wasmtime::Result<()> {
        match capability {
            Capability::RecordField => instance.func_wrap(
                "record-field",
                |_store: StoreContextMut<'_, InvocationContext>, (record, field): (String, String)| {
                    Ok((host::record_field(&record, &field),))
                },
            ),
            // Unchanged since 1.1.0.
            other => V1_1_0.link(instance, other),
        }
    }
}

/// Installs a capability the project's version lacks. The import links, and every
/// call to it fails with `unsupported`.
pub fn link_unsupported(
    instance: &mut LinkerInstance<'_, InvocationContext>,
    unsupported: UnsupportedCapability,
) -> wasmtime::Result<()> {
    match unsupported.capability {
        Capability::UpdateRecord => {
            stub::<(String, String, Vec<(String, String)>), (Result<String, String>,)>(instance, unsupported)
        }
        Capability::QueryMore => {
            stub::<(String,), (Result<(bool, Option<String>, Vec<String>), String>,)>(instance, unsupported)
        }
        Capability::EventId | Capability::EventType => stub::<(), (String,)>(instance, unsupported),
        Capability::RecordField => stub::<(String, String), (Option<String>,)>(instance, unsupported),
        other => Err(wasmtime::Error::msg(format!("`{}` is part of every SDK version", other))),
    }
}

fn stub<P, R>(instance: &mut LinkerInstance<'_, InvocationContext>, unsupported: UnsupportedCapability) -> wasmtime::Result<()>
where
    P: ComponentNamedList + Lift + 'static,
    R: ComponentNamedList + Lower + 'static,
{
    instance.func_wrap(
        unsupported.capability.wit_name(),
        move |_store: StoreContextMut<'_, InvocationContext>, _params: P| -> wasmtime::Result<R> {
            Err(unsupported.clone().into())
        },
    )
}

/// 1.1.0 page shape.
fn paged(page: host::QueryPage) -> (bool, Option<String>, Vec<String>) {
    (page.done, page.next_records_url, page.records)
}

/// Capabilities whose signature is the same in every version.
fn link_common(instance: &mut LinkerInstance<'_, InvocationContext>, capability: Capability) -> wasmtime::Result<()> {
    match capability {
        Capability::OrgId => getter(instance, capability, |ctx| ctx.user().org_id.clone()),
        Capability::UserId => getter(instance, capability, |ctx| ctx.user().user_id.clone()),
        Capability::Username => getter(instance, capability, |ctx| ctx.user().username.clone()),
        Capability::ApiVersion => getter(instance, capability, |ctx| ctx.api_version().to_string()),
        Capability::OrgDomainUrl => getter(instance, capability, |ctx| ctx.user().org_domain_url.clone()),
        Capability::EventId => getter(instance, capability, |ctx| ctx.event().id.clone()),
        Capability::EventType => getter(instance, capability, |ctx| ctx.event().event_type.clone().unwrap_or_default()),
        Capability::CreateRecord => instance.func_wrap_async(
            "create-record",
            |store: StoreContextMut<'_, InvocationContext>, (object_type, fields): (String, Vec<(String, String)>)| {
                let api = store.data().data_api();
                Box::new(async move { Ok((host::create_record(api, object_type, fields).await,)) })
            },
        ),
        Capability::UpdateRecord => instance.func_wrap_async(
            "update-record",
            |store: StoreContextMut<'_, InvocationContext>,
             (object_type, id, fields): (String, String, Vec<(String, String)>)| {
                let api = store.data().data_api();
                Box::new(async move { Ok((host::update_record(api, object_type, id, fields).await,)) })
            },
        ),
        Capability::QueryRecords | Capability::QueryMore | Capability::RecordField => Err(wasmtime::Error::msg(format!(
            "`{}` has a version-specific signature and must be linked by its adapter",
            capability
        ))),
    }
}

/// Installs a `func() -> string` reading from the invocation context.
fn getter(
    instance: &mut LinkerInstance<'_, InvocationContext>,
    capability: Capability,
    read: fn(&InvocationContext) -> String,
) -> wasmtime::Result<()> {
    instance.func_wrap(
        capability.wit_name(),
        move |store: StoreContextMut<'_, InvocationContext>, (): ()| Ok((read(store.data()),)),
    )
}
