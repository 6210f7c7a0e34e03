//! # Function Discovery
//!
//! Finds the user functions of a project. A function is a type exporting a top-level
//! `handle` that takes one value and returns one value; its input and output shapes
//! are read from the component type, so nothing about them is known statically.
//!
//! Entry points come from the first non-empty source of: explicit configuration, the
//! entry manifests of the classpath, or a scan of every type.
//!
//! Discovery is read-only and deterministic: the registry is ordered by name.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Weak;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use wasmtime::component::Component;
use wasmtime::component::Type;

use crate::bridge::CONTRACT_INTERFACE;
use crate::bridge::CONTRACT_TYPE;
use crate::codec::describe;
use crate::environment::Environment;
use crate::error::Error;
use crate::error::Result;
use crate::project::Project;

/// Name of the export that makes a type a function.
pub const ENTRY_EXPORT: &str = "handle";

/// An explicitly declared function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntryPoint {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
        }
    }

    pub fn named(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: Some(name.into()),
        }
    }
}

/// A function found in a project. Its shapes are fixed once discovered.
pub struct DiscoveredFunction {
    name: String,
    type_name: String,
    input: Type,
    output: Option<Type>,
    error: Option<Type>,
    reports_errors: bool,
    project: Weak<Project>,
    component: Component,
}

impl DiscoveredFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn input(&self) -> &Type {
        &self.input
    }

    /// The value returned on success. `None` for `result<_, E>`.
    pub fn output(&self) -> Option<&Type> {
        self.output.as_ref()
    }

    /// The `err` payload, when the function reports failures through `result`.
    pub fn error(&self) -> Option<&Type> {
        self.error.as_ref()
    }

    pub fn reports_errors(&self) -> bool {
        self.reports_errors
    }

    /// The owning project, while it is alive.
    pub fn project(&self) -> Option<Arc<Project>> {
        self.project.upgrade()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}

impl std::fmt::Debug for DiscoveredFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredFunction")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("input", &describe(&self.input))
            .field("output", &self.output.as_ref().map(describe))
            .field("reports_errors", &self.reports_errors)
            .finish()
    }
}

/// The discovered functions of a project, by name.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<DiscoveredFunction>>,
}

impl FunctionRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<DiscoveredFunction>> {
        self.functions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DiscoveredFunction>> {
        self.functions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// The function, if the project has exactly one.
    pub fn single(&self) -> Option<&Arc<DiscoveredFunction>> {
        match self.functions.len() {
            1 => self.functions.values().next(),
            _ => None,
        }
    }
}

/// Where a candidate type came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Source {
    Configured,
    Manifest,
    Scan,
}

/// Discovers the functions of `project` inside its environment.
pub fn discover(environment: &Environment, project: &Arc<Project>, entry_points: &[EntryPoint]) -> Result<FunctionRegistry> {
    if !environment.contains(CONTRACT_TYPE) {
        return Err(Error::IncompatibleFunction(format!(
            "SDK contract type {} (interface {}) is not on the classpath of {}",
            CONTRACT_TYPE, CONTRACT_INTERFACE, project
        )));
    }

    let (source, candidates) = candidates(environment, entry_points);
    debug!(project = %project.id(), source = ?source, candidates = candidates.len(), "discovering functions");

    let mut functions: BTreeMap<String, Arc<DiscoveredFunction>> = BTreeMap::new();
    for entry in candidates {
        let Some(function) = inspect(environment, project, &entry, source)? else { continue };
        if let Some(existing) = functions.get(function.name()) {
            return Err(Error::IncompatibleFunction(format!(
                "function name '{}' is declared by both {} and {}",
                function.name(),
                existing.type_name(),
                function.type_name()
            )));
        }
        debug!(name = %function.name(), type_name = %function.type_name(), "function discovered");
        functions.insert(function.name().to_string(), Arc::new(function));
    }

    if functions.is_empty() {
        return Err(Error::IncompatibleFunction(format!(
            "no function exporting `{}` was found in {}",
            ENTRY_EXPORT, project
        )));
    }

    info!(project = %project.id(), functions = ?functions.keys().collect::<Vec<_>>(), "functions discovered");
    Ok(FunctionRegistry { functions })
}

fn candidates(environment: &Environment, configured: &[EntryPoint]) -> (Source, Vec<EntryPoint>) {
    if !configured.is_empty() {
        return (Source::Configured, configured.to_vec());
    }

    let declared: Vec<EntryPoint> = environment
        .manifests()
        .iter()
        .flat_map(|(_, manifest)| manifest.functions.iter())
        .map(|f| EntryPoint {
            type_name: f.type_name.clone(),
            name: f.name.clone(),
        })
        .collect();
    if !declared.is_empty() {
        return (Source::Manifest, declared);
    }

    // The contract type is never a function.
    let scanned = environment
        .type_names()
        .filter(|name| *name != CONTRACT_TYPE)
        .map(EntryPoint::new)
        .collect();
    (Source::Scan, scanned)
}

/// Checks one candidate. `None` when a scanned type is not a function.
fn inspect(
    environment: &Environment,
    project: &Arc<Project>,
    entry: &EntryPoint,
    source: Source,
) -> Result<Option<DiscoveredFunction>> {
    let type_name = entry.type_name.as_str();
    if source != Source::Scan && !environment.contains(type_name) {
        return Err(Error::IncompatibleFunction(format!(
            "declared function type {} is not on the classpath",
            type_name
        )));
    }

    let Some(handle) = environment.exported_function(type_name, ENTRY_EXPORT)? else {
        if source == Source::Scan {
            return Ok(None);
        }
        return Err(Error::IncompatibleFunction(format!(
            "declared function type {} does not export `{}`",
            type_name, ENTRY_EXPORT
        )));
    };

    let params: Vec<Type> = handle.params().map(|(_, ty)| ty).collect();
    let results: Vec<Type> = handle.results().collect();
    let [input] = params.as_slice() else {
        return Err(incompatible_arity(type_name, "parameter", params.len()));
    };
    let [result] = results.as_slice() else {
        return Err(incompatible_arity(type_name, "result", results.len()));
    };

    for (role, ty) in [("input", input), ("output", result)] {
        if !is_data(ty) {
            return Err(Error::IncompatibleFunction(format!(
                "{} shape of {} is not plain data: {}",
                role,
                type_name,
                describe(ty)
            )));
        }
    }

    let (output, error, reports_errors) = match result {
        Type::Result(handle) => (handle.ok(), handle.err(), true),
        other => (Some(other.clone()), None, false),
    };

    let name = match &entry.name {
        Some(name) => name.clone(),
        None => canonical_name(type_name),
    };

    Ok(Some(DiscoveredFunction {
        name,
        type_name: type_name.to_string(),
        input: input.clone(),
        output,
        error,
        reports_errors,
        project: Arc::downgrade(project),
        component: environment.load(type_name)?,
    }))
}

fn incompatible_arity(type_name: &str, what: &str, found: usize) -> Error {
    Error::IncompatibleFunction(format!(
        "`{}` of {} must take exactly one {}, found {}",
        ENTRY_EXPORT, type_name, what, found
    ))
}

/// Whether a shape can be carried as a payload: no resources, futures or streams.
pub fn is_data(ty: &Type) -> bool {
    match ty {
        Type::Own(_) | Type::Borrow(_) | Type::Future(_) | Type::Stream(_) | Type::ErrorContext => false,
        Type::List(h) => is_data(&h.ty()),
        Type::Option(h) => is_data(&h.ty()),
        Type::Tuple(h) => h.types().all(|t| is_data(&t)),
        Type::Record(h) => h.fields().all(|f| is_data(&f.ty)),
        Type::Variant(h) => h.cases().all(|c| c.ty.as_ref().is_none_or(is_data)),
        Type::Result(h) => h.ok().is_none_or(|t| is_data(&t)) && h.err().is_none_or(|t| is_data(&t)),
        _ => true,
    }
}

/// Function name for a type: its simple name in lower camel case.
///
/// A simple name starting with two capitals is taken to start with an acronym and is
/// kept as is (`URLShortener`).
pub fn canonical_name(type_name: &str) -> String {
    let simple = type_name.rsplit('.').next().unwrap_or(type_name);
    let mut chars = simple.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => simple.to_string(),
        (Some(first), _) => first.to_lowercase().chain(simple.chars().skip(1)).collect(),
        (None, _) => String::new(),
    }
}

/// Every name the contract interface is imported under, by the functions or by the
/// contract type itself.
pub fn contract_import_names(environment: &Environment, registry: &FunctionRegistry) -> Result<BTreeSet<String>> {
    let mut names = environment.import_names(CONTRACT_TYPE, CONTRACT_INTERFACE)?;
    for function in registry.iter() {
        names.extend(environment.import_names(function.type_name(), CONTRACT_INTERFACE)?);
    }
    Ok(names)
}
