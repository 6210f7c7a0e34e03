//! # Isolated Environment
//!
//! Resolves types by fully-qualified name from a project's classpath. A directory
//! entry contributes every component file below it, named after its relative path
//! (`acme/Greeter.wasm` is `acme.Greeter`); a file entry contributes one type named
//! after its stem. Entries are consulted in order, so the first definition of a name
//! wins and later ones are shadowed.
//!
//! Guest code sees nothing of the host except what a linker installs for it. Types
//! are compiled on first use and cached for the life of the environment.
//!
//! ## Invariants
//! - **Precedence**: resolution is a pure function of classpath order.
//! - **Single compilation**: concurrent first loads of a type compile it once.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::btree_map::Entry;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;
use wasmtime::Engine;
use wasmtime::Store;
use wasmtime::component::Component;
use wasmtime::component::Instance;
use wasmtime::component::Linker;
use wasmtime::component::Val;
use wasmtime::component::types::ComponentFunc;
use wasmtime::component::types::ComponentItem;

use crate::project::Project;
use crate::project::ProjectId;

/// Manifest a directory entry may carry at its root to declare its functions.
pub const MANIFEST_FILE: &str = "functions.toml";

/// File extensions recognised as components.
const COMPONENT_EXTENSIONS: &[&str] = &["wasm", "wat"];

#[derive(Debug)]
pub enum Error {
    MissingEntry(PathBuf),
    UnreadableEntry { path: PathBuf, source: std::io::Error },
    NotAComponent(PathBuf),
    Manifest { path: PathBuf, message: String },
    TypeNotFound(String),
    Compile { type_name: String, source: wasmtime::Error },
    Instantiate { type_name: String, source: wasmtime::Error },
    Call { type_name: String, function: String, source: wasmtime::Error },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEntry(path) => write!(f, "classpath entry {} does not exist", path.display()),
            Self::UnreadableEntry { path, source } => write!(f, "classpath entry {} is not readable: {}", path.display(), source),
            Self::NotAComponent(path) => write!(f, "classpath entry {} is not a component file", path.display()),
            Self::Manifest { path, message } => write!(f, "invalid manifest {}: {}", path.display(), message),
            Self::TypeNotFound(name) => write!(f, "type {} is not on the classpath", name),
            Self::Compile { type_name, source } => write!(f, "type {} failed to compile: {:#}", type_name, source),
            Self::Instantiate { type_name, source } => write!(f, "type {} failed to instantiate: {:#}", type_name, source),
            Self::Call { type_name, function, source } => write!(f, "call to {}#{} failed: {:#}", type_name, function, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnreadableEntry { source, .. } => Some(source),
            Self::Compile { source, .. } | Self::Instantiate { source, .. } | Self::Call { source, .. } => {
                Some(&**source)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Declared functions of one classpath entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "function")]
    pub functions: Vec<ManifestFunction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ManifestFunction {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Where a type was found.
#[derive(Clone, Debug)]
struct TypeSource {
    entry: usize,
    path: PathBuf,
}

/// The type namespace of one project.
pub struct Environment {
    project: ProjectId,
    engine: Engine,
    entries: Vec<PathBuf>,
    types: BTreeMap<String, TypeSource>,
    manifests: Vec<(PathBuf, Manifest)>,
    components: DashMap<String, Component>,
}

impl Environment {
    /// Checks every classpath entry and indexes the types they define.
    ///
    /// Nothing is compiled here.
    pub fn build(engine: &Engine, project: &Project) -> Result<Self> {
        let mut types = BTreeMap::new();
        let mut manifests = Vec::new();

        for (index, entry) in project.classpath().iter().enumerate() {
            let metadata = std::fs::metadata(entry).map_err(|e| entry_error(entry, e))?;

            let mut found = Vec::new();
            if metadata.is_dir() {
                index_directory(entry, entry, &mut found)?;
                let manifest_path = entry.join(MANIFEST_FILE);
                if manifest_path.is_file() {
                    manifests.push((manifest_path.clone(), read_manifest(&manifest_path)?));
                }
            } else {
                std::fs::File::open(entry).map_err(|e| entry_error(entry, e))?;
                let name = component_stem(entry).ok_or_else(|| Error::NotAComponent(entry.clone()))?;
                found.push((name, entry.clone()));
            }

            for (name, path) in found {
                match types.entry(name) {
                    Entry::Vacant(slot) => {
                        slot.insert(TypeSource { entry: index, path });
                    }
                    Entry::Occupied(existing) => {
                        debug!(
                            type_name = %existing.key(),
                            winner = %existing.get().path.display(),
                            shadowed = %path.display(),
                            "type shadowed by an earlier classpath entry"
                        );
                    }
                }
            }
        }

        debug!(project = %project.id(), types = types.len(), "environment indexed");

        Ok(Self {
            project: project.id(),
            engine: engine.clone(),
            entries: project.classpath().to_vec(),
            types,
            manifests,
            components: DashMap::new(),
        })
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Manifests found at the root of directory entries, in classpath order.
    pub fn manifests(&self) -> &[(PathBuf, Manifest)] {
        &self.manifests
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// All type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The file and the index of the classpath entry a type resolves to.
    pub fn source_of(&self, type_name: &str) -> Option<(usize, &Path)> {
        self.types.get(type_name).map(|s| (s.entry, s.path.as_path()))
    }

    /// Compiles a type on first use and returns the cached component afterwards.
    pub fn load(&self, type_name: &str) -> Result<Component> {
        if let Some(component) = self.components.get(type_name) {
            return Ok(component.value().clone());
        }

        let source = self
            .types
            .get(type_name)
            .ok_or_else(|| Error::TypeNotFound(type_name.to_string()))?;

        let component = self
            .components
            .entry(type_name.to_string())
            .or_try_insert_with(|| {
                debug!(type_name, path = %source.path.display(), "compiling type");
                Component::from_file(&self.engine, &source.path).map_err(|source| Error::Compile {
                    type_name: type_name.to_string(),
                    source,
                })
            })?;

        Ok(component.value().clone())
    }

    /// Instantiates a type through its no-argument constructor: an empty linker.
    pub async fn instantiate(&self, type_name: &str) -> Result<LoadedInstance> {
        let component = self.load(type_name)?;
        let linker: Linker<()> = Linker::new(&self.engine);
        let mut store = Store::new(&self.engine, ());
        let instance = linker
            .instantiate_async(&mut store, &component)
            .await
            .map_err(|source| Error::Instantiate {
                type_name: type_name.to_string(),
                source,
            })?;

        Ok(LoadedInstance {
            type_name: type_name.to_string(),
            store,
            instance,
        })
    }

    /// Looks up a top-level exported function of a type.
    pub fn exported_function(&self, type_name: &str, name: &str) -> Result<Option<ComponentFunc>> {
        let component = self.load(type_name)?;
        let found = component
            .component_type()
            .exports(&self.engine)
            .find(|(export, _)| *export == name)
            .and_then(|(_, item)| match item {
                ComponentItem::ComponentFunc(func) => Some(func),
                _ => None,
            });
        Ok(found)
    }

    /// Function names a type imports from `interface`.
    pub fn imported_functions(&self, type_name: &str, interface: &str) -> Result<BTreeSet<String>> {
        let component = self.load(type_name)?;
        let mut functions = BTreeSet::new();
        for (import, item) in component.component_type().imports(&self.engine) {
            if !interface_matches(import, interface) {
                continue;
            }
            let ComponentItem::ComponentInstance(instance) = item else { continue };
            for (name, export) in instance.exports(&self.engine) {
                if let ComponentItem::ComponentFunc(_) = export {
                    functions.insert(name.to_string());
                }
            }
        }
        Ok(functions)
    }

    /// Exact import names a type uses for `interface`, version suffix included.
    pub fn import_names(&self, type_name: &str, interface: &str) -> Result<BTreeSet<String>> {
        let component = self.load(type_name)?;
        let names = component
            .component_type()
            .imports(&self.engine)
            .filter(|(import, item)| {
                interface_matches(import, interface) && matches!(item, ComponentItem::ComponentInstance(_))
            })
            .map(|(import, _)| import.to_string())
            .collect();
        Ok(names)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("project", &self.project)
            .field("entries", &self.entries)
            .field("types", &self.types.len())
            .field("compiled", &self.components.len())
            .finish()
    }
}

/// A live instance created by [`Environment::instantiate`].
pub struct LoadedInstance {
    type_name: String,
    store: Store<()>,
    instance: Instance,
}

impl LoadedInstance {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Calls an exported function and returns its results.
    pub async fn call(&mut self, function: &str, args: &[Val]) -> Result<Vec<Val>> {
        let call_error = |source| Error::Call {
            type_name: self.type_name.clone(),
            function: function.to_string(),
            source,
        };

        let func = self
            .instance
            .get_func(&mut self.store, function)
            .ok_or_else(|| call_error(wasmtime::Error::msg("no such export")))?;

        let mut results = vec![Val::Bool(false); func.ty(&self.store).results().len()];
        func.call_async(&mut self.store, args, &mut results).await.map_err(call_error)?;
        func.post_return_async(&mut self.store).await.map_err(call_error)?;
        Ok(results)
    }
}

/// Whether an import name refers to `interface`, ignoring any `@version` suffix.
pub fn interface_matches(import: &str, interface: &str) -> bool {
    import.split('@').next() == Some(interface)
}

fn entry_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::MissingEntry(path.to_path_buf())
    } else {
        Error::UnreadableEntry {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

fn component_stem(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !COMPONENT_EXTENSIONS.contains(&extension) {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// Walks a directory entry, collecting `(type name, path)` pairs in a stable order.
fn index_directory(root: &Path, dir: &Path, found: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let unreadable = |source| Error::UnreadableEntry {
        path: dir.to_path_buf(),
        source,
    };

    let mut children = Vec::new();
    for child in std::fs::read_dir(dir).map_err(unreadable)? {
        children.push(child.map_err(unreadable)?.path());
    }
    children.sort();

    for path in children {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.'));
        if hidden {
            continue;
        }

        if path.is_dir() {
            index_directory(root, &path, found)?;
            continue;
        }

        let Some(stem) = component_stem(&path) else { continue };
        let Ok(relative) = path.strip_prefix(root) else { continue };

        let mut segments: Vec<String> = relative
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect();
        segments.push(stem);
        found.push((segments.join("."), path));
    }

    Ok(())
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::UnreadableEntry {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
