//! # SDK Compatibility Bridge
//!
//! Functions are built against one version of the `sf:functions/context` contract.
//! The project ships that contract as the SDK contract type, `sf.functions.Context`:
//! a component that imports every function of the contract version it was cut from.
//!
//! Detection reads which contract functions the SDK contract type declares and picks
//! the highest version whose markers are all present. The version is fixed for the
//! project from then on: the bridge installs that version's capabilities into the
//! linker, through that version's [`ContextAdapter`]. Capabilities from a later version
//! are installed as stubs, so a function importing one still links and fails only when
//! it calls the capability, with [`UnsupportedCapability`] as the cause.
//!
//! Adding a version is one [`SdkVersion`] variant, its capabilities, and one adapter.

pub mod adapter;
pub mod host;
pub mod version;

use std::collections::BTreeSet;

use tracing::debug;
use tracing::info;
use wasmtime::component::Linker;

use crate::context::InvocationContext;
use crate::environment::Environment;
use crate::error::Error;
use crate::error::Result;

pub use adapter::ContextAdapter;
pub use version::Capability;
pub use version::SdkVersion;

/// Fully-qualified name of the SDK contract type.
pub const CONTRACT_TYPE: &str = "sf.functions.Context";

/// The contract interface, without version suffix.
pub const CONTRACT_INTERFACE: &str = "sf:functions/context";

/// A capability outside the selected version's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedCapability {
    pub capability: Capability,
    pub version: SdkVersion,
}

impl std::fmt::Display for UnsupportedCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` requires SDK {} but the project uses SDK {}",
            self.capability,
            self.capability.since(),
            self.version
        )
    }
}

impl std::error::Error for UnsupportedCapability {}

/// The selected contract version and its capability table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bridge {
    version: SdkVersion,
    capabilities: BTreeSet<Capability>,
}

impl Bridge {
    pub fn new(version: SdkVersion) -> Self {
        Self {
            version,
            capabilities: version.capabilities(),
        }
    }

    /// Detects the contract version a project was built against.
    pub fn detect(environment: &Environment) -> Result<Self> {
        if !environment.contains(CONTRACT_TYPE) {
            return Err(Error::IncompatibleFunction(format!(
                "SDK contract type {} (interface {}) is not on the classpath of {}",
                CONTRACT_TYPE,
                CONTRACT_INTERFACE,
                environment.project()
            )));
        }

        let declared = environment.imported_functions(CONTRACT_TYPE, CONTRACT_INTERFACE)?;
        debug!(declared = ?declared, "read SDK contract");

        let version = SdkVersion::select(&declared).ok_or_else(|| {
            Error::IncompatibleFunction(format!(
                "{} declares {:?}, which matches no supported SDK version ({})",
                CONTRACT_TYPE,
                declared,
                SdkVersion::ALL.map(SdkVersion::as_str).join(", ")
            ))
        })?;

        info!(project = %environment.project(), sdk = %version, "SDK contract version detected");
        Ok(Self::new(version))
    }

    pub fn version(&self) -> SdkVersion {
        self.version
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Checks that a capability is part of the selected version.
    pub fn require(&self, capability: Capability) -> std::result::Result<(), UnsupportedCapability> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(UnsupportedCapability {
                capability,
                version: self.version,
            })
        }
    }

    pub fn adapter(&self) -> &'static dyn ContextAdapter {
        adapter::adapter_for(self.version)
    }

    /// Installs every capability under every given import name of the contract. The
    /// ones [`require`](Self::require) rejects fail when called.
    pub fn install(&self, linker: &mut Linker<InvocationContext>, import_names: &BTreeSet<String>) -> wasmtime::Result<()> {
        let adapter = self.adapter();
        for name in import_names {
            let mut instance = linker.instance(name)?;
            for capability in Capability::ALL {
                match self.require(capability) {
                    Ok(()) => adapter.link(&mut instance, capability)?,
                    Err(unsupported) => adapter::link_unsupported(&mut instance, unsupported)?,
                }
            }
            debug!(import = %name, sdk = %adapter.version(), "contract installed");
        }
        Ok(())
    }
}
