//! Projects: a provenance and an ordered classpath.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

static NEXT_PROJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Strong type for project identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "project-{}", self.0)
    }
}

/// A user project, immutable once created.
///
/// The provenance records where the classpath came from (a build tool, a prebuilt
/// bundle) and is only used for diagnostics.
#[derive(Debug)]
pub struct Project {
    id: ProjectId,
    provenance: String,
    classpath: Vec<PathBuf>,
}

impl Project {
    pub fn new<P: Into<PathBuf>>(provenance: impl Into<String>, classpath: impl IntoIterator<Item = P>) -> Arc<Self> {
        Arc::new(Self {
            id: ProjectId(NEXT_PROJECT_ID.fetch_add(1, Ordering::Relaxed)),
            provenance: provenance.into(),
            classpath: classpath.into_iter().map(Into::into).collect(),
        })
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {} classpath entries)", self.id, self.provenance, self.classpath.len())
    }
}
