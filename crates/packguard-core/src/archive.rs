//! Boundary contract for the package archive collaborator.
//!
//! The container format and its extraction mechanics live behind
//! [`ArchiveOpener`]; the engine only sees the opened shape: an identity,
//! optional manifest, a properties snapshot, content entries, declared
//! install hooks, and the nested packages embedded in the archive.

use std::path::{Path, PathBuf};

use packguard_types::{Manifest, PackageId, PropertySnapshot};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to read package '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed package '{}': {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("subpackage '{id}' was declared but not found in '{parent}'")]
    SubpackageNotFound { id: PackageId, parent: PackageId },
}

/// One low-level content operation recorded in an archive.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveEntry {
    /// Add or modify the node at `path`.
    Put {
        path: String,
        primary_type: Option<String>,
        properties: serde_json::Map<String, serde_json::Value>,
    },
    /// Delete the node at `path` and its subtree.
    Delete { path: String },
}

/// An install hook bundled in a package. Whether the hook's implementation
/// can actually be linked is only known at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub name: String,
    pub loadable: bool,
}

/// An opened package archive, including its declared nested packages.
#[derive(Debug, Clone)]
pub struct PackageArchive {
    pub id: PackageId,
    /// False when the container is structurally broken; processing an
    /// invalid package is an error at whichever level it is encountered.
    pub valid: bool,
    pub manifest: Option<Manifest>,
    pub properties: PropertySnapshot,
    pub entries: Vec<ArchiveEntry>,
    pub hooks: Vec<HookSpec>,
    pub subpackages: Vec<PackageArchive>,
}

impl PackageArchive {
    pub fn new(id: impl Into<PackageId>) -> Self {
        PackageArchive {
            id: id.into(),
            valid: true,
            manifest: None,
            properties: PropertySnapshot::new(),
            entries: Vec::new(),
            hooks: Vec::new(),
            subpackages: Vec::new(),
        }
    }

    /// Identities of the nested packages this archive declares, in archive
    /// order. Discovery is non-recursive.
    pub fn declared_subpackage_ids(&self) -> Vec<PackageId> {
        self.subpackages.iter().map(|sub| sub.id.clone()).collect()
    }

    /// Open one declared nested package.
    pub fn subpackage(&self, id: &PackageId) -> Result<&PackageArchive, ArchiveError> {
        self.subpackages
            .iter()
            .find(|sub| &sub.id == id)
            .ok_or_else(|| ArchiveError::SubpackageNotFound {
                id: id.clone(),
                parent: self.id.clone(),
            })
    }
}

/// Opens package sources into [`PackageArchive`]s. Implementations own the
/// container format; the engine never looks inside a source itself.
pub trait ArchiveOpener {
    fn open(&self, source: &Path) -> Result<PackageArchive, ArchiveError>;
}
