//! Boundary contracts for the content repository collaborator.
//!
//! The engine only ever talks to a repository through these traits: one
//! fresh [`Repository`] is acquired per scan, one administrative
//! [`RepoHandle`] drives every registration and import, and both are torn
//! down unconditionally when the scan ends.

use packguard_types::{ForcedRoot, NodeTypeDef};

use crate::archive::ArchiveEntry;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("invalid path '{path}'")]
    InvalidPath { path: String },

    #[error("node type '{name}' is not registered")]
    UnknownNodeType { name: String },

    #[error("unresolvable node type definitions: {}", names.join(", "))]
    UnresolvedNodeTypes { names: Vec<String> },

    #[error("namespace prefix '{prefix}' is already bound to '{existing}'")]
    NamespaceConflict {
        prefix: String,
        uri: String,
        existing: String,
    },

    #[error("namespace prefix '{prefix}' is not registered")]
    UnknownNamespacePrefix { prefix: String },

    #[error("privilege '{name}' is already registered")]
    PrivilegeExists { name: String },

    #[error("repository handle is closed")]
    Closed,
}

/// Read-only view of one content node, as handed to checks.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub path: String,
    pub primary_type: String,
    pub mixin_types: Vec<String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Low-level per-path callback raised while an archive is imported.
#[derive(Debug)]
pub enum PathEvent {
    Imported { path: String, node: NodeState },
    Deleted { path: String },
    Failed { path: String, error: RepoError },
}

/// Administrative session over one repository instance.
pub trait RepoHandle {
    /// Register node type definitions. With `allow_partial`, every
    /// resolvable definition is registered and the unresolvable remainder
    /// is returned as an error; otherwise registration is all-or-nothing.
    fn register_node_types(
        &mut self,
        defs: &[NodeTypeDef],
        allow_partial: bool,
    ) -> Result<(), RepoError>;

    fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<(), RepoError>;

    fn register_privilege(&mut self, name: &str) -> Result<(), RepoError>;

    /// Create the forced root path, including missing ancestors. The change
    /// stays uncommitted until [`RepoHandle::commit`].
    fn create_root(&mut self, root: &ForcedRoot) -> Result<(), RepoError>;

    /// Apply archive entries to the uncommitted content tree, raising one
    /// [`PathEvent`] per touched path. A returned error means the import
    /// machinery itself broke; per-path failures surface as
    /// [`PathEvent::Failed`] and do not stop the import.
    fn import_entries(
        &mut self,
        entries: &[ArchiveEntry],
        on_event: &mut dyn FnMut(PathEvent),
    ) -> Result<(), RepoError>;

    fn node_state(&self, path: &str) -> Result<NodeState, RepoError>;

    fn commit(&mut self) -> Result<(), RepoError>;

    /// Discard all uncommitted changes.
    fn discard(&mut self);

    fn close(&mut self);
}

/// One disposable repository instance, exclusively owned by a single scan.
pub trait Repository {
    fn open(&mut self) -> Result<Box<dyn RepoHandle + '_>, RepoError>;

    fn shutdown(&mut self);
}

/// Source of fresh repository instances; one is acquired per scan and never
/// reused.
pub trait RepositoryFactory {
    fn acquire(&self) -> Result<Box<dyn Repository>, RepoError>;
}
