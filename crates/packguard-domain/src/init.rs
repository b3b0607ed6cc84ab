//! Resolved, checklist-independent bootstrap directive sets.
//!
//! An init stage is built once per scan, applied once by the engine before
//! any package is processed, and never mutated afterward.

use std::collections::{BTreeMap, BTreeSet};

use packguard_types::{ForcedRoot, Namespace, NodeTypeSet};

/// One resolved set of repository-initialization directives.
#[derive(Debug, Clone, Default)]
pub struct InitStage {
    ordered_sources: Vec<NodeTypeSet>,
    unordered_sources: Vec<NodeTypeSet>,
    // uri -> prefix: the last registration for a uri wins
    namespaces: BTreeMap<String, String>,
    privileges: BTreeSet<String>,
    // keyed by path: the last forced root for a path wins
    forced_roots: BTreeMap<String, ForcedRoot>,
}

impl InitStage {
    pub fn builder() -> InitStageBuilder {
        InitStageBuilder::new()
    }

    pub fn ordered_sources(&self) -> &[NodeTypeSet] {
        &self.ordered_sources
    }

    pub fn unordered_sources(&self) -> &[NodeTypeSet] {
        &self.unordered_sources
    }

    /// Namespace map, uri to prefix.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    pub fn privileges(&self) -> &BTreeSet<String> {
        &self.privileges
    }

    pub fn forced_roots(&self) -> impl Iterator<Item = &ForcedRoot> {
        self.forced_roots.values()
    }

    /// Forced roots sorted by ascending path length, so that ancestors are
    /// created before their descendants.
    pub fn forced_roots_in_creation_order(&self) -> Vec<&ForcedRoot> {
        let mut roots: Vec<&ForcedRoot> = self.forced_roots.values().collect();
        roots.sort_by(|a, b| {
            a.path
                .len()
                .cmp(&b.path.len())
                .then_with(|| a.path.cmp(&b.path))
        });
        roots
    }
}

#[derive(Debug, Default)]
pub struct InitStageBuilder {
    stage: InitStage,
}

impl InitStageBuilder {
    pub fn new() -> Self {
        InitStageBuilder::default()
    }

    pub fn with_ordered_source(mut self, source: NodeTypeSet) -> Self {
        self.stage.ordered_sources.push(source);
        self
    }

    pub fn with_ordered_sources(mut self, sources: Vec<NodeTypeSet>) -> Self {
        self.stage.ordered_sources.extend(sources);
        self
    }

    pub fn with_unordered_sources(mut self, sources: Vec<NodeTypeSet>) -> Self {
        self.stage.unordered_sources.extend(sources);
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.stage.namespaces.insert(uri.into(), prefix.into());
        self
    }

    pub fn with_namespaces(mut self, namespaces: Vec<Namespace>) -> Self {
        for ns in namespaces {
            self.stage.namespaces.insert(ns.uri, ns.prefix);
        }
        self
    }

    pub fn with_privilege(mut self, privilege: impl Into<String>) -> Self {
        self.stage.privileges.insert(privilege.into());
        self
    }

    pub fn with_privileges(mut self, privileges: Vec<String>) -> Self {
        self.stage.privileges.extend(privileges);
        self
    }

    pub fn with_forced_root(mut self, root: ForcedRoot) -> Self {
        self.stage.forced_roots.insert(root.path.clone(), root);
        self
    }

    pub fn with_forced_roots(mut self, roots: Vec<ForcedRoot>) -> Self {
        for root in roots {
            self.stage.forced_roots.insert(root.path.clone(), root);
        }
        self
    }

    pub fn build(self) -> InitStage {
        self.stage
    }
}
