//! Compact in-memory repository backend.
//!
//! This is the default disposable collaborator behind [`crate::repo`]: a
//! path-keyed content tree with a node type registry, namespace and
//! privilege registries, and an uncommitted change buffer that can be
//! discarded per directive. Deliberately small; just enough to honor the
//! boundary contract.

use std::collections::BTreeMap;

use packguard_types::{ForcedRoot, NodeTypeDef};

use crate::archive::ArchiveEntry;
use crate::repo::{NodeState, PathEvent, RepoError, RepoHandle, Repository, RepositoryFactory};

const DEFAULT_PRIMARY_TYPE: &str = "nt:unstructured";

#[derive(Debug, Clone)]
struct Node {
    primary_type: String,
    mixin_types: Vec<String>,
    properties: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    fn typed(primary_type: &str) -> Self {
        Node {
            primary_type: primary_type.to_string(),
            mixin_types: Vec::new(),
            properties: serde_json::Map::new(),
        }
    }
}

/// Factory producing one fresh [`MemoryRepository`] per scan.
#[derive(Debug, Default)]
pub struct MemoryRepositoryFactory;

impl RepositoryFactory for MemoryRepositoryFactory {
    fn acquire(&self) -> Result<Box<dyn Repository>, RepoError> {
        Ok(Box::new(MemoryRepository::new()))
    }
}

/// One disposable in-memory repository instance.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    shut_down: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        MemoryRepository::default()
    }
}

impl Repository for MemoryRepository {
    fn open(&mut self) -> Result<Box<dyn RepoHandle + '_>, RepoError> {
        if self.shut_down {
            return Err(RepoError::Closed);
        }
        Ok(Box::new(MemoryHandle::new()))
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

/// Administrative session over the in-memory tree.
#[derive(Debug)]
pub struct MemoryHandle {
    committed: BTreeMap<String, Node>,
    // path -> Some(node) for adds/modifies, None for deletions
    pending: BTreeMap<String, Option<Node>>,
    node_types: BTreeMap<String, NodeTypeDef>,
    // prefix -> uri
    namespaces: BTreeMap<String, String>,
    privileges: std::collections::BTreeSet<String>,
    closed: bool,
}

impl MemoryHandle {
    fn new() -> Self {
        let mut committed = BTreeMap::new();
        committed.insert("/".to_string(), Node::typed("rep:root"));

        let mut node_types = BTreeMap::new();
        for (name, supertypes) in [
            ("nt:base", vec![]),
            ("nt:unstructured", vec!["nt:base"]),
            ("nt:folder", vec!["nt:base"]),
            ("nt:file", vec!["nt:base"]),
            ("rep:root", vec!["nt:base"]),
            ("mix:versionable", vec![]),
        ] {
            node_types.insert(
                name.to_string(),
                NodeTypeDef {
                    name: name.to_string(),
                    supertypes: supertypes.into_iter().map(str::to_string).collect(),
                },
            );
        }

        let namespaces = [
            ("jcr", "http://www.jcp.org/jcr/1.0"),
            ("nt", "http://www.jcp.org/jcr/nt/1.0"),
            ("mix", "http://www.jcp.org/jcr/mix/1.0"),
            ("rep", "internal"),
        ]
        .into_iter()
        .map(|(p, u)| (p.to_string(), u.to_string()))
        .collect();

        let privileges = ["jcr:read", "jcr:write", "jcr:all"]
            .into_iter()
            .map(str::to_string)
            .collect();

        MemoryHandle {
            committed,
            pending: BTreeMap::new(),
            node_types,
            namespaces,
            privileges,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), RepoError> {
        if self.closed {
            Err(RepoError::Closed)
        } else {
            Ok(())
        }
    }

    fn lookup(&self, path: &str) -> Option<&Node> {
        match self.pending.get(path) {
            Some(Some(node)) => Some(node),
            Some(None) => None,
            None => self.committed.get(path),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn state_of(&self, path: &str, node: &Node) -> NodeState {
        NodeState {
            path: path.to_string(),
            primary_type: node.primary_type.clone(),
            mixin_types: node.mixin_types.clone(),
            properties: node.properties.clone(),
        }
    }

    fn check_prefix(&self, name: &str) -> Result<(), RepoError> {
        if let Some((prefix, _)) = name.split_once(':') {
            if !self.namespaces.contains_key(prefix) {
                return Err(RepoError::UnknownNamespacePrefix {
                    prefix: prefix.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Create missing ancestors of `path` as plain unstructured nodes.
    fn create_ancestors(&mut self, path: &str) {
        let mut ancestor = String::new();
        for segment in path.trim_matches('/').split('/') {
            ancestor.push('/');
            ancestor.push_str(segment);
            if ancestor == path {
                break;
            }
            if !self.exists(&ancestor) {
                self.pending
                    .insert(ancestor.clone(), Some(Node::typed(DEFAULT_PRIMARY_TYPE)));
            }
        }
    }

    fn delete_subtree(&mut self, path: &str) {
        let child_prefix = format!("{path}/");
        let doomed: Vec<String> = self
            .committed
            .keys()
            .chain(self.pending.keys())
            .filter(|p| p.as_str() == path || p.starts_with(&child_prefix))
            .cloned()
            .collect();
        for p in doomed {
            self.pending.insert(p, None);
        }
    }

    fn put_entry(
        &mut self,
        path: &str,
        primary_type: &Option<String>,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<NodeState, RepoError> {
        validate_path(path)?;
        if let Some(primary_type) = primary_type {
            if !self.node_types.contains_key(primary_type) {
                return Err(RepoError::UnknownNodeType {
                    name: primary_type.clone(),
                });
            }
        }

        self.create_ancestors(path);
        let mut node = match self.lookup(path) {
            Some(existing) => existing.clone(),
            None => Node::typed(primary_type.as_deref().unwrap_or(DEFAULT_PRIMARY_TYPE)),
        };
        if let Some(primary_type) = primary_type {
            node.primary_type = primary_type.clone();
        }
        for (key, value) in properties {
            node.properties.insert(key.clone(), value.clone());
        }
        let state = self.state_of(path, &node);
        self.pending.insert(path.to_string(), Some(node));
        Ok(state)
    }
}

fn validate_path(path: &str) -> Result<(), RepoError> {
    let valid = path == "/"
        || (path.starts_with('/')
            && !path.ends_with('/')
            && path.split('/').skip(1).all(|segment| !segment.is_empty()));
    if valid {
        Ok(())
    } else {
        Err(RepoError::InvalidPath {
            path: path.to_string(),
        })
    }
}

impl RepoHandle for MemoryHandle {
    fn register_node_types(
        &mut self,
        defs: &[NodeTypeDef],
        allow_partial: bool,
    ) -> Result<(), RepoError> {
        self.ensure_open()?;

        // fixed-point resolution: definitions may depend on each other
        // within one call in any order
        let mut unresolved: Vec<&NodeTypeDef> = defs.iter().collect();
        let mut staged: Vec<&NodeTypeDef> = Vec::with_capacity(defs.len());
        let mut progressed = true;
        while progressed {
            progressed = false;
            unresolved.retain(|def| {
                let resolvable = def.supertypes.iter().all(|supertype| {
                    self.node_types.contains_key(supertype)
                        || staged.iter().any(|s| &s.name == supertype)
                });
                if resolvable {
                    staged.push(*def);
                    progressed = true;
                }
                !resolvable
            });
        }

        if !unresolved.is_empty() && !allow_partial {
            return Err(RepoError::UnresolvedNodeTypes {
                names: unresolved.iter().map(|d| d.name.clone()).collect(),
            });
        }
        for def in &staged {
            self.node_types.insert(def.name.clone(), (*def).clone());
        }
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(RepoError::UnresolvedNodeTypes {
                names: unresolved.iter().map(|d| d.name.clone()).collect(),
            })
        }
    }

    fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<(), RepoError> {
        self.ensure_open()?;
        match self.namespaces.get(prefix) {
            Some(existing) if existing != uri => Err(RepoError::NamespaceConflict {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
                existing: existing.clone(),
            }),
            _ => {
                self.namespaces
                    .insert(prefix.to_string(), uri.to_string());
                Ok(())
            }
        }
    }

    fn register_privilege(&mut self, name: &str) -> Result<(), RepoError> {
        self.ensure_open()?;
        self.check_prefix(name)?;
        if !self.privileges.insert(name.to_string()) {
            return Err(RepoError::PrivilegeExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn create_root(&mut self, root: &ForcedRoot) -> Result<(), RepoError> {
        self.ensure_open()?;
        validate_path(&root.path)?;

        let primary_type = root.primary_type.as_deref().unwrap_or(DEFAULT_PRIMARY_TYPE);
        if !self.node_types.contains_key(primary_type) {
            return Err(RepoError::UnknownNodeType {
                name: primary_type.to_string(),
            });
        }
        for mixin in &root.mixin_types {
            if !self.node_types.contains_key(mixin) {
                return Err(RepoError::UnknownNodeType {
                    name: mixin.clone(),
                });
            }
        }

        self.create_ancestors(&root.path);
        let mut node = match self.lookup(&root.path) {
            Some(existing) => existing.clone(),
            None => Node::typed(primary_type),
        };
        node.primary_type = primary_type.to_string();
        for mixin in &root.mixin_types {
            if !node.mixin_types.contains(mixin) {
                node.mixin_types.push(mixin.clone());
            }
        }
        self.pending.insert(root.path.clone(), Some(node));
        Ok(())
    }

    fn import_entries(
        &mut self,
        entries: &[ArchiveEntry],
        on_event: &mut dyn FnMut(PathEvent),
    ) -> Result<(), RepoError> {
        self.ensure_open()?;
        for entry in entries {
            match entry {
                ArchiveEntry::Put {
                    path,
                    primary_type,
                    properties,
                } => match self.put_entry(path, primary_type, properties) {
                    Ok(node) => on_event(PathEvent::Imported {
                        path: path.clone(),
                        node,
                    }),
                    Err(error) => on_event(PathEvent::Failed {
                        path: path.clone(),
                        error,
                    }),
                },
                ArchiveEntry::Delete { path } => {
                    if self.exists(path) {
                        self.delete_subtree(path);
                        on_event(PathEvent::Deleted { path: path.clone() });
                    } else {
                        on_event(PathEvent::Failed {
                            path: path.clone(),
                            error: RepoError::PathNotFound { path: path.clone() },
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn node_state(&self, path: &str) -> Result<NodeState, RepoError> {
        self.ensure_open()?;
        self.lookup(path)
            .map(|node| self.state_of(path, node))
            .ok_or_else(|| RepoError::PathNotFound {
                path: path.to_string(),
            })
    }

    fn commit(&mut self) -> Result<(), RepoError> {
        self.ensure_open()?;
        let pending = std::mem::take(&mut self.pending);
        for (path, change) in pending {
            match change {
                Some(node) => {
                    self.committed.insert(path, node);
                }
                None => {
                    self.committed.remove(&path);
                }
            }
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.pending.clear();
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_handle(repository: &mut MemoryRepository) -> Box<dyn RepoHandle + '_> {
        repository.open().expect("open handle")
    }

    #[test]
    fn put_creates_missing_ancestors_and_reports_states() {
        let mut repository = MemoryRepository::new();
        let mut handle = open_handle(&mut repository);

        let mut events = Vec::new();
        handle
            .import_entries(
                &[ArchiveEntry::Put {
                    path: "/content/site/page".to_string(),
                    primary_type: Some("nt:folder".to_string()),
                    properties: serde_json::Map::new(),
                }],
                &mut |event| events.push(event),
            )
            .expect("import");

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PathEvent::Imported { path, node }
            if path == "/content/site/page" && node.primary_type == "nt:folder"));
        assert_eq!(
            handle.node_state("/content").expect("ancestor").primary_type,
            DEFAULT_PRIMARY_TYPE
        );
    }

    #[test]
    fn delete_of_missing_path_raises_a_failed_event() {
        let mut repository = MemoryRepository::new();
        let mut handle = open_handle(&mut repository);

        let mut events = Vec::new();
        handle
            .import_entries(
                &[ArchiveEntry::Delete {
                    path: "/nowhere".to_string(),
                }],
                &mut |event| events.push(event),
            )
            .expect("import");

        assert!(matches!(&events[0], PathEvent::Failed { error: RepoError::PathNotFound { .. }, .. }));
    }

    #[test]
    fn delete_removes_the_whole_subtree() {
        let mut repository = MemoryRepository::new();
        let mut handle = open_handle(&mut repository);

        let puts: Vec<ArchiveEntry> = ["/a", "/a/b", "/a/b/c"]
            .iter()
            .map(|path| ArchiveEntry::Put {
                path: path.to_string(),
                primary_type: None,
                properties: serde_json::Map::new(),
            })
            .collect();
        handle.import_entries(&puts, &mut |_| {}).expect("import");
        handle.commit().expect("commit");

        handle
            .import_entries(
                &[ArchiveEntry::Delete {
                    path: "/a/b".to_string(),
                }],
                &mut |_| {},
            )
            .expect("import");
        handle.commit().expect("commit");

        assert!(handle.node_state("/a").is_ok());
        assert!(handle.node_state("/a/b").is_err());
        assert!(handle.node_state("/a/b/c").is_err());
    }

    #[test]
    fn discard_drops_uncommitted_changes() {
        let mut repository = MemoryRepository::new();
        let mut handle = open_handle(&mut repository);

        handle
            .create_root(&ForcedRoot::new("/staged"))
            .expect("create root");
        assert!(handle.node_state("/staged").is_ok());

        handle.discard();
        assert!(handle.node_state("/staged").is_err());
    }

    #[test]
    fn node_type_registration_is_all_or_nothing_unless_partial() {
        let mut repository = MemoryRepository::new();
        let mut handle = open_handle(&mut repository);

        let defs = vec![
            NodeTypeDef {
                name: "ex:ok".to_string(),
                supertypes: vec!["nt:base".to_string()],
            },
            NodeTypeDef {
                name: "ex:broken".to_string(),
                supertypes: vec!["ex:missing".to_string()],
            },
        ];

        let err = handle
            .register_node_types(&defs, false)
            .expect_err("unresolved supertype");
        assert!(matches!(err, RepoError::UnresolvedNodeTypes { ref names } if names == &vec!["ex:broken".to_string()]));
        // nothing registered
        assert!(handle
            .create_root(&ForcedRoot {
                path: "/x".to_string(),
                primary_type: Some("ex:ok".to_string()),
                mixin_types: vec![],
            })
            .is_err());

        let err = handle
            .register_node_types(&defs, true)
            .expect_err("still unresolved");
        assert!(matches!(err, RepoError::UnresolvedNodeTypes { .. }));
        // but the resolvable definition made it in
        handle
            .create_root(&ForcedRoot {
                path: "/x".to_string(),
                primary_type: Some("ex:ok".to_string()),
                mixin_types: vec![],
            })
            .expect("ex:ok registered under partial mode");
    }

    #[test]
    fn shutdown_and_close_invalidate_the_instance() {
        let mut repository = MemoryRepository::new();
        {
            let mut handle = repository.open().expect("open handle");
            handle.close();
            assert!(matches!(handle.commit(), Err(RepoError::Closed)));
        }
        repository.shutdown();
        assert!(repository.open().is_err());
    }
}
