//! Named, module-scoped bundles of check specs and repository bootstrap
//! directives. Built once at plan-load time and read-only thereafter.

use packguard_types::{CheckSpec, ChecklistFile, ForcedRoot, Namespace, NodeTypeDef, NodeTypeSet};

use crate::init::{InitStage, InitStageBuilder};

#[derive(Debug, thiserror::Error)]
pub enum ChecklistError {
    #[error("checklist '{checklist}' contains an abstract check spec ('{name}')")]
    AbstractCheck { checklist: String, name: String },

    #[error("checklist '{checklist}' contains an unnamed check spec")]
    UnnamedCheck { checklist: String },

    #[error("checklist '{checklist}' check name '{name}' must not contain '/'")]
    SlashInName { checklist: String, name: String },
}

/// A named bundle of check specs plus repository-bootstrap directives.
///
/// Every contained check spec's name is prefixed with `moduleName/name/` at
/// construction time; abstract or slash-containing specs are rejected.
#[derive(Debug, Clone)]
pub struct Checklist {
    module_name: String,
    name: String,
    ordered_node_type_sources: Vec<NodeTypeSet>,
    unordered_node_type_sources: Vec<NodeTypeSet>,
    namespaces: Vec<Namespace>,
    privileges: Vec<String>,
    forced_roots: Vec<ForcedRoot>,
    checks: Vec<CheckSpec>,
}

impl Checklist {
    pub fn builder(module_name: impl Into<String>) -> ChecklistBuilder {
        ChecklistBuilder::new(module_name)
    }

    /// Build a checklist from its on-disk document. Node type sources named
    /// by `cndUrls`/`cndNames` must already be resolved by the caller;
    /// inline `jcrNodetypes` are added as an unordered source.
    pub fn from_document(
        module_name: impl Into<String>,
        doc: ChecklistFile,
        ordered_sources: Vec<NodeTypeSet>,
    ) -> Result<Self, ChecklistError> {
        let mut builder = ChecklistBuilder::new(module_name)
            .with_ordered_node_type_sources(ordered_sources)
            .with_namespaces(doc.jcr_namespaces)
            .with_privileges(doc.jcr_privileges)
            .with_forced_roots(doc.forced_roots)
            .with_checks(doc.checks);
        if let Some(name) = doc.name {
            builder = builder.with_name(name);
        }
        if !doc.jcr_nodetypes.is_empty() {
            builder = builder.with_unordered_node_type_source(NodeTypeSet {
                name: "inline".to_string(),
                defs: doc.jcr_nodetypes,
            });
        }
        builder.build()
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The checklist's identifier as matched by activation patterns.
    pub fn id(&self) -> String {
        format!("{}/{}", self.module_name, self.name)
    }

    pub fn ordered_node_type_sources(&self) -> &[NodeTypeSet] {
        &self.ordered_node_type_sources
    }

    pub fn unordered_node_type_sources(&self) -> &[NodeTypeSet] {
        &self.unordered_node_type_sources
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn privileges(&self) -> &[String] {
        &self.privileges
    }

    pub fn forced_roots(&self) -> &[ForcedRoot] {
        &self.forced_roots
    }

    /// Check specs with their scan-wide `moduleName/name/` prefixed names.
    pub fn checks(&self) -> &[CheckSpec] {
        &self.checks
    }

    /// Resolve this checklist's bootstrap directives into one init stage.
    pub fn as_init_stage(&self) -> InitStage {
        InitStageBuilder::new()
            .with_ordered_sources(self.ordered_node_type_sources.clone())
            .with_unordered_sources(self.unordered_node_type_sources.clone())
            .with_namespaces(self.namespaces.clone())
            .with_privileges(self.privileges.clone())
            .with_forced_roots(self.forced_roots.clone())
            .build()
    }
}

/// Builder for [`Checklist`]. Check name validation and prefixing happen in
/// [`ChecklistBuilder::build`].
#[derive(Debug, Default)]
pub struct ChecklistBuilder {
    module_name: String,
    name: Option<String>,
    ordered_node_type_sources: Vec<NodeTypeSet>,
    unordered_node_type_sources: Vec<NodeTypeSet>,
    namespaces: Vec<Namespace>,
    privileges: Vec<String>,
    forced_roots: Vec<ForcedRoot>,
    checks: Vec<CheckSpec>,
}

impl ChecklistBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        ChecklistBuilder {
            module_name: module_name.into(),
            ..ChecklistBuilder::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ordered_node_type_sources(mut self, sources: Vec<NodeTypeSet>) -> Self {
        self.ordered_node_type_sources.extend(sources);
        self
    }

    pub fn with_unordered_node_type_source(mut self, source: NodeTypeSet) -> Self {
        self.unordered_node_type_sources.push(source);
        self
    }

    pub fn with_inline_node_types(self, defs: Vec<NodeTypeDef>) -> Self {
        self.with_unordered_node_type_source(NodeTypeSet {
            name: "inline".to_string(),
            defs,
        })
    }

    pub fn with_namespaces(mut self, namespaces: Vec<Namespace>) -> Self {
        self.namespaces.extend(namespaces);
        self
    }

    pub fn with_privileges(mut self, privileges: Vec<String>) -> Self {
        self.privileges.extend(privileges);
        self
    }

    pub fn with_forced_roots(mut self, roots: Vec<ForcedRoot>) -> Self {
        self.forced_roots.extend(roots);
        self
    }

    pub fn with_check(mut self, check: CheckSpec) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_checks(mut self, checks: Vec<CheckSpec>) -> Self {
        self.checks.extend(checks);
        self
    }

    pub fn build(self) -> Result<Checklist, ChecklistError> {
        let name = self.name.unwrap_or_else(|| self.module_name.clone());
        let checklist_id = format!("{}/{}", self.module_name, name);
        let prefix = check_prefix(&self.module_name, &name);

        let mut checks = Vec::with_capacity(self.checks.len());
        for check in self.checks {
            if !check.is_named() {
                return Err(ChecklistError::UnnamedCheck {
                    checklist: checklist_id,
                });
            }
            let local_name = check.name_or_empty().to_string();
            if check.is_abstract() {
                return Err(ChecklistError::AbstractCheck {
                    checklist: checklist_id,
                    name: local_name,
                });
            }
            if local_name.contains('/') {
                return Err(ChecklistError::SlashInName {
                    checklist: checklist_id,
                    name: local_name,
                });
            }
            let mut prefixed = check;
            prefixed.name = Some(format!("{prefix}{local_name}"));
            checks.push(prefixed);
        }

        Ok(Checklist {
            module_name: self.module_name,
            name,
            ordered_node_type_sources: self.ordered_node_type_sources,
            unordered_node_type_sources: self.unordered_node_type_sources,
            namespaces: self.namespaces,
            privileges: self.privileges,
            forced_roots: self.forced_roots,
            checks,
        })
    }
}

fn check_prefix(module_name: &str, checklist_name: &str) -> String {
    let module_prefix = if module_name.is_empty() {
        String::new()
    } else {
        format!("{module_name}/")
    };
    if checklist_name.is_empty() || checklist_name == module_name {
        module_prefix
    } else {
        format!("{module_prefix}{checklist_name}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, impl_ref: &str) -> CheckSpec {
        CheckSpec {
            name: Some(name.to_string()),
            impl_ref: Some(impl_ref.to_string()),
            ..CheckSpec::default()
        }
    }

    #[test]
    fn build_prefixes_check_names_with_module_and_list_name() {
        let checklist = Checklist::builder("pkg")
            .with_name("basic")
            .with_check(check("paths", "paths"))
            .build()
            .expect("build checklist");

        assert_eq!(checklist.id(), "pkg/basic");
        assert_eq!(
            checklist.checks()[0].name.as_deref(),
            Some("pkg/basic/paths")
        );
    }

    #[test]
    fn checklist_named_after_module_prefixes_once() {
        let checklist = Checklist::builder("pkg")
            .with_name("pkg")
            .with_check(check("paths", "paths"))
            .build()
            .expect("build checklist");

        assert_eq!(checklist.checks()[0].name.as_deref(), Some("pkg/paths"));
    }

    #[test]
    fn missing_name_falls_back_to_module_name() {
        let checklist = Checklist::builder("pkg")
            .with_check(check("paths", "paths"))
            .build()
            .expect("build checklist");

        assert_eq!(checklist.name(), "pkg");
        assert_eq!(checklist.checks()[0].name.as_deref(), Some("pkg/paths"));
    }

    #[test]
    fn abstract_checks_are_rejected_at_build_time() {
        let abstract_check = CheckSpec {
            name: Some("ghost".to_string()),
            ..CheckSpec::default()
        };
        let err = Checklist::builder("pkg")
            .with_name("basic")
            .with_check(abstract_check)
            .build()
            .expect_err("abstract check must fail the build");

        assert!(matches!(err, ChecklistError::AbstractCheck { name, .. } if name == "ghost"));
    }

    #[test]
    fn slash_in_check_name_is_rejected() {
        let err = Checklist::builder("pkg")
            .with_name("basic")
            .with_check(check("sub/paths", "paths"))
            .build()
            .expect_err("slash-containing name must fail the build");

        assert!(matches!(err, ChecklistError::SlashInName { name, .. } if name == "sub/paths"));
    }

    #[test]
    fn from_document_collects_directives() {
        let doc: ChecklistFile = serde_json::from_str(
            r#"{
                "name": "basic",
                "jcrNodetypes": [{"name": "ex:thing"}],
                "jcrNamespaces": [{"prefix": "ex", "uri": "http://example.com/1.0"}],
                "jcrPrivileges": ["ex:canScan"],
                "forcedRoots": [{"path": "/apps"}],
                "checks": [{"impl": "paths", "name": "paths"}]
            }"#,
        )
        .expect("parse document");

        let checklist = Checklist::from_document(
            "pkg",
            doc,
            vec![NodeTypeSet {
                name: "types.cnd".to_string(),
                defs: vec![NodeTypeDef::named("ex:base")],
            }],
        )
        .expect("build from document");

        assert_eq!(checklist.ordered_node_type_sources().len(), 1);
        assert_eq!(checklist.unordered_node_type_sources().len(), 1);
        assert_eq!(checklist.namespaces()[0].uri, "http://example.com/1.0");
        assert_eq!(checklist.privileges(), ["ex:canScan".to_string()]);
        assert_eq!(checklist.forced_roots()[0].path, "/apps");

        let stage = checklist.as_init_stage();
        assert_eq!(stage.ordered_sources().len(), 1);
        assert_eq!(stage.privileges().len(), 1);
    }
}
