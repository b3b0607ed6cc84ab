//! Plan and checklist loading.
//!
//! This is the thin discovery adapter around the core: checklists are read
//! from explicit JSON files and handed to the planner pre-parsed. Node type
//! sources named by `cndUrls`/`cndNames` resolve to JSON files relative to
//! the checklist's own directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use packguard_domain::{Checklist, InitStage, InitStageBuilder, Planner};
use packguard_types::{ChecklistFile, NodeTypeDef, NodeTypeSet, PlanFile};

/// A plan document plus where it was loaded from, for resolving relative
/// package sources.
#[derive(Debug)]
pub struct LoadedPlan {
    pub plan: PlanFile,
    pub base_dir: PathBuf,
}

pub fn load_plan(path: &Path) -> Result<LoadedPlan> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read plan file '{}'", path.display()))?;
    let plan: PlanFile = serde_json::from_str(&text)
        .with_context(|| format!("parse plan file '{}'", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(LoadedPlan { plan, base_dir })
}

/// Load one checklist file. The module name is the file stem unless the
/// caller provides one.
pub fn load_checklist(path: &Path, module_name: Option<&str>) -> Result<Checklist> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read checklist file '{}'", path.display()))?;
    let doc: ChecklistFile = serde_json::from_str(&text)
        .with_context(|| format!("parse checklist file '{}'", path.display()))?;

    let module_name = match module_name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("checklist")
            .to_string(),
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut sources = Vec::new();
    for source_name in doc.cnd_urls.iter().chain(doc.cnd_names.iter()) {
        sources.push(resolve_node_type_source(base_dir, source_name)?);
    }

    debug!(module = %module_name, checklist = %path.display(), "loaded checklist");
    Checklist::from_document(module_name, doc, sources)
        .with_context(|| format!("build checklist from '{}'", path.display()))
}

pub fn load_checklists(paths: &[PathBuf]) -> Result<Vec<Checklist>> {
    paths
        .iter()
        .map(|path| load_checklist(path, None))
        .collect()
}

/// A node type source file is a JSON array of definitions, named after the
/// file itself.
fn resolve_node_type_source(base_dir: &Path, name: &str) -> Result<NodeTypeSet> {
    let path = base_dir.join(name);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("read node type source '{}'", path.display()))?;
    let defs: Vec<NodeTypeDef> = serde_json::from_str(&text)
        .with_context(|| format!("parse node type source '{}'", path.display()))?;
    Ok(NodeTypeSet {
        name: name.to_string(),
        defs,
    })
}

/// The plan's own bootstrap directives as a trailing init stage.
pub fn plan_init_stage(plan: &PlanFile) -> InitStage {
    let mut builder = InitStageBuilder::new()
        .with_namespaces(plan.jcr_namespaces.clone())
        .with_privileges(plan.jcr_privileges.clone())
        .with_forced_roots(plan.forced_roots.clone());
    if !plan.jcr_nodetypes.is_empty() {
        builder = builder.with_ordered_source(NodeTypeSet {
            name: "plan".to_string(),
            defs: plan.jcr_nodetypes.clone(),
        });
    }
    builder.build()
}

/// Partition checklists by the plan's activation patterns and collect the
/// full init stage list: one per selected checklist, then the plan's own.
pub fn plan_scan(plan: &PlanFile, checklists: Vec<Checklist>) -> Result<(Planner, Vec<InitStage>)> {
    let planner = Planner::new(checklists, &plan.checklists)?;
    let mut stages = planner.init_stages();
    stages.push(plan_init_stage(plan));
    Ok((planner, stages))
}

/// Resolve a plan-relative package source to a path.
pub fn resolve_package_source(base_dir: &Path, source: &str) -> PathBuf {
    let path = PathBuf::from(source);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).expect("create file");
        file.write_all(contents.as_bytes()).expect("write file");
        path
    }

    #[test]
    fn checklist_loads_with_resolved_node_type_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_file(
            dir.path(),
            "types.json",
            r#"[{"name": "ex:base"}, {"name": "ex:page", "supertypes": ["ex:base"]}]"#,
        );
        let checklist_path = write_file(
            dir.path(),
            "basic.json",
            r#"{
                "name": "basic",
                "cndUrls": ["types.json"],
                "checks": [{"impl": "paths", "name": "paths"}]
            }"#,
        );

        let checklist = load_checklist(&checklist_path, Some("acme")).expect("load checklist");
        assert_eq!(checklist.id(), "acme/basic");
        assert_eq!(checklist.ordered_node_type_sources().len(), 1);
        assert_eq!(checklist.ordered_node_type_sources()[0].defs.len(), 2);
        assert_eq!(checklist.checks()[0].name.as_deref(), Some("acme/basic/paths"));
    }

    #[test]
    fn module_name_defaults_to_file_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "acme-rules.json", r#"{"name": "basic"}"#);
        let checklist = load_checklist(&path, None).expect("load checklist");
        assert_eq!(checklist.module_name(), "acme-rules");
    }

    #[test]
    fn plan_stage_carries_inline_directives() {
        let plan: PlanFile = serde_json::from_str(
            r#"{
                "jcrNodetypes": [{"name": "ex:thing"}],
                "jcrNamespaces": [{"prefix": "ex", "uri": "http://example.com/1.0"}],
                "forcedRoots": [{"path": "/apps"}]
            }"#,
        )
        .expect("parse plan");

        let stage = plan_init_stage(&plan);
        assert_eq!(stage.ordered_sources().len(), 1);
        assert_eq!(stage.namespaces().len(), 1);
        assert_eq!(stage.forced_roots_in_creation_order().len(), 1);
    }

    #[test]
    fn missing_plan_file_reports_its_path() {
        let error = load_plan(Path::new("/no/such/plan.json")).expect_err("missing file");
        assert!(error.to_string().contains("/no/such/plan.json"));
    }
}
