//! Data types (documents + reports) for packguard.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.
//! Checklist and plan documents deserialize from the camelCase JSON shape
//! produced by packaging toolchains; everything else is the report model
//! shared by every other crate in the workspace.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Opaque configuration blob attached to a check spec.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Properties snapshot handed to checks before a package is extracted.
pub type PropertySnapshot = serde_json::Map<String, serde_json::Value>;

/// Best-effort parsed package manifest.
pub type Manifest = serde_json::Map<String, serde_json::Value>;

// ── Identity ───────────────────────────────────────────────────

/// Identifier of a package within a scan, e.g. `my_packages:example:1.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PackageId(pub String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        PackageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        PackageId(value.to_string())
    }
}

// ── Violations & reports ───────────────────────────────────────

/// Severity of a reported violation, ordered least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Severe,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Severe => "severe",
        }
    }

    /// True when this severity meets or exceeds `threshold`.
    pub fn at_least(self, threshold: Severity) -> bool {
        self >= threshold
    }
}

/// One reported problem, associated with zero or more package ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageId>,
}

impl Violation {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Violation {
            severity,
            description: description.into(),
            packages: Vec::new(),
        }
    }

    pub fn with_package(mut self, id: PackageId) -> Self {
        self.packages.push(id);
        self
    }
}

/// Violations accumulated by one check (or the error listener) over a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub check_name: String,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn new(check_name: impl Into<String>, violations: Vec<Violation>) -> Self {
        Report {
            check_name: check_name.into(),
            violations,
        }
    }

    /// Violations at or above the given severity.
    pub fn violations_at_least(&self, threshold: Severity) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.severity.at_least(threshold))
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

// ── Check specs ────────────────────────────────────────────────

/// Configuration for one check: an implementation reference (or inline
/// script), a display name, an optional inheritance template, a skip flag,
/// and an opaque config blob. Merges always produce a new instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    /// Implementation lookup reference. Unspecified when empty.
    #[serde(default, rename = "impl", skip_serializing_if = "Option::is_none")]
    pub impl_ref: Option<String>,

    /// Inline script source, as an alternative to `impl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_script: Option<String>,

    /// Engine name for `inlineScript`; unset means the default engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_engine: Option<String>,

    /// Display name, and the key by which overrides find their base spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Name of another spec to inherit impl and config from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,

    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl CheckSpec {
    /// An abstract spec has neither an impl reference nor an inline script
    /// and is not invokable on its own; it can only overlay another spec.
    pub fn is_abstract(&self) -> bool {
        blank(&self.impl_ref) && self.inline_script.is_none()
    }

    /// A spec with a non-blank template must inherit from another spec and
    /// can therefore never override one.
    pub fn must_inherit(&self) -> bool {
        !blank(&self.template)
    }

    /// Unnamed specs cannot be overridden.
    pub fn is_named(&self) -> bool {
        !blank(&self.name)
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

// ── Repository bootstrap directives ────────────────────────────

/// A namespace mapping registered before any package is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// A content path whose existence and type are guaranteed before scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForcedRoot {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixin_types: Vec<String>,
}

impl ForcedRoot {
    pub fn new(path: impl Into<String>) -> Self {
        ForcedRoot {
            path: path.into(),
            primary_type: None,
            mixin_types: Vec::new(),
        }
    }
}

/// One declarative node type definition. Registration fails while any
/// named supertype is still unregistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeTypeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,
}

impl NodeTypeDef {
    pub fn named(name: impl Into<String>) -> Self {
        NodeTypeDef {
            name: name.into(),
            supertypes: Vec::new(),
        }
    }
}

/// A named source of node type definitions, e.g. one resolved cnd document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeTypeSet {
    pub name: String,
    #[serde(default)]
    pub defs: Vec<NodeTypeDef>,
}

// ── Install hooks ──────────────────────────────────────────────

/// Policy for install hooks bundled in scanned packages, fixed per scan.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum InstallHookPolicy {
    /// Never execute hooks; a registered hook is itself a violation.
    Prohibit,
    /// Execute hooks; registration failures are violations, scan continues.
    #[default]
    Report,
    /// Execute hooks; any hook failure aborts the scan.
    Abort,
    /// Hooks are never registered.
    Skip,
}

impl InstallHookPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallHookPolicy::Prohibit => "prohibit",
            InstallHookPolicy::Report => "report",
            InstallHookPolicy::Abort => "abort",
            InstallHookPolicy::Skip => "skip",
        }
    }

    /// Case-insensitive lookup by policy name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "prohibit" => Some(InstallHookPolicy::Prohibit),
            "report" => Some(InstallHookPolicy::Report),
            "abort" => Some(InstallHookPolicy::Abort),
            "skip" => Some(InstallHookPolicy::Skip),
            _ => None,
        }
    }
}

// ── Documents ──────────────────────────────────────────────────

/// The on-disk checklist document shape.
///
/// `cndUrls` and `cndNames` identify node type sources that the loader
/// resolves to [`NodeTypeSet`]s before the checklist is constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cnd_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cnd_names: Vec<String>,

    /// Inline node type definitions, registered with the unordered sources.
    #[serde(default, rename = "jcrNodetypes", skip_serializing_if = "Vec::is_empty")]
    pub jcr_nodetypes: Vec<NodeTypeDef>,

    #[serde(default, rename = "jcrNamespaces", skip_serializing_if = "Vec::is_empty")]
    pub jcr_namespaces: Vec<Namespace>,

    #[serde(default, rename = "jcrPrivileges", skip_serializing_if = "Vec::is_empty")]
    pub jcr_privileges: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forced_roots: Vec<ForcedRoot>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckSpec>,
}

/// The on-disk plan document: a scan's top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanFile {
    /// Identifier patterns of checklists to activate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklists: Vec<String>,

    /// Direct checks and overrides supplied by the caller.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckSpec>,

    /// Baseline package sources imported before checks are notified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_install_urls: Vec<String>,

    #[serde(default, rename = "jcrNodetypes", skip_serializing_if = "Vec::is_empty")]
    pub jcr_nodetypes: Vec<NodeTypeDef>,

    #[serde(default, rename = "jcrNamespaces", skip_serializing_if = "Vec::is_empty")]
    pub jcr_namespaces: Vec<Namespace>,

    #[serde(default, rename = "jcrPrivileges", skip_serializing_if = "Vec::is_empty")]
    pub jcr_privileges: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forced_roots: Vec<ForcedRoot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_hook_policy: Option<InstallHookPolicy>,

    /// Execute hooks bundled in pre-install packages as well.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enable_pre_install_hooks: bool,
}
