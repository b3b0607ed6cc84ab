//! The uniform check interface and its supporting pieces.
//!
//! Every check, however it was produced, is driven through [`Check`].
//! Checks receive events synchronously, one at a time, so their violation
//! accumulators need no locking; the accumulator is reset at scan start and
//! read only after scan finish.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use packguard_types::{CheckSpec, ConfigMap, Manifest, PackageId, PropertySnapshot, Severity, Violation};

use crate::repo::NodeState;

/// Pluggable validation unit receiving scan lifecycle events.
///
/// Any callback may fail; the engine isolates the failure per check per
/// event, reports it through the error listener, and keeps delivering to
/// the remaining checks.
pub trait Check {
    fn check_name(&self) -> String;

    fn started_scan(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn identify_package(&mut self, _id: &PackageId, _source: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn identify_subpackage(&mut self, _id: &PackageId, _parent: &PackageId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Best-effort notification with the package manifest, when one could
    /// be read.
    fn read_manifest(&mut self, _id: &PackageId, _manifest: &Manifest) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_extract(
        &mut self,
        _id: &PackageId,
        _properties: &PropertySnapshot,
        _subpackages: &[PackageId],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn imported_path(
        &mut self,
        _id: &PackageId,
        _path: &str,
        _node: &NodeState,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn deleted_path(&mut self, _id: &PackageId, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_extract(&mut self, _id: &PackageId) -> anyhow::Result<()> {
        Ok(())
    }

    fn finished_scan(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The violations accumulated so far. Read after scan finish.
    fn violations(&self) -> Vec<Violation>;
}

/// Private violation accumulator embedded by check implementations.
#[derive(Debug, Default, Clone)]
pub struct ViolationCollector {
    violations: Vec<Violation>,
}

impl ViolationCollector {
    pub fn new() -> Self {
        ViolationCollector::default()
    }

    pub fn report(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn report_for(
        &mut self,
        severity: Severity,
        description: impl Into<String>,
        package: &PackageId,
    ) {
        self.violations
            .push(Violation::new(severity, description).with_package(package.clone()));
    }

    pub fn reset(&mut self) {
        self.violations.clear();
    }

    pub fn to_vec(&self) -> Vec<Violation> {
        self.violations.clone()
    }
}

/// A registered check plus its per-scan presentation: an optional alias
/// name and a silence flag. Silenced checks receive no events but still
/// contribute a report.
pub struct CheckWrapper {
    check: Box<dyn Check>,
    alias: Option<String>,
    silenced: bool,
}

impl CheckWrapper {
    pub fn new(check: Box<dyn Check>) -> Self {
        CheckWrapper {
            check,
            alias: None,
            silenced: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn silenced(mut self, silenced: bool) -> Self {
        self.silenced = silenced;
        self
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// The alias when present, else the check's own name.
    pub fn effective_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.check.check_name())
    }

    pub fn check_mut(&mut self) -> &mut dyn Check {
        self.check.as_mut()
    }

    pub fn report(&self) -> packguard_types::Report {
        packguard_types::Report::new(self.effective_name(), self.check.violations())
    }
}

impl std::fmt::Debug for CheckWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckWrapper")
            .field("name", &self.effective_name())
            .field("silenced", &self.silenced)
            .finish()
    }
}

/// Produces check instances from an opaque config blob.
pub trait CheckFactory {
    fn make(&self, config: &ConfigMap) -> anyhow::Result<Box<dyn Check>>;
}

impl<F> CheckFactory for F
where
    F: Fn(&ConfigMap) -> anyhow::Result<Box<dyn Check>>,
{
    fn make(&self, config: &ConfigMap) -> anyhow::Result<Box<dyn Check>> {
        self(config)
    }
}

/// Maps implementation references to factories. This is the seam where a
/// loader normalizes however checks are located into the one [`Check`]
/// interface; the engine itself never looks up anything.
#[derive(Default)]
pub struct CheckRegistry {
    factories: BTreeMap<String, Box<dyn CheckFactory>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        CheckRegistry::default()
    }

    pub fn register(&mut self, impl_ref: impl Into<String>, factory: Box<dyn CheckFactory>) {
        self.factories.insert(impl_ref.into(), factory);
    }

    /// Instantiate one wrapped check from an effective spec. The spec's
    /// name becomes the check's alias, and skipped specs must already have
    /// been resolved away by the planner.
    pub fn create(&self, spec: &CheckSpec) -> anyhow::Result<CheckWrapper> {
        if spec.inline_script.is_some() {
            anyhow::bail!(
                "check '{}' uses an inline script, and no script engine is configured",
                spec.name_or_empty()
            );
        }
        let impl_ref = spec
            .impl_ref
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .with_context(|| {
                format!("check '{}' has no implementation reference", spec.name_or_empty())
            })?;
        let factory = self
            .factories
            .get(impl_ref)
            .with_context(|| format!("no check implementation registered for '{impl_ref}'"))?;
        let check = factory
            .make(&spec.config)
            .with_context(|| format!("failed to construct check '{impl_ref}'"))?;

        let mut wrapper = CheckWrapper::new(check);
        if spec.is_named() {
            wrapper = wrapper.with_alias(spec.name_or_empty());
        }
        Ok(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Check for Named {
        fn check_name(&self) -> String {
            self.0.to_string()
        }

        fn violations(&self) -> Vec<Violation> {
            Vec::new()
        }
    }

    #[test]
    fn wrapper_prefers_alias_over_check_name() {
        let plain = CheckWrapper::new(Box::new(Named("inner")));
        assert_eq!(plain.effective_name(), "inner");

        let aliased = CheckWrapper::new(Box::new(Named("inner"))).with_alias("pkg/basic/inner");
        assert_eq!(aliased.effective_name(), "pkg/basic/inner");
        assert_eq!(aliased.report().check_name, "pkg/basic/inner");
    }

    #[test]
    fn registry_creates_aliased_checks_from_specs() {
        let mut registry = CheckRegistry::new();
        registry.register(
            "named",
            Box::new(|_: &ConfigMap| Ok(Box::new(Named("factory-made")) as Box<dyn Check>)),
        );

        let spec = CheckSpec {
            impl_ref: Some("named".to_string()),
            name: Some("pkg/basic/named".to_string()),
            ..CheckSpec::default()
        };
        let wrapper = registry.create(&spec).expect("create check");
        assert_eq!(wrapper.effective_name(), "pkg/basic/named");

        let missing = CheckSpec {
            impl_ref: Some("absent".to_string()),
            ..CheckSpec::default()
        };
        assert!(registry.create(&missing).is_err());
    }

    #[test]
    fn collector_resets_between_scans() {
        let mut collector = ViolationCollector::new();
        collector.report_for(Severity::Minor, "first", &PackageId::new("g:a:1"));
        assert_eq!(collector.to_vec().len(), 1);

        collector.reset();
        assert!(collector.to_vec().is_empty());
    }
}
