//! Recording and failing checks for engine tests.
//!
//! Events are recorded into a shared log so tests can assert delivery and
//! ordering across several checks at once.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use packguard_core::check::{Check, ViolationCollector};
use packguard_core::repo::NodeState;
use packguard_types::{Manifest, PackageId, PropertySnapshot, Severity, Violation};

/// One recorded lifecycle event, as `"check:event:detail"`.
pub type SharedLog = Rc<RefCell<Vec<String>>>;

/// Which lifecycle callback a [`FailingCheck`] should fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StartedScan,
    IdentifyPackage,
    IdentifySubpackage,
    ReadManifest,
    BeforeExtract,
    ImportedPath,
    DeletedPath,
    AfterExtract,
    FinishedScan,
}

/// Records every event it receives; never fails, never reports violations
/// unless told to.
pub struct RecordingCheck {
    name: String,
    log: SharedLog,
    collector: ViolationCollector,
    violation_on_path: Option<(String, Severity)>,
}

impl RecordingCheck {
    pub fn new(name: &str, log: SharedLog) -> Self {
        RecordingCheck {
            name: name.to_string(),
            log,
            collector: ViolationCollector::new(),
            violation_on_path: None,
        }
    }

    /// Report a violation whenever the given path is imported.
    pub fn with_violation_on_path(mut self, path: &str, severity: Severity) -> Self {
        self.violation_on_path = Some((path.to_string(), severity));
        self
    }

    fn record(&self, event: &str, detail: &str) {
        self.log
            .borrow_mut()
            .push(format!("{}:{event}:{detail}", self.name));
    }
}

impl Check for RecordingCheck {
    fn check_name(&self) -> String {
        self.name.clone()
    }

    fn started_scan(&mut self) -> anyhow::Result<()> {
        self.collector.reset();
        self.record("started_scan", "");
        Ok(())
    }

    fn identify_package(&mut self, id: &PackageId, _source: &Path) -> anyhow::Result<()> {
        self.record("identify_package", id.as_str());
        Ok(())
    }

    fn identify_subpackage(&mut self, id: &PackageId, parent: &PackageId) -> anyhow::Result<()> {
        self.record("identify_subpackage", &format!("{id}<{parent}"));
        Ok(())
    }

    fn read_manifest(&mut self, id: &PackageId, _manifest: &Manifest) -> anyhow::Result<()> {
        self.record("read_manifest", id.as_str());
        Ok(())
    }

    fn before_extract(
        &mut self,
        id: &PackageId,
        _properties: &PropertySnapshot,
        subpackages: &[PackageId],
    ) -> anyhow::Result<()> {
        self.record("before_extract", &format!("{id}+{}", subpackages.len()));
        Ok(())
    }

    fn imported_path(
        &mut self,
        id: &PackageId,
        path: &str,
        _node: &NodeState,
    ) -> anyhow::Result<()> {
        self.record("imported_path", path);
        if let Some((target, severity)) = &self.violation_on_path {
            if path == target {
                let severity = *severity;
                self.collector
                    .report_for(severity, format!("unwanted path {path}"), id);
            }
        }
        Ok(())
    }

    fn deleted_path(&mut self, _id: &PackageId, path: &str) -> anyhow::Result<()> {
        self.record("deleted_path", path);
        Ok(())
    }

    fn after_extract(&mut self, id: &PackageId) -> anyhow::Result<()> {
        self.record("after_extract", id.as_str());
        Ok(())
    }

    fn finished_scan(&mut self) -> anyhow::Result<()> {
        self.record("finished_scan", "");
        Ok(())
    }

    fn violations(&self) -> Vec<Violation> {
        self.collector.to_vec()
    }
}

/// Records like [`RecordingCheck`] but fails on one chosen event kind,
/// optionally only for one path.
pub struct FailingCheck {
    inner: RecordingCheck,
    fail_on: EventKind,
    fail_path: Option<String>,
}

impl FailingCheck {
    pub fn new(name: &str, log: SharedLog, fail_on: EventKind) -> Self {
        FailingCheck {
            inner: RecordingCheck::new(name, log),
            fail_on,
            fail_path: None,
        }
    }

    /// Only fail when the event concerns this path.
    pub fn on_path(mut self, path: &str) -> Self {
        self.fail_path = Some(path.to_string());
        self
    }

    fn maybe_fail(&self, kind: EventKind, path: Option<&str>) -> anyhow::Result<()> {
        if kind != self.fail_on {
            return Ok(());
        }
        if let Some(fail_path) = &self.fail_path {
            if path != Some(fail_path.as_str()) {
                return Ok(());
            }
        }
        anyhow::bail!("synthetic failure in {}", self.inner.check_name())
    }
}

impl Check for FailingCheck {
    fn check_name(&self) -> String {
        self.inner.check_name()
    }

    fn started_scan(&mut self) -> anyhow::Result<()> {
        self.inner.started_scan()?;
        self.maybe_fail(EventKind::StartedScan, None)
    }

    fn identify_package(&mut self, id: &PackageId, source: &Path) -> anyhow::Result<()> {
        self.inner.identify_package(id, source)?;
        self.maybe_fail(EventKind::IdentifyPackage, None)
    }

    fn identify_subpackage(&mut self, id: &PackageId, parent: &PackageId) -> anyhow::Result<()> {
        self.inner.identify_subpackage(id, parent)?;
        self.maybe_fail(EventKind::IdentifySubpackage, None)
    }

    fn read_manifest(&mut self, id: &PackageId, manifest: &Manifest) -> anyhow::Result<()> {
        self.inner.read_manifest(id, manifest)?;
        self.maybe_fail(EventKind::ReadManifest, None)
    }

    fn before_extract(
        &mut self,
        id: &PackageId,
        properties: &PropertySnapshot,
        subpackages: &[PackageId],
    ) -> anyhow::Result<()> {
        self.inner.before_extract(id, properties, subpackages)?;
        self.maybe_fail(EventKind::BeforeExtract, None)
    }

    fn imported_path(&mut self, id: &PackageId, path: &str, node: &NodeState) -> anyhow::Result<()> {
        self.inner.imported_path(id, path, node)?;
        self.maybe_fail(EventKind::ImportedPath, Some(path))
    }

    fn deleted_path(&mut self, id: &PackageId, path: &str) -> anyhow::Result<()> {
        self.inner.deleted_path(id, path)?;
        self.maybe_fail(EventKind::DeletedPath, Some(path))
    }

    fn after_extract(&mut self, id: &PackageId) -> anyhow::Result<()> {
        self.inner.after_extract(id)?;
        self.maybe_fail(EventKind::AfterExtract, None)
    }

    fn finished_scan(&mut self) -> anyhow::Result<()> {
        self.inner.finished_scan()?;
        self.maybe_fail(EventKind::FinishedScan, None)
    }

    fn violations(&self) -> Vec<Violation> {
        self.inner.violations()
    }
}

/// A fresh shared event log.
pub fn shared_log() -> SharedLog {
    Rc::new(RefCell::new(Vec::new()))
}
