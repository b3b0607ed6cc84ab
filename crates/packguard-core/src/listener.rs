//! Framework-level error sink. Recoverable conditions land here as MAJOR
//! violations; the listener's own report always leads the scan result so
//! framework problems are never silently dropped.

use std::path::Path;

use packguard_types::{ForcedRoot, PackageId, Report, Severity, Violation};

use crate::check::ViolationCollector;
use crate::error::{HookError, ProcessError};
use crate::repo::RepoError;

/// Sink for errors raised by the framework rather than by package content.
pub trait ErrorListener {
    fn report_name(&self) -> String {
        "errors".to_string()
    }

    fn started_scan(&mut self) {}

    fn finished_scan(&mut self) {}

    /// A node type source failed to register after the final pass.
    fn on_node_type_error(&mut self, error: &RepoError, source_name: &str);

    fn on_namespace_error(&mut self, error: &RepoError, prefix: &str, uri: &str);

    fn on_privilege_error(&mut self, error: &RepoError, privilege: &str);

    fn on_forced_root_error(&mut self, error: &RepoError, root: &ForcedRoot);

    /// A check failed inside a lifecycle callback.
    fn on_check_error(
        &mut self,
        error: &anyhow::Error,
        check_name: &str,
        package: Option<&PackageId>,
    );

    /// A check failed while handling a per-path event.
    fn on_check_path_error(
        &mut self,
        error: &anyhow::Error,
        check_name: &str,
        package: &PackageId,
        path: &str,
    );

    /// The importer failed on one path.
    fn on_import_error(&mut self, error: &RepoError, package: &PackageId, path: &str);

    /// A nested package's subtree was abandoned.
    fn on_subpackage_error(&mut self, error: &ProcessError, package: &PackageId);

    /// A package source failed before the fatal abort is raised.
    fn on_package_error(&mut self, error: &ProcessError, source: &Path);

    fn on_hook_error(&mut self, error: &HookError, package: &PackageId);

    fn violations(&self) -> Vec<Violation>;

    fn report(&self) -> Report {
        Report::new(self.report_name(), self.violations())
    }
}

/// Default listener: accumulates MAJOR violations, suppresses the
/// high-volume path-not-found importer condition, and logs the rest.
#[derive(Debug, Default)]
pub struct DefaultErrorListener {
    collector: ViolationCollector,
}

impl DefaultErrorListener {
    pub fn new() -> Self {
        DefaultErrorListener::default()
    }

    fn major(&mut self, description: String, package: Option<&PackageId>) {
        let mut violation = Violation::new(Severity::Major, description);
        if let Some(package) = package {
            violation = violation.with_package(package.clone());
        }
        self.collector.report(violation);
    }
}

impl ErrorListener for DefaultErrorListener {
    fn started_scan(&mut self) {
        self.collector.reset();
    }

    fn on_node_type_error(&mut self, error: &RepoError, source_name: &str) {
        self.major(
            format!("{source_name} - node type registration error: {error}"),
            None,
        );
    }

    fn on_namespace_error(&mut self, error: &RepoError, prefix: &str, uri: &str) {
        self.major(
            format!("{prefix}={uri} - namespace registration error: {error}"),
            None,
        );
    }

    fn on_privilege_error(&mut self, error: &RepoError, privilege: &str) {
        self.major(
            format!("{privilege} - privilege registration error: {error}"),
            None,
        );
    }

    fn on_forced_root_error(&mut self, error: &RepoError, root: &ForcedRoot) {
        self.major(
            format!("{} - forced root creation error: {error}", root.path),
            None,
        );
    }

    fn on_check_error(
        &mut self,
        error: &anyhow::Error,
        check_name: &str,
        package: Option<&PackageId>,
    ) {
        self.major(format!("check error ({check_name}): {error}"), package);
    }

    fn on_check_path_error(
        &mut self,
        error: &anyhow::Error,
        check_name: &str,
        package: &PackageId,
        path: &str,
    ) {
        self.major(
            format!("{path} - check error ({check_name}): {error}"),
            Some(package),
        );
    }

    fn on_import_error(&mut self, error: &RepoError, package: &PackageId, path: &str) {
        // Path-not-found is expected and high-volume during imports.
        if matches!(error, RepoError::PathNotFound { .. }) {
            tracing::debug!(%package, path, "suppressed importer path-not-found");
            return;
        }
        self.major(format!("{path} - importer error: {error}"), Some(package));
    }

    fn on_subpackage_error(&mut self, error: &ProcessError, package: &PackageId) {
        self.major(format!("package error: {error}"), Some(package));
    }

    fn on_package_error(&mut self, error: &ProcessError, source: &Path) {
        tracing::error!(source = %source.display(), %error, "package processing failed");
    }

    fn on_hook_error(&mut self, error: &HookError, package: &PackageId) {
        self.major(format!("install hook error: {error}"), Some(package));
    }

    fn violations(&self) -> Vec<Violation> {
        self.collector.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_path_not_found_is_suppressed() {
        let mut listener = DefaultErrorListener::new();
        let package = PackageId::new("g:a:1");

        listener.on_import_error(
            &RepoError::PathNotFound {
                path: "/x".to_string(),
            },
            &package,
            "/x",
        );
        assert!(listener.violations().is_empty());

        listener.on_import_error(
            &RepoError::UnknownNodeType {
                name: "ex:thing".to_string(),
            },
            &package,
            "/x",
        );
        let violations = listener.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Major);
        assert_eq!(violations[0].packages, vec![package]);
    }

    #[test]
    fn check_errors_reference_the_offending_check() {
        let mut listener = DefaultErrorListener::new();
        let package = PackageId::new("g:a:1");
        let error = anyhow::anyhow!("boom");

        listener.on_check_error(&error, "pkg/basic/paths", Some(&package));
        let violations = listener.violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].description.contains("pkg/basic/paths"));
    }

    #[test]
    fn started_scan_resets_accumulated_state() {
        let mut listener = DefaultErrorListener::new();
        listener.on_privilege_error(
            &RepoError::PrivilegeExists {
                name: "ex:x".to_string(),
            },
            "ex:x",
        );
        assert_eq!(listener.violations().len(), 1);

        listener.started_scan();
        assert!(listener.violations().is_empty());
        assert_eq!(listener.report().check_name, "errors");
    }
}
