//! Built-in check implementations.
//!
//! These are the stock checks a loader can register out of the box. Only
//! path rules are shipped here; everything domain-specific arrives through
//! checklists.

use globset::{Glob, GlobSet, GlobSetBuilder};
use packguard_types::{ConfigMap, PackageId, Severity, Violation};

use crate::check::{Check, CheckRegistry, ViolationCollector};
use crate::repo::NodeState;

/// Register the built-in check implementations under their stock names.
pub fn register_builtins(registry: &mut CheckRegistry) {
    registry.register(
        "paths",
        Box::new(|config: &ConfigMap| {
            Ok(Box::new(PathsCheck::from_config(config)?) as Box<dyn Check>)
        }),
    );
}

/// Deny path imports and deletes by glob.
///
/// Example config:
/// ```json
/// {
///     "deniedPaths": ["/etc/tags/**"],
///     "denyAllDeletes": true,
///     "severity": "major"
/// }
/// ```
pub struct PathsCheck {
    denied: Option<GlobSet>,
    denied_patterns: Vec<String>,
    deny_all_deletes: bool,
    severity: Severity,
    collector: ViolationCollector,
}

impl PathsCheck {
    pub fn from_config(config: &ConfigMap) -> anyhow::Result<Self> {
        let denied_patterns: Vec<String> = config
            .get("deniedPaths")
            .and_then(|v| v.as_array())
            .map(|patterns| {
                patterns
                    .iter()
                    .filter_map(|p| p.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let denied = if denied_patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &denied_patterns {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };

        let deny_all_deletes = config
            .get("denyAllDeletes")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let severity = config
            .get("severity")
            .and_then(|v| v.as_str())
            .map(|s| match s.to_ascii_lowercase().as_str() {
                "minor" => Severity::Minor,
                "severe" => Severity::Severe,
                _ => Severity::Major,
            })
            .unwrap_or(Severity::Major);

        Ok(PathsCheck {
            denied,
            denied_patterns,
            deny_all_deletes,
            severity,
            collector: ViolationCollector::new(),
        })
    }

    fn denied_by(&self, path: &str) -> Option<&str> {
        let denied = self.denied.as_ref()?;
        denied
            .matches(path)
            .into_iter()
            .last()
            .map(|index| self.denied_patterns[index].as_str())
    }
}

impl Check for PathsCheck {
    fn check_name(&self) -> String {
        "paths".to_string()
    }

    fn started_scan(&mut self) -> anyhow::Result<()> {
        self.collector.reset();
        Ok(())
    }

    fn imported_path(
        &mut self,
        id: &PackageId,
        path: &str,
        _node: &NodeState,
    ) -> anyhow::Result<()> {
        if let Some(pattern) = self.denied_by(path) {
            self.collector.report_for(
                self.severity,
                format!("imported path {path} matches deny pattern {pattern}"),
                id,
            );
        }
        Ok(())
    }

    fn deleted_path(&mut self, id: &PackageId, path: &str) -> anyhow::Result<()> {
        if self.deny_all_deletes {
            self.collector.report_for(
                self.severity,
                format!("deleted path {path}. All deletions are denied."),
                id,
            );
        } else if let Some(pattern) = self.denied_by(path) {
            self.collector.report_for(
                self.severity,
                format!("deleted path {path} matches deny pattern {pattern}"),
                id,
            );
        }
        Ok(())
    }

    fn violations(&self) -> Vec<Violation> {
        self.collector.to_vec()
    }
}
