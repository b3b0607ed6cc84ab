//! Report rendering for the terminal and for report files.

use chrono::Utc;
use packguard_types::{Report, Severity};

/// Render reports as human-readable text, omitting violation-free checks
/// unless `all` is set.
pub fn render_text(reports: &[Report], all: bool) -> String {
    let mut out = String::new();
    let mut total = 0usize;
    for report in reports {
        if report.violations.is_empty() && !all {
            continue;
        }
        out.push_str(&format!("{}\n", report.check_name));
        for violation in &report.violations {
            total += 1;
            out.push_str(&format!(
                "  [{}] {}",
                violation.severity.as_str(),
                violation.description
            ));
            if !violation.packages.is_empty() {
                let ids: Vec<&str> = violation.packages.iter().map(|p| p.as_str()).collect();
                out.push_str(&format!(" ({})", ids.join(", ")));
            }
            out.push('\n');
        }
    }
    out.push_str(&format!("{total} violation(s) reported\n"));
    out
}

/// Render reports as a JSON document with a generation timestamp.
pub fn render_json(reports: &[Report]) -> serde_json::Result<String> {
    let envelope = serde_json::json!({
        "generatedAt": Utc::now().to_rfc3339(),
        "reports": reports,
    });
    serde_json::to_string_pretty(&envelope)
}

/// The worst severity across all reports, if any violation was recorded.
pub fn worst_severity(reports: &[Report]) -> Option<Severity> {
    reports.iter().filter_map(Report::worst_severity).max()
}
