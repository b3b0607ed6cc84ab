//! The two-tier failure model: fatal scan errors versus the recoverable
//! conditions routed through the error listener.

use std::path::{Path, PathBuf};

use packguard_types::PackageId;

use crate::archive::ArchiveError;
use crate::repo::RepoError;

/// Failure while processing one package. Whether it is fatal depends on
/// where it surfaces: top-level packages abort the scan, nested packages
/// abort only their own subtree.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("package '{id}' is not valid")]
    InvalidPackage { id: PackageId },

    #[error("install hook '{hook}' failed for package '{id}' under the abort policy")]
    HookAbort { id: PackageId, hook: String },
}

/// Install hook conditions reported through the error listener.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("install hook '{name}' was registered while hooks are prohibited")]
    Prohibited { name: String },

    #[error("install hook '{name}' failed to register")]
    Failed { name: String },
}

/// Fatal error terminating an entire scan. Carries the offending top-level
/// package locator when one is known. No reports are produced alongside it.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan aborted: {source}")]
    Repository {
        #[source]
        source: RepoError,
    },

    #[error("scan aborted while processing '{}': {source}", package.display())]
    Package {
        package: PathBuf,
        #[source]
        source: ProcessError,
    },
}

impl ScanError {
    /// The source locator of the package that caused the abort, if any.
    pub fn package(&self) -> Option<&Path> {
        match self {
            ScanError::Repository { .. } => None,
            ScanError::Package { package, .. } => Some(package),
        }
    }
}
