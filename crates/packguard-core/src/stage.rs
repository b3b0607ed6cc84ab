//! Scoped staging area for package inputs that are not already local files.
//!
//! Staged files live in one temp directory per scan, acquired before use
//! and released on every exit path when the value drops. Never shared
//! across scans.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use tempfile::TempDir;

/// Package inputs materialized as local temporary files.
#[derive(Debug)]
pub struct StagedPackages {
    // held for its Drop: deleting the directory releases every staged file
    _dir: TempDir,
    paths: Vec<PathBuf>,
}

impl StagedPackages {
    /// Copy each named input stream to its own temp file.
    pub fn stage<R: Read>(
        sources: impl IntoIterator<Item = (String, R)>,
    ) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let mut paths = Vec::new();
        for (index, (name, mut reader)) in sources.into_iter().enumerate() {
            let file_name = format!("{index}-{}", sanitize(&name));
            let path = dir.path().join(file_name);
            let mut file = std::fs::File::create(&path)?;
            io::copy(&mut reader, &mut file)?;
            file.flush()?;
            paths.push(path);
        }
        Ok(StagedPackages { _dir: dir, paths })
    }

    /// The staged file paths, in input order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
            c
        } else {
            '_'
        })
        .collect();
    if cleaned.is_empty() {
        "package".to_string()
    } else {
        cleaned
    }
}
