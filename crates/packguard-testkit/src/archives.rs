//! Fluent builder for canned package archives, plus an opener that serves
//! them by source path without touching the filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use packguard_core::archive::{ArchiveEntry, ArchiveError, ArchiveOpener, HookSpec, PackageArchive};

/// Builds one [`PackageArchive`], nested subpackages included.
#[derive(Debug)]
pub struct ArchiveBuilder {
    archive: PackageArchive,
}

impl ArchiveBuilder {
    pub fn new(id: &str) -> Self {
        ArchiveBuilder {
            archive: PackageArchive::new(id),
        }
    }

    /// Mark the archive structurally broken; processing it fails.
    pub fn invalid(mut self) -> Self {
        self.archive.valid = false;
        self
    }

    pub fn manifest_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        self.archive
            .manifest
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.archive.properties.insert(key.to_string(), value);
        self
    }

    pub fn put(self, path: &str) -> Self {
        self.put_typed(path, None)
    }

    pub fn put_typed(mut self, path: &str, primary_type: Option<&str>) -> Self {
        self.archive.entries.push(ArchiveEntry::Put {
            path: path.to_string(),
            primary_type: primary_type.map(str::to_string),
            properties: serde_json::Map::new(),
        });
        self
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.archive.entries.push(ArchiveEntry::Delete {
            path: path.to_string(),
        });
        self
    }

    pub fn hook(mut self, name: &str, loadable: bool) -> Self {
        self.archive.hooks.push(HookSpec {
            name: name.to_string(),
            loadable,
        });
        self
    }

    pub fn subpackage(mut self, subpackage: PackageArchive) -> Self {
        self.archive.subpackages.push(subpackage);
        self
    }

    pub fn build(self) -> PackageArchive {
        self.archive
    }
}

/// Serves canned archives for known paths; unknown paths fail to open.
#[derive(Debug, Default)]
pub struct FixtureOpener {
    archives: BTreeMap<PathBuf, PackageArchive>,
}

impl FixtureOpener {
    pub fn new() -> Self {
        FixtureOpener::default()
    }

    pub fn with_archive(mut self, source: &str, archive: PackageArchive) -> Self {
        self.archives.insert(PathBuf::from(source), archive);
        self
    }

    /// The registered source paths, in insertion-independent sorted order.
    pub fn sources(&self) -> Vec<PathBuf> {
        self.archives.keys().cloned().collect()
    }
}

impl ArchiveOpener for FixtureOpener {
    fn open(&self, source: &Path) -> Result<PackageArchive, ArchiveError> {
        self.archives
            .get(source)
            .cloned()
            .ok_or_else(|| ArchiveError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such fixture"),
            })
    }
}

/// A small valid package touching two content paths.
pub fn simple_package(id: &str) -> PackageArchive {
    ArchiveBuilder::new(id)
        .property("name", serde_json::json!(id))
        .put("/content/a")
        .put("/content/a/b")
        .build()
}
