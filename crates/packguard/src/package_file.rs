//! The JSON package descriptor format served to the engine.
//!
//! A descriptor mirrors the opened-archive shape: identity, manifest,
//! properties snapshot, content entries, declared hooks, and nested
//! descriptors. This is the CLI's container format; the engine itself only
//! sees [`PackageArchive`]s through the opener.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use packguard_core::archive::{ArchiveEntry, ArchiveError, ArchiveOpener, HookSpec, PackageArchive};
use packguard_types::{Manifest, PackageId, PropertySnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub id: String,

    #[serde(default = "default_valid")]
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,

    #[serde(default, skip_serializing_if = "PropertySnapshot::is_empty")]
    pub properties: PropertySnapshot,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subpackages: Vec<PackageDescriptor>,
}

fn default_valid() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EntryDescriptor {
    #[serde(rename_all = "camelCase")]
    Put {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_type: Option<String>,
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        properties: serde_json::Map<String, serde_json::Value>,
    },
    Delete { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDescriptor {
    pub name: String,
    #[serde(default = "default_valid")]
    pub loadable: bool,
}

impl PackageDescriptor {
    pub fn into_archive(self) -> PackageArchive {
        PackageArchive {
            id: PackageId::new(self.id),
            valid: self.valid,
            manifest: self.manifest,
            properties: self.properties,
            entries: self
                .entries
                .into_iter()
                .map(|entry| match entry {
                    EntryDescriptor::Put {
                        path,
                        primary_type,
                        properties,
                    } => ArchiveEntry::Put {
                        path,
                        primary_type,
                        properties,
                    },
                    EntryDescriptor::Delete { path } => ArchiveEntry::Delete { path },
                })
                .collect(),
            hooks: self
                .hooks
                .into_iter()
                .map(|hook| HookSpec {
                    name: hook.name,
                    loadable: hook.loadable,
                })
                .collect(),
            subpackages: self
                .subpackages
                .into_iter()
                .map(PackageDescriptor::into_archive)
                .collect(),
        }
    }
}

/// Opens JSON package descriptors from the filesystem.
#[derive(Debug, Default)]
pub struct JsonArchiveOpener;

impl ArchiveOpener for JsonArchiveOpener {
    fn open(&self, source: &Path) -> Result<PackageArchive, ArchiveError> {
        let file = File::open(source).map_err(|error| ArchiveError::Io {
            path: source.to_path_buf(),
            source: error,
        })?;
        let descriptor: PackageDescriptor = serde_json::from_reader(BufReader::new(file))
            .map_err(|error| ArchiveError::Malformed {
                path: source.to_path_buf(),
                source: error,
            })?;
        Ok(descriptor.into_archive())
    }
}
