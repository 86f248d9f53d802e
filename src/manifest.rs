//! Artifact manifest
//!
//! Stores content hashes of every persisted component/test pair in the state
//! directory, so later commands can tell when a human edited the files.

use crate::data::{Artifact, ComponentName};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to access manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Record of one persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub component_hash: String,
    pub test_hash: Option<String>,
    /// RFC 3339 timestamp of the persist
    pub persisted_at: String,
    pub description: Option<String>,
}

/// Whether the files on disk still match what was persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditStatus {
    pub component_edited: bool,
    pub test_edited: bool,
}

impl EditStatus {
    pub fn any(&self) -> bool {
        self.component_edited || self.test_edited
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip)]
    path: PathBuf,
    /// Maps: component name -> last persist
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest from `state_dir`, or start an empty one
    pub fn load(state_dir: &Path) -> Result<Self, ManifestError> {
        let path = state_dir.join(MANIFEST_FILE);

        let mut manifest = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Manifest>(&content).map_err(|source| {
                ManifestError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Manifest::default(),
            Err(source) => return Err(ManifestError::Io { path, source }),
        };
        manifest.path = path;
        Ok(manifest)
    }

    /// Save the manifest to disk
    pub fn save(&self) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ManifestError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, content).map_err(io_err)
    }

    /// Record a persist, replacing any earlier record for the same name
    pub fn record(
        &mut self,
        name: &ComponentName,
        component_code: &str,
        test_code: Option<&str>,
        description: Option<&str>,
    ) {
        self.entries.insert(
            name.to_string(),
            ManifestEntry {
                component_hash: hash_content(component_code),
                test_hash: test_code.map(hash_content),
                persisted_at: chrono::Utc::now().to_rfc3339(),
                description: description.map(str::to_string),
            },
        );
    }

    pub fn entry(&self, name: &ComponentName) -> Option<&ManifestEntry> {
        self.entries.get(name.as_str())
    }

    /// Description the artifact was generated from, when known
    pub fn description(&self, name: &ComponentName) -> Option<&str> {
        self.entry(name).and_then(|entry| entry.description.as_deref())
    }

    /// Compares `artifact` as loaded from disk with its last persist.
    /// Returns `None` for artifacts the manifest has never seen.
    pub fn edit_status(&self, artifact: &Artifact) -> Option<EditStatus> {
        let entry = self.entry(&artifact.name)?;
        Some(EditStatus {
            component_edited: hash_content(&artifact.component_code) != entry.component_hash,
            test_edited: artifact.test_code.as_deref().map(hash_content) != entry.test_hash,
        })
    }
}

/// Compute SHA256 hash of text content
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(component: &str, test: Option<&str>) -> Artifact {
        Artifact {
            name: ComponentName::parse("ingest_csv").unwrap(),
            component_code: component.to_string(),
            test_code: test.map(str::to_string),
        }
    }

    #[test]
    fn test_hash_content() {
        assert_eq!(hash_content("hello world"), hash_content("hello world"));
        assert_ne!(hash_content("hello world"), hash_content("different"));
        assert_eq!(hash_content("").len(), 64);
    }

    #[test]
    fn test_record_save_and_load() {
        let dir = TempDir::new().unwrap();
        let name = ComponentName::parse("ingest_csv").unwrap();

        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.record(&name, "def ingest_csv(): pass", Some("def test_x(): pass"), Some("Ingest a CSV"));
        manifest.save().unwrap();

        let reloaded = Manifest::load(dir.path()).unwrap();
        let entry = reloaded.entry(&name).unwrap();
        assert_eq!(entry.description.as_deref(), Some("Ingest a CSV"));
        assert!(entry.test_hash.is_some());
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.persisted_at).is_ok());
    }

    #[test]
    fn test_edit_status() {
        let name = ComponentName::parse("ingest_csv").unwrap();
        let mut manifest = Manifest::default();
        manifest.record(&name, "def ingest_csv(): pass", None, None);

        let untouched = manifest.edit_status(&artifact("def ingest_csv(): pass", None)).unwrap();
        assert!(!untouched.any());

        let edited = manifest
            .edit_status(&artifact("def ingest_csv(): return 1", Some("def test(): pass")))
            .unwrap();
        assert!(edited.component_edited);
        assert!(edited.test_edited);
    }

    #[test]
    fn test_unknown_artifact_has_no_status() {
        let manifest = Manifest::default();
        assert_eq!(manifest.edit_status(&artifact("def ingest_csv(): pass", None)), None);
    }

    #[test]
    fn test_corrupt_manifest_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(matches!(Manifest::load(dir.path()), Err(ManifestError::Corrupt { .. })));
    }
}
