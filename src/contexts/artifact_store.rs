use crate::data::{ARTIFACT_EXTENSION, Artifact, ArtifactKind, ComponentName, MalformedComponentSource, TEST_PREFIX};
use crate::manifest::ManifestError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while persisting or loading artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    MalformedComponentSource(#[from] MalformedComponentSource),

    #[error("no persisted component named '{0}'")]
    ArtifactNotFound(ComponentName),

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The files were written; only the manifest record is missing.
    #[error("persisted '{name}' but could not update the manifest: {source}")]
    ManifestNotUpdated {
        name: ComponentName,
        #[source]
        source: ManifestError,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// ArtifactStore keeps generated component/test pairs as plain files.
///
/// The layout is `{root}/{name}.py` and `{root}/test_{name}.py`, which is
/// also what the generated tests import from.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a new ArtifactStore
    ///
    /// # Arguments
    /// * `root` - Directory holding the artifact files. Created on first persist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn component_path(&self, name: &ComponentName) -> PathBuf {
        self.root.join(name.component_file_name())
    }

    pub fn test_path(&self, name: &ComponentName) -> PathBuf {
        self.root.join(name.test_file_name())
    }

    /// Writes the component, and its test when given, under the name derived
    /// from the component source.
    ///
    /// Existing files are replaced. Persisting without a test removes any test
    /// left from an earlier persist so the pair on disk stays consistent.
    pub fn persist(
        &self,
        component_code: &str,
        test_code: Option<&str>,
    ) -> Result<ComponentName, ArtifactError> {
        let name = ComponentName::from_source(component_code)?;

        fs::create_dir_all(&self.root).map_err(|e| ArtifactError::io(&self.root, e))?;

        let component_path = self.component_path(&name);
        fs::write(&component_path, component_code).map_err(|e| ArtifactError::io(&component_path, e))?;

        let test_path = self.test_path(&name);
        match test_code {
            Some(test_code) => {
                fs::write(&test_path, test_code).map_err(|e| ArtifactError::io(&test_path, e))?;
            }
            None => match fs::remove_file(&test_path) {
                Ok(()) => debug!("removed stale test {:?}", test_path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ArtifactError::io(&test_path, e)),
            },
        }

        debug!("persisted component '{}' to {:?}", name, component_path);
        Ok(name)
    }

    /// Re-reads a persisted pair. A missing test file yields `test_code: None`.
    pub fn load(&self, name: &ComponentName) -> Result<Artifact, ArtifactError> {
        let component_path = self.component_path(name);
        let component_code = match fs::read_to_string(&component_path) {
            Ok(code) => code,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::ArtifactNotFound(name.clone()));
            }
            Err(e) => return Err(ArtifactError::io(&component_path, e)),
        };

        let test_path = self.test_path(name);
        let test_code = match fs::read_to_string(&test_path) {
            Ok(code) => Some(code),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(ArtifactError::io(&test_path, e)),
        };

        Ok(Artifact {
            name: name.clone(),
            component_code,
            test_code,
        })
    }

    /// Lists persisted file stems of one kind, sorted.
    ///
    /// Components are reported by name; tests keep their `test_` prefix.
    /// A missing root is an empty store.
    pub fn list_available(&self, kind: ArtifactKind) -> Result<Vec<String>, ArtifactError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArtifactError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ArtifactError::io(&self.root, e))?.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let is_test = stem.starts_with(TEST_PREFIX);
            let wanted = match kind {
                ArtifactKind::Component => !is_test && ComponentName::parse(stem).is_ok(),
                ArtifactKind::Test => is_test,
            };
            if wanted {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
