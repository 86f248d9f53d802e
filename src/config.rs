//! Runtime settings
//!
//! Read from an optional `compgen.yml` in the working directory. Secrets stay
//! in the environment (a `.env` file is loaded by the binary).

use crate::registries::ExampleSpec;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SETTINGS_FILE: &str = "compgen.yml";
pub const MODEL_NAME_ENV: &str = "MODEL_NAME";
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory the component and test files are written to
    pub artifact_root: PathBuf,
    /// Manifest, review prompt override and fix logs live here
    pub state_dir: PathBuf,
    /// Prompt override files and the model registry
    pub prompts_dir: PathBuf,
    pub test_runner: String,
    pub test_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub api_base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Model used when the model registry names none; falls back to `MODEL_NAME`
    pub default_model: Option<String>,
    pub max_fix_attempts: usize,
    pub examples: Vec<ExampleSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from("lib/component"),
            state_dir: PathBuf::from(".compgen"),
            prompts_dir: PathBuf::from("prompts"),
            test_runner: "pytest".to_string(),
            test_timeout_secs: 300,
            model_timeout_secs: 120,
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            default_model: None,
            max_fix_attempts: 3,
            examples: vec![ExampleSpec::default()],
        }
    }
}

impl Settings {
    /// Loads `path`, or `compgen.yml` when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(SETTINGS_FILE), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let settings = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<Settings>(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_timeout_secs == 0 || self.model_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".to_string()));
        }
        if self.max_fix_attempts == 0 {
            return Err(ConfigError::Invalid("max_fix_attempts must be at least 1".to_string()));
        }
        if self.examples.is_empty() {
            return Err(ConfigError::Invalid("at least one example component is required".to_string()));
        }
        if self.test_runner.trim().is_empty() {
            return Err(ConfigError::Invalid("test_runner must not be empty".to_string()));
        }
        Ok(())
    }

    /// Configured model, then `MODEL_NAME`, then the fallback.
    pub fn model_name(&self) -> String {
        self.default_model
            .clone()
            .or_else(|| env::var(MODEL_NAME_ENV).ok().filter(|name| !name.trim().is_empty()))
            .unwrap_or_else(|| FALLBACK_MODEL.to_string())
    }

    pub fn api_key(&self) -> Result<String, ConfigError> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn review_prompt_path(&self) -> PathBuf {
        self.state_dir.join("review_prompt.txt")
    }

    pub fn fixes_dir(&self) -> PathBuf {
        self.state_dir.join("fixes")
    }

    pub fn model_registry_path(&self) -> PathBuf {
        self.prompts_dir.join("model_registry.yml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("compgen.yml");
        assert!(matches!(Settings::load(Some(&missing)), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compgen.yml");
        fs::write(&path, "test_runner: py.test\ntest_timeout_secs: 30\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.test_runner, "py.test");
        assert_eq!(settings.test_timeout(), Duration::from_secs(30));
        assert_eq!(settings.artifact_root, PathBuf::from("lib/component"));
        assert_eq!(settings.examples.len(), 1);
    }

    #[test]
    fn test_examples_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compgen.yml");
        fs::write(
            &path,
            "examples:\n  - description: Train a model\n    path: assets/train.py\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.examples[0].description, "Train a model");
        assert_eq!(settings.examples[0].path, PathBuf::from("assets/train.py"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compgen.yml");
        fs::write(&path, "test_runer: pytest\n").unwrap();
        assert!(matches!(Settings::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compgen.yml");
        fs::write(&path, "model_timeout_secs: 0\n").unwrap();
        assert!(matches!(Settings::load(Some(&path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_configured_model_wins() {
        let settings = Settings {
            default_model: Some("gpt-4o".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.model_name(), "gpt-4o");
    }

    #[test]
    fn test_missing_api_key() {
        let settings = Settings {
            api_key_env: "COMPGEN_TEST_UNSET_API_KEY".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.api_key(), Err(ConfigError::MissingApiKey(var)) if var == "COMPGEN_TEST_UNSET_API_KEY"));
    }
}
