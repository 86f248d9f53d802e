use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while resolving prompts, examples or model settings
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Prompt specification is invalid: {0}")]
    InvalidSpecification(String),

    #[error("Worked example '{}' could not be loaded: {reason}", path.display())]
    ExampleUnavailable { path: PathBuf, reason: String },

    #[error("No worked examples configured; at least one is required")]
    NoExamples,

    #[error("Invalid model registry: {0}")]
    InvalidModelRegistry(String),
}

/// Prompt texts the engine asks for by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptName {
    ComponentSystem,
    ComponentTemplate,
    UnitTest,
    Review,
    Fix,
    FixTest,
}

impl PromptName {
    /// File stem of the override file under the prompts directory.
    pub fn file_stem(&self) -> &'static str {
        match self {
            PromptName::ComponentSystem => "component_system",
            PromptName::ComponentTemplate => "component_template",
            PromptName::UnitTest => "unit_test",
            PromptName::Review => "review",
            PromptName::Fix => "fix",
            PromptName::FixTest => "fix_test",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            PromptName::ComponentSystem => prompts::COMPONENT_SYSTEM_PROMPT,
            PromptName::ComponentTemplate => prompts::COMPONENT_TEMPLATE_PROMPT,
            PromptName::UnitTest => prompts::UNIT_TEST_PROMPT,
            PromptName::Review => prompts::REVIEW_PROMPT,
            PromptName::Fix => prompts::FIX_PROMPT,
            PromptName::FixTest => prompts::FIX_TEST_PROMPT,
        }
    }
}

/// Trait for loading prompt texts by name
pub trait PromptRegistry {
    fn get_prompt(&self, name: PromptName) -> Result<String, RegistryError>;
}

/// Where a worked example lives and what it was asked to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSpec {
    pub description: String,
    pub path: PathBuf,
}

impl Default for ExampleSpec {
    fn default() -> Self {
        Self {
            description: prompts::DEFAULT_EXAMPLE_DESCRIPTION.to_string(),
            path: PathBuf::from(prompts::DEFAULT_EXAMPLE_PATH),
        }
    }
}

/// A sample component embedded verbatim into the system turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkedExample {
    pub description: String,
    pub source: String,
}

/// File-based implementation of PromptRegistry
///
/// Looks for `{prompts_dir}/{name}.yml` with a `system_prompt` field and falls
/// back to the built-in text. The review prompt may additionally be pinned by a
/// plain-text override file written by `compgen review-prompt set`.
#[derive(Clone, Debug)]
pub struct FilePromptRegistry {
    prompts_dir: PathBuf,
    review_override: Option<PathBuf>,
}

impl FilePromptRegistry {
    /// Creates a new FilePromptRegistry
    ///
    /// # Arguments
    /// * `prompts_dir` - Optional path to prompts directory (defaults to "prompts")
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.unwrap_or_else(|| PathBuf::from("prompts")),
            review_override: None,
        }
    }

    pub fn with_review_override(mut self, path: PathBuf) -> Self {
        self.review_override = Some(path);
        self
    }

    fn read_override(&self, name: PromptName) -> Result<Option<String>, RegistryError> {
        if name == PromptName::Review
            && let Some(path) = &self.review_override
            && path.exists()
        {
            let text = fs::read_to_string(path).map_err(|e| {
                RegistryError::InvalidSpecification(format!(
                    "Failed to read review prompt override {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(path = %path.display(), "using review prompt override");
            return Ok(Some(text));
        }

        let prompt_path = self.prompts_dir.join(format!("{}.yml", name.file_stem()));
        if !prompt_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&prompt_path).map_err(|e| {
            RegistryError::InvalidSpecification(format!(
                "Failed to read prompt specification {}: {}",
                prompt_path.display(),
                e
            ))
        })?;
        debug!(path = %prompt_path.display(), "using prompt override");
        extract_system_prompt(&content).map(Some)
    }
}

impl PromptRegistry for FilePromptRegistry {
    fn get_prompt(&self, name: PromptName) -> Result<String, RegistryError> {
        Ok(self
            .read_override(name)?
            .unwrap_or_else(|| name.builtin().to_string()))
    }
}

/// Extracts the system_prompt field from a YAML prompt specification
fn extract_system_prompt(yaml_content: &str) -> Result<String, RegistryError> {
    use yaml_rust::YamlLoader;

    let docs = YamlLoader::load_from_str(yaml_content)
        .map_err(|e| RegistryError::InvalidSpecification(format!("Invalid YAML: {}", e)))?;

    if docs.is_empty() {
        return Err(RegistryError::InvalidSpecification(
            "Empty YAML document".to_string(),
        ));
    }

    let doc = &docs[0];

    if let Some(system_prompt) = doc["system_prompt"].as_str() {
        Ok(system_prompt.to_string())
    } else {
        Err(RegistryError::InvalidSpecification(
            "No system_prompt field found in prompt specification".to_string(),
        ))
    }
}

/// Reads every configured worked example.
///
/// Examples are part of every generation system turn, so a missing file is an
/// error at startup rather than halfway through a conversation.
pub fn load_examples(root: &Path, specs: &[ExampleSpec]) -> Result<Vec<WorkedExample>, RegistryError> {
    if specs.is_empty() {
        return Err(RegistryError::NoExamples);
    }

    specs
        .iter()
        .map(|spec| {
            let path = root.join(&spec.path);
            let source = fs::read_to_string(&path).map_err(|e| RegistryError::ExampleUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(WorkedExample {
                description: spec.description.clone(),
                source,
            })
        })
        .collect()
}
