use super::RegistryError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Default sampling temperature for code generation (diversity).
pub const DEFAULT_GENERATION_TEMPERATURE: f32 = 0.7;
/// Default sampling temperature for review (consistent scoring).
pub const DEFAULT_REVIEW_TEMPERATURE: f32 = 0.2;

/// The two model instances the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Generation,
    Review,
}

impl ModelRole {
    pub fn key(&self) -> &'static str {
        match self {
            ModelRole::Generation => "generation",
            ModelRole::Review => "review",
        }
    }

    fn default_temperature(&self) -> f32 {
        match self {
            ModelRole::Generation => DEFAULT_GENERATION_TEMPERATURE,
            ModelRole::Review => DEFAULT_REVIEW_TEMPERATURE,
        }
    }
}

/// Model name and temperature for one role
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
}

/// File-based role → model mapping
/// Loads role-to-model mappings from a YAML file
#[derive(Clone, Debug)]
pub struct FileModelRegistry {
    registry_path: PathBuf,
    default_model: String,
}

impl FileModelRegistry {
    /// Creates a new FileModelRegistry
    ///
    /// # Arguments
    /// * `registry_path` - Optional path to registry file (defaults to "prompts/model_registry.yml")
    /// * `default_model` - Model to use for roles missing from the registry
    pub fn new(registry_path: Option<PathBuf>, default_model: impl Into<String>) -> Self {
        Self {
            registry_path: registry_path
                .unwrap_or_else(|| PathBuf::from("prompts/model_registry.yml")),
            default_model: default_model.into(),
        }
    }

    fn load_registry(&self) -> Result<HashMap<String, ModelConfig>, RegistryError> {
        if !self.registry_path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.registry_path).map_err(|e| {
            RegistryError::InvalidModelRegistry(format!(
                "Failed to read model registry {}: {}",
                self.registry_path.display(),
                e
            ))
        })?;

        parse_registry(&content, &self.default_model)
    }

    /// Resolves the model settings for `role`
    pub fn get_model(&self, role: ModelRole) -> Result<ModelConfig, RegistryError> {
        let registry = self.load_registry()?;

        Ok(registry.get(role.key()).cloned().unwrap_or_else(|| ModelConfig {
            model: self.default_model.clone(),
            temperature: role.default_temperature(),
        }))
    }
}

/// Parses the YAML registry file into a HashMap
/// Supports both a bare model name and an object with model and temperature
fn parse_registry(
    yaml_content: &str,
    default_model: &str,
) -> Result<HashMap<String, ModelConfig>, RegistryError> {
    use yaml_rust::{Yaml, YamlLoader};

    let docs = YamlLoader::load_from_str(yaml_content)
        .map_err(|e| RegistryError::InvalidModelRegistry(format!("Invalid registry YAML: {}", e)))?;

    if docs.is_empty() {
        return Ok(HashMap::new());
    }

    let doc = &docs[0];
    let mut registry = HashMap::new();

    let Some(hash) = doc.as_hash() else {
        return Ok(registry);
    };

    for (key, value) in hash {
        let Some(k) = key.as_str() else {
            continue;
        };
        let default_temperature = match k {
            "review" => DEFAULT_REVIEW_TEMPERATURE,
            _ => DEFAULT_GENERATION_TEMPERATURE,
        };

        let config = if let Some(v_str) = value.as_str() {
            ModelConfig {
                model: v_str.to_string(),
                temperature: default_temperature,
            }
        } else if let Some(v_hash) = value.as_hash() {
            let model = v_hash
                .get(&Yaml::String("model".to_string()))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| default_model.to_string());

            let temperature = match v_hash.get(&Yaml::String("temperature".to_string())) {
                Some(Yaml::Real(raw)) => raw.parse::<f32>().map_err(|e| {
                    RegistryError::InvalidModelRegistry(format!(
                        "Invalid temperature for '{}': {}",
                        k, e
                    ))
                })?,
                Some(Yaml::Integer(i)) => *i as f32,
                _ => default_temperature,
            };

            if !(0.0..=2.0).contains(&temperature) {
                return Err(RegistryError::InvalidModelRegistry(format!(
                    "Temperature for '{}' must be between 0 and 2, got {}",
                    k, temperature
                )));
            }

            ModelConfig { model, temperature }
        } else {
            ModelConfig {
                model: default_model.to_string(),
                temperature: default_temperature,
            }
        };

        registry.insert(k.to_string(), config);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_old_format() {
        let yaml = r#"
generation: gpt-4
review: gpt-3.5-turbo
"#;

        let result = parse_registry(yaml, "default");
        assert!(result.is_ok());

        let registry = result.unwrap();
        assert_eq!(registry["generation"].model, "gpt-4");
        assert_eq!(registry["generation"].temperature, DEFAULT_GENERATION_TEMPERATURE);
        assert_eq!(registry["review"].model, "gpt-3.5-turbo");
        assert_eq!(registry["review"].temperature, DEFAULT_REVIEW_TEMPERATURE);
    }

    #[test]
    fn test_parse_registry_new_format() {
        let yaml = r#"
generation:
  model: gpt-4o
  temperature: 0.9
review:
  temperature: 0
"#;

        let registry = parse_registry(yaml, "default").unwrap();
        assert_eq!(registry["generation"].model, "gpt-4o");
        assert_eq!(registry["generation"].temperature, 0.9);
        assert_eq!(registry["review"].model, "default");
        assert_eq!(registry["review"].temperature, 0.0);
    }

    #[test]
    fn test_parse_registry_rejects_out_of_range_temperature() {
        let yaml = r#"
generation:
  model: gpt-4o
  temperature: 7.5
"#;
        assert!(parse_registry(yaml, "default").is_err());
    }

    #[test]
    fn test_parse_empty_registry() {
        let result = parse_registry("", "default");
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_missing_registry_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            FileModelRegistry::new(Some(dir.path().join("missing.yml")), "gpt-3.5-turbo");

        let generation = registry.get_model(ModelRole::Generation).unwrap();
        let review = registry.get_model(ModelRole::Review).unwrap();
        assert_eq!(generation.model, "gpt-3.5-turbo");
        assert_eq!(generation.temperature, DEFAULT_GENERATION_TEMPERATURE);
        assert_eq!(review.temperature, DEFAULT_REVIEW_TEMPERATURE);
    }
}
