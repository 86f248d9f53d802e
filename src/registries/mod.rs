mod model_registry;
mod prompt_registry;

pub use model_registry::{
    DEFAULT_GENERATION_TEMPERATURE, DEFAULT_REVIEW_TEMPERATURE, FileModelRegistry, ModelConfig,
    ModelRole,
};
pub use prompt_registry::{
    ExampleSpec, FilePromptRegistry, PromptName, PromptRegistry, RegistryError, WorkedExample,
    load_examples,
};
