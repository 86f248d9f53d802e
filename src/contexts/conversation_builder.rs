use crate::data::{ComponentName, Conversation, ConversationTurn};
use crate::registries::{PromptName, PromptRegistry, RegistryError, WorkedExample};

/// Placeholder in prompts that is replaced with the derived component name.
pub const COMPONENT_NAME_PLACEHOLDER: &str = "{COMPONENT_NAME}";

/// Every prompt text a run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub component_system: String,
    pub component_template: String,
    pub unit_test: String,
    pub review: String,
    pub fix: String,
    pub fix_test: String,
    pub examples: Vec<WorkedExample>,
}

impl PromptSet {
    /// Resolves all prompts from `registry`. Fails if `examples` is empty.
    pub fn load(
        registry: &impl PromptRegistry,
        examples: Vec<WorkedExample>,
    ) -> Result<Self, RegistryError> {
        if examples.is_empty() {
            return Err(RegistryError::NoExamples);
        }

        Ok(Self {
            component_system: registry.get_prompt(PromptName::ComponentSystem)?,
            component_template: registry.get_prompt(PromptName::ComponentTemplate)?,
            unit_test: registry.get_prompt(PromptName::UnitTest)?,
            review: registry.get_prompt(PromptName::Review)?,
            fix: registry.get_prompt(PromptName::Fix)?,
            fix_test: registry.get_prompt(PromptName::FixTest)?,
            examples,
        })
    }

    /// Preamble, worked examples and response template, in that order.
    pub fn system_context(&self) -> String {
        let mut context = self.component_system.clone();
        for example in &self.examples {
            context.push('\n');
            context.push_str(&format!(
                "# Example component\n{}\n```\n{}\n```\n",
                example.description, example.source
            ));
        }
        context.push('\n');
        context.push_str(&self.component_template);
        context
    }
}

/// Builds the two-turn generation conversation.
pub fn build(system_context: &str, user_description: &str) -> Conversation {
    let mut conversation = Conversation::new(system_context);
    conversation.push_user(user_description);
    conversation
}

/// Extends `base` with the generated component and a request for its unit test.
pub fn with_test_request(base: &Conversation, component_code: &str, unit_test_prompt: &str) -> Conversation {
    base.extended([
        ConversationTurn::assistant(component_code),
        ConversationTurn::user(fill_component_name(unit_test_prompt, component_code)),
    ])
}

/// Replaces the component name placeholder when the name can be derived.
///
/// Malformed sources keep the placeholder; persistence reports the problem.
pub fn fill_component_name(prompt: &str, component_code: &str) -> String {
    match ComponentName::from_source(component_code) {
        Ok(name) => prompt.replace(COMPONENT_NAME_PLACEHOLDER, name.as_str()),
        Err(_) => prompt.to_string(),
    }
}

/// Frame the reviewer sees for a single component.
pub fn review_frame(description: &str, code: &str) -> String {
    format!(
        "Component request: {}\nGenerated component:\n```\n{}\n```\n",
        description, code
    )
}

/// Frame the reviewer sees when scoring several candidates at once.
///
/// Candidates are numbered from 1; the number is the `snippet_name` the
/// reviewer is asked to report.
pub fn candidates_frame(description: &str, candidates: &[String]) -> String {
    let mut frame = format!("Component request: {}\n", description);
    for (idx, code) in candidates.iter().enumerate() {
        frame.push_str(&format!("Snippet {}:\n```\n{}\n```\n", idx + 1, code));
    }
    frame
}

/// Independent single-exchange review conversation.
pub fn build_review(review_prompt: &str, frame: String) -> Conversation {
    let mut conversation = Conversation::new(review_prompt);
    conversation.push_user(frame);
    conversation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;
    use crate::prompts;

    fn prompt_set() -> PromptSet {
        PromptSet {
            component_system: "PREAMBLE".to_string(),
            component_template: "TEMPLATE".to_string(),
            unit_test: prompts::UNIT_TEST_PROMPT.to_string(),
            review: "REVIEW".to_string(),
            fix: prompts::FIX_PROMPT.to_string(),
            fix_test: prompts::FIX_TEST_PROMPT.to_string(),
            examples: vec![WorkedExample {
                description: "Validate a CSV".to_string(),
                source: "def validate_csv():\n    pass".to_string(),
            }],
        }
    }

    #[test]
    fn test_system_context_order() {
        let context = prompt_set().system_context();

        let preamble = context.find("PREAMBLE").unwrap();
        let example = context.find("# Example component\nValidate a CSV\n```\ndef validate_csv()").unwrap();
        let template = context.find("TEMPLATE").unwrap();
        assert!(preamble < example && example < template);
    }

    #[test]
    fn test_build_two_turns() {
        let conversation = build("SYSTEM", "Write a component");
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].role, Role::System);
        assert_eq!(conversation.turns()[1].role, Role::User);
        assert_eq!(conversation.turns()[1].content, "Write a component");
    }

    #[test]
    fn test_test_request_names_component() {
        let base = build("SYSTEM", "Write a component");
        let code = "def ingest_csv(path: str):\n    pass\n";
        let extended = with_test_request(&base, code, prompts::UNIT_TEST_PROMPT);

        assert_eq!(base.len(), 2);
        assert_eq!(extended.len(), 4);
        assert_eq!(extended.turns()[2].role, Role::Assistant);
        assert_eq!(extended.turns()[2].content, code);
        assert!(extended.turns()[3]
            .content
            .contains("from lib.component.ingest_csv import ingest_csv"));
    }

    #[test]
    fn test_placeholder_kept_when_name_unknown() {
        let filled = fill_component_name(prompts::UNIT_TEST_PROMPT, "no function here");
        assert!(filled.contains(COMPONENT_NAME_PLACEHOLDER));
    }

    #[test]
    fn test_review_frame_shape() {
        assert_eq!(
            review_frame("desc", "code"),
            "Component request: desc\nGenerated component:\n```\ncode\n```\n"
        );
    }

    #[test]
    fn test_candidates_frame_numbers_from_one() {
        let frame = candidates_frame("desc", &["a = 1".to_string(), "b = 2".to_string()]);
        assert!(frame.starts_with("Component request: desc\n"));
        assert!(frame.contains("Snippet 1:\n```\na = 1\n```\n"));
        assert!(frame.contains("Snippet 2:\n```\nb = 2\n```\n"));
    }

    #[test]
    fn test_empty_examples_rejected() {
        struct Builtins;
        impl PromptRegistry for Builtins {
            fn get_prompt(&self, name: PromptName) -> Result<String, RegistryError> {
                Ok(name.builtin().to_string())
            }
        }

        assert!(matches!(
            PromptSet::load(&Builtins, Vec::new()),
            Err(RegistryError::NoExamples)
        ));
    }
}
