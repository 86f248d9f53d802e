use serde::{Deserialize, Serialize};

/// Text returned in place of generated code when the description is empty.
pub const EMPTY_INPUT_PLACEHOLDER: &str =
    "No input description... \n Recommend trying one of the examples!";

/// A free-text component description supplied by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    pub also_generate_test: bool,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>, also_generate_test: bool) -> Self {
        Self {
            description: description.into(),
            also_generate_test,
        }
    }

    /// Empty descriptions skip generation entirely. Whitespace still counts
    /// as input.
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
    }
}

/// Outcome of one generation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub component_code: String,
    pub test_code: Option<String>,
    pub review_summary: String,
}

impl GenerationResult {
    /// The fixed result returned for an empty description.
    pub fn placeholder() -> Self {
        Self {
            component_code: EMPTY_INPUT_PLACEHOLDER.to_string(),
            test_code: None,
            review_summary: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.component_code == EMPTY_INPUT_PLACEHOLDER
            && self.test_code.is_none()
            && self.review_summary.is_empty()
    }
}

/// One scored candidate from a review reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub snippet_name: String,
    pub accuracy_score: u8,
    pub accuracy_summary: String,
}

/// Pass/fail reading of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestVerdict {
    Passed,
    /// Non-zero exit with a recognisable runner summary.
    Failed,
    /// Non-zero exit and no summary delimiter in the output.
    Broken,
}

/// Captured result of running a persisted test artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExecutionReport {
    pub summary: String,
    pub full_output: String,
    pub exit_code: Option<i32>,
    pub summary_found: bool,
}

impl TestExecutionReport {
    pub fn verdict(&self) -> TestVerdict {
        match (self.exit_code, self.summary_found) {
            (Some(0), _) => TestVerdict::Passed,
            (_, true) => TestVerdict::Failed,
            (_, false) => TestVerdict::Broken,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict() == TestVerdict::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(exit_code: Option<i32>, summary_found: bool) -> TestExecutionReport {
        TestExecutionReport {
            summary: String::new(),
            full_output: "output".to_string(),
            exit_code,
            summary_found,
        }
    }

    #[test]
    fn test_placeholder_is_recognised() {
        assert!(GenerationResult::placeholder().is_placeholder());

        let real = GenerationResult {
            component_code: "def foo():\n    pass\n".to_string(),
            test_code: None,
            review_summary: String::new(),
        };
        assert!(!real.is_placeholder());
    }

    #[test]
    fn test_only_the_empty_description_is_empty() {
        assert!(GenerationRequest::new("", true).is_empty());
        assert!(!GenerationRequest::new("  \n", true).is_empty());
        assert!(!GenerationRequest::new("Write a component", true).is_empty());
    }

    #[test]
    fn test_verdict_from_exit_code_and_summary() {
        assert_eq!(report(Some(0), true).verdict(), TestVerdict::Passed);
        assert_eq!(report(Some(0), false).verdict(), TestVerdict::Passed);
        assert_eq!(report(Some(1), true).verdict(), TestVerdict::Failed);
        assert_eq!(report(Some(2), false).verdict(), TestVerdict::Broken);
        assert_eq!(report(None, false).verdict(), TestVerdict::Broken);
    }
}
