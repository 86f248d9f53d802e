use super::conversation_builder::{self, PromptSet, fill_component_name};
use super::extractor::{Extraction, extract, strip_leaked_language_tag};
use super::model::{ModelError, ModelHandle};
use super::review_session::{MalformedReviewOutput, ReviewSession, best_candidate, parse_review_records};
use crate::data::{Artifact, ConversationTurn, GenerationResult, ReviewRecord};
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest tail of test output replayed to the model when asking for a fix.
pub const MAX_FIX_OUTPUT_CHARS: usize = 6000;

/// Which model call of a generation cycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Component,
    Test,
    Review,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            GenerationStage::Component => "component",
            GenerationStage::Test => "test",
            GenerationStage::Review => "review",
        };
        f.write_str(name)
    }
}

/// Whatever a cycle produced before it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialGeneration {
    pub component_code: Option<String>,
    pub test_code: Option<String>,
}

/// A model call failed part-way through a generation cycle.
///
/// Carries the partial output so a human can still inspect and fix it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("generation failed during the {stage} call: {source}")]
pub struct GenerationFailure {
    pub stage: GenerationStage,
    #[source]
    pub source: ModelError,
    pub partial: PartialGeneration,
}

impl GenerationFailure {
    fn new(stage: GenerationStage, source: ModelError, partial: PartialGeneration) -> Self {
        Self {
            stage,
            source,
            partial,
        }
    }
}

/// Result of a best-of-N run.
#[derive(Debug, Clone, PartialEq)]
pub struct BestOfResult {
    pub result: GenerationResult,
    pub candidates: Vec<String>,
    /// 0-based index of the candidate that was kept.
    pub chosen: usize,
    pub records: Result<Vec<ReviewRecord>, MalformedReviewOutput>,
}

/// Drives one end-to-end generation cycle over its own conversation.
pub struct GenerationSession<'a> {
    model: &'a ModelHandle,
    prompts: &'a PromptSet,
    review: ReviewSession,
}

impl<'a> GenerationSession<'a> {
    pub fn new(model: &'a ModelHandle, prompts: &'a PromptSet, review: ReviewSession) -> Self {
        Self {
            model,
            prompts,
            review,
        }
    }

    /// Generates component code, optionally its unit test, and a review.
    ///
    /// An empty description returns [`GenerationResult::placeholder`] without
    /// calling the model. Model calls are strictly sequential and never
    /// retried here.
    pub async fn generate(
        &self,
        description: &str,
        also_generate_test: bool,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationFailure> {
        if description.is_empty() {
            debug!("empty description; skipping model calls");
            return Ok(GenerationResult::placeholder());
        }

        let conversation = conversation_builder::build(&self.prompts.system_context(), description);
        let reply = self
            .model
            .send(&conversation, cancel)
            .await
            .map_err(|e| GenerationFailure::new(GenerationStage::Component, e, PartialGeneration::default()))?;
        let component_code = log_confidence(extract(&reply), GenerationStage::Component);

        let test_code = if also_generate_test {
            Some(self.generate_test(&conversation, &component_code, cancel).await?)
        } else {
            None
        };

        let review_summary = self
            .review
            .review(description, &component_code, cancel)
            .await
            .map_err(|e| {
                GenerationFailure::new(
                    GenerationStage::Review,
                    e,
                    PartialGeneration {
                        component_code: Some(component_code.clone()),
                        test_code: test_code.clone(),
                    },
                )
            })?;

        info!("generation cycle complete");
        Ok(GenerationResult {
            component_code,
            test_code,
            review_summary,
        })
    }

    /// Generates `n` candidates, keeps the one the reviewer scores highest,
    /// then writes the test for that candidate only.
    ///
    /// `n` of 0 or 1 runs a plain [`generate`](Self::generate) cycle.
    /// Malformed review text keeps the first candidate.
    pub async fn generate_best_of(
        &self,
        description: &str,
        n: usize,
        also_generate_test: bool,
        cancel: &CancellationToken,
    ) -> Result<BestOfResult, GenerationFailure> {
        if description.is_empty() {
            return Ok(BestOfResult {
                result: GenerationResult::placeholder(),
                candidates: Vec::new(),
                chosen: 0,
                records: Err(MalformedReviewOutput::Empty),
            });
        }

        let n = n.max(1);
        if n == 1 {
            let result = self.generate(description, also_generate_test, cancel).await?;
            return Ok(BestOfResult {
                candidates: vec![result.component_code.clone()],
                chosen: 0,
                records: parse_review_records(&result.review_summary),
                result,
            });
        }

        let conversation = conversation_builder::build(&self.prompts.system_context(), description);

        let mut candidates = Vec::with_capacity(n);
        for idx in 0..n {
            debug!(candidate = idx + 1, of = n, "generating candidate");
            let reply = self.model.send(&conversation, cancel).await.map_err(|e| {
                GenerationFailure::new(
                    GenerationStage::Component,
                    e,
                    PartialGeneration {
                        component_code: candidates.first().cloned(),
                        test_code: None,
                    },
                )
            })?;
            candidates.push(log_confidence(extract(&reply), GenerationStage::Component));
        }

        let review_summary = self
            .review
            .review_candidates(description, &candidates, cancel)
            .await
            .map_err(|e| {
                GenerationFailure::new(
                    GenerationStage::Review,
                    e,
                    PartialGeneration {
                        component_code: candidates.first().cloned(),
                        test_code: None,
                    },
                )
            })?;

        let records = parse_review_records(&review_summary);
        let chosen = match &records {
            Ok(records) => best_candidate(records, candidates.len()).unwrap_or(0),
            Err(e) => {
                warn!("review output not structured ({}); keeping first candidate", e);
                0
            }
        };
        info!(chosen = chosen + 1, of = candidates.len(), "selected candidate");

        let component_code = candidates[chosen].clone();
        let test_code = if also_generate_test {
            Some(self.generate_test(&conversation, &component_code, cancel).await?)
        } else {
            None
        };

        Ok(BestOfResult {
            result: GenerationResult {
                component_code,
                test_code,
                review_summary,
            },
            candidates,
            chosen,
            records,
        })
    }

    /// Asks for a corrected component and test after a failing test run.
    ///
    /// The conversation replays the artifact as if the model had written it,
    /// then appends the failure as a new user turn.
    pub async fn fix(
        &self,
        artifact: &Artifact,
        description: Option<&str>,
        summary: &str,
        full_output: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationFailure> {
        let request = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Write the component `{}`.", artifact.name));

        let mut turns = vec![ConversationTurn::assistant(artifact.component_code.clone())];
        if let Some(test_code) = &artifact.test_code {
            turns.push(ConversationTurn::user(fill_component_name(
                &self.prompts.unit_test,
                &artifact.component_code,
            )));
            turns.push(ConversationTurn::assistant(test_code.clone()));
        }
        turns.push(ConversationTurn::user(
            self.prompts
                .fix
                .replace("{SUMMARY}", summary.trim())
                .replace("{OUTPUT}", tail(full_output, MAX_FIX_OUTPUT_CHARS)),
        ));

        let conversation =
            conversation_builder::build(&self.prompts.system_context(), &request).extended(turns);
        let reply = self
            .model
            .send(&conversation, cancel)
            .await
            .map_err(|e| GenerationFailure::new(GenerationStage::Component, e, PartialGeneration::default()))?;
        let component_code = log_confidence(extract(&reply), GenerationStage::Component);

        let conversation = conversation.extended([
            ConversationTurn::assistant(component_code.clone()),
            ConversationTurn::user(fill_component_name(&self.prompts.fix_test, &component_code)),
        ]);
        let reply = self.model.send(&conversation, cancel).await.map_err(|e| {
            GenerationFailure::new(
                GenerationStage::Test,
                e,
                PartialGeneration {
                    component_code: Some(component_code.clone()),
                    test_code: None,
                },
            )
        })?;
        let test_code = strip_leaked_language_tag(&log_confidence(extract(&reply), GenerationStage::Test));

        let review_summary = self
            .review
            .review(&request, &component_code, cancel)
            .await
            .map_err(|e| {
                GenerationFailure::new(
                    GenerationStage::Review,
                    e,
                    PartialGeneration {
                        component_code: Some(component_code.clone()),
                        test_code: Some(test_code.clone()),
                    },
                )
            })?;

        Ok(GenerationResult {
            component_code,
            test_code: Some(test_code),
            review_summary,
        })
    }

    async fn generate_test(
        &self,
        base: &crate::data::Conversation,
        component_code: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationFailure> {
        let conversation =
            conversation_builder::with_test_request(base, component_code, &self.prompts.unit_test);
        let reply = self.model.send(&conversation, cancel).await.map_err(|e| {
            GenerationFailure::new(
                GenerationStage::Test,
                e,
                PartialGeneration {
                    component_code: Some(component_code.to_string()),
                    test_code: None,
                },
            )
        })?;
        Ok(strip_leaked_language_tag(&log_confidence(
            extract(&reply),
            GenerationStage::Test,
        )))
    }
}

fn log_confidence(extraction: Extraction, stage: GenerationStage) -> String {
    if !extraction.is_fenced() {
        warn!(%stage, "using unfenced model reply as code");
    }
    extraction.into_code()
}

/// Last `max_chars` characters of `text`.
fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[start..]
}
