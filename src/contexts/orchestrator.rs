use super::artifact_store::{ArtifactError, ArtifactStore};
use super::conversation_builder::PromptSet;
use super::execution_bridge::{ExecutionBridge, ExecutionError};
use super::generation_session::{BestOfResult, GenerationFailure, GenerationSession};
use super::model::{ModelError, ModelHandle};
use super::review_session::ReviewSession;
use crate::data::{
    Artifact, ArtifactKind, ComponentName, GenerationRequest, GenerationResult, TestExecutionReport,
};
use crate::manifest::{EditStatus, Manifest};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors raised by [`Orchestrator::auto_fix`]
#[derive(Debug, Error)]
pub enum AutoFixError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Generation(#[from] GenerationFailure),
}

/// What one auto-fix round produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoFixOutcome {
    /// New component and test, not yet persisted.
    Regenerated(GenerationResult),
    /// The model returned the persisted pair unchanged.
    Unchanged(GenerationResult),
}

impl AutoFixOutcome {
    pub fn result(&self) -> &GenerationResult {
        match self {
            AutoFixOutcome::Regenerated(result) | AutoFixOutcome::Unchanged(result) => result,
        }
    }

    pub fn into_result(self) -> GenerationResult {
        match self {
            AutoFixOutcome::Regenerated(result) | AutoFixOutcome::Unchanged(result) => result,
        }
    }
}

/// Caller-facing entry point tying generation, review, persistence and
/// test execution together.
///
/// Every call runs to completion before returning. The review prompt is the
/// only state shared between calls; each review reads it once when it starts.
#[derive(Debug)]
pub struct Orchestrator {
    generation: ModelHandle,
    review: ModelHandle,
    prompts: PromptSet,
    review_prompt: RwLock<String>,
    store: ArtifactStore,
    bridge: ExecutionBridge,
    manifest: Mutex<Manifest>,
}

impl Orchestrator {
    /// Creates a new Orchestrator
    ///
    /// # Arguments
    /// * `generation` - Model handle for component and test calls
    /// * `review` - Model handle for review calls
    /// * `prompts` - Resolved prompt texts; `prompts.review` seeds the review prompt
    /// * `store` - Artifact storage
    /// * `bridge` - Test execution over the same store
    /// * `manifest` - Persist records for the store
    pub fn new(
        generation: ModelHandle,
        review: ModelHandle,
        prompts: PromptSet,
        store: ArtifactStore,
        bridge: ExecutionBridge,
        manifest: Manifest,
    ) -> Self {
        let review_prompt = RwLock::new(prompts.review.clone());
        Self {
            generation,
            review,
            prompts,
            review_prompt,
            store,
            bridge,
            manifest: Mutex::new(manifest),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs one generation cycle on a fresh conversation.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationFailure> {
        self.session()
            .generate(&request.description, request.also_generate_test, cancel)
            .await
    }

    /// Generates `n` candidates and keeps the one the reviewer prefers.
    pub async fn generate_best_of(
        &self,
        request: &GenerationRequest,
        n: usize,
        cancel: &CancellationToken,
    ) -> Result<BestOfResult, GenerationFailure> {
        self.session()
            .generate_best_of(&request.description, n, request.also_generate_test, cancel)
            .await
    }

    /// Reviews code outside a generation cycle.
    pub async fn review(
        &self,
        description: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ModelError> {
        self.review_session().review(description, code, cancel).await
    }

    /// Writes a component/test pair and records it in the manifest.
    pub fn persist(
        &self,
        component_code: &str,
        test_code: Option<&str>,
        description: Option<&str>,
    ) -> Result<ComponentName, ArtifactError> {
        let name = self.store.persist(component_code, test_code)?;

        let mut manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
        manifest.record(&name, component_code, test_code, description);
        manifest
            .save()
            .map_err(|source| ArtifactError::ManifestNotUpdated {
                name: name.clone(),
                source,
            })?;

        info!("persisted artifact '{}'", name);
        Ok(name)
    }

    pub fn load(&self, name: &ComponentName) -> Result<Artifact, ArtifactError> {
        self.store.load(name)
    }

    /// Whether `artifact` differs from its last persist; `None` if untracked.
    pub fn edit_status(&self, artifact: &Artifact) -> Option<EditStatus> {
        self.manifest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .edit_status(artifact)
    }

    /// Description the artifact was generated from, when recorded.
    pub fn description_of(&self, name: &ComponentName) -> Option<String> {
        self.manifest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .description(name)
            .map(str::to_string)
    }

    pub async fn run_test(
        &self,
        name: &ComponentName,
        cancel: &CancellationToken,
    ) -> Result<TestExecutionReport, ExecutionError> {
        self.bridge.run_test(name, cancel).await
    }

    pub fn list_available(&self, kind: ArtifactKind) -> Result<Vec<String>, ArtifactError> {
        self.store.list_available(kind)
    }

    /// Replaces the review prompt for reviews started from now on.
    pub fn update_review_prompt(&self, prompt: impl Into<String>) {
        *self.review_prompt.write().unwrap_or_else(|e| e.into_inner()) = prompt.into();
    }

    pub fn review_prompt(&self) -> String {
        self.review_prompt
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Asks the model to repair a persisted artifact whose test failed.
    ///
    /// The failure is appended to a conversation that replays the artifact;
    /// the corrected pair is returned for the caller to persist and rerun.
    pub async fn auto_fix(
        &self,
        name: &ComponentName,
        summary: &str,
        full_output: &str,
        cancel: &CancellationToken,
    ) -> Result<AutoFixOutcome, AutoFixError> {
        let artifact = self.store.load(name)?;
        let description = self.description_of(name);

        let result = self
            .session()
            .fix(&artifact, description.as_deref(), summary, full_output, cancel)
            .await?;

        let unchanged = result.component_code == artifact.component_code
            && result.test_code == artifact.test_code;
        Ok(if unchanged {
            AutoFixOutcome::Unchanged(result)
        } else {
            AutoFixOutcome::Regenerated(result)
        })
    }

    fn session(&self) -> GenerationSession<'_> {
        GenerationSession::new(&self.generation, &self.prompts, self.review_session())
    }

    fn review_session(&self) -> ReviewSession {
        ReviewSession::new(self.review.clone(), self.review_prompt())
    }
}
