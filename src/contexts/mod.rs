mod artifact_store;
mod conversation_builder;
mod execution_bridge;
pub mod extractor;
mod generation_session;
mod model;
mod orchestrator;
mod review_session;

pub use artifact_store::{ArtifactError, ArtifactStore};
pub use conversation_builder::{
    COMPONENT_NAME_PLACEHOLDER, PromptSet, build, build_review, candidates_frame, fill_component_name,
    review_frame, with_test_request,
};
pub use execution_bridge::{ExecutionBridge, ExecutionError, SUPPRESS_WARNINGS_FLAG, summarize};
pub use extractor::{Extraction, extract, strip_leaked_language_tag};
pub use generation_session::{
    BestOfResult, GenerationFailure, GenerationSession, GenerationStage, MAX_FIX_OUTPUT_CHARS,
    PartialGeneration,
};
pub use model::{ChatModel, ModelError, ModelHandle, OpenAiChatModel};
pub use orchestrator::{AutoFixError, AutoFixOutcome, Orchestrator};
pub use review_session::{MalformedReviewOutput, ReviewSession, best_candidate, parse_review_records};
