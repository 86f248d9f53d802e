mod artifact;
mod conversation;
mod generation;

pub use artifact::{
    ARTIFACT_EXTENSION, Artifact, ArtifactKind, ComponentName, MalformedComponentSource,
    TEST_PREFIX,
};
pub use conversation::{Conversation, ConversationTurn, Role};
pub use generation::{
    EMPTY_INPUT_PLACEHOLDER, GenerationRequest, GenerationResult, ReviewRecord,
    TestExecutionReport, TestVerdict,
};
