use thiserror::Error;

/// Caller mistakes when compiling a prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("no personas selected for the session")]
    NoPersonas,

    #[error("teacher message is empty")]
    EmptyTeacherMessage,
}

/// Errors surfaced by the turn orchestrator.
///
/// Transport and model-output failures never show up here; they degrade
/// inside the turn.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("a turn is already in progress")]
    Busy,

    #[error("session has already ended")]
    SessionEnded,

    #[error("teacher message is empty")]
    EmptyTeacherMessage,

    #[error("session has no turns to summarize")]
    NothingToSummarize,

    #[error("summary already attached to session {0}")]
    SummaryAlreadyAttached(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}
