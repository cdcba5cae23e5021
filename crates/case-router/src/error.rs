/// Errors raised while classifying an orchestrator reply.
///
/// Both variants are fatal for the current upload attempt. The caller shows a generic
/// failure message and takes no navigation action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("invalid response from server")]
    InvalidResponse,

    #[error("no analysis results received from server: {0}")]
    MissingResults(ResultsDefect),
}

/// What exactly was wrong with the `results` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResultsDefect {
    #[error("results field is absent")]
    Absent,

    #[error("results field is not an array")]
    NotASequence,

    #[error("results[{index}] is not an object")]
    EntryNotObject { index: usize },

    #[error("results[{index}].tool is missing or not a string")]
    ToolNotString { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("please select a file first")]
    NoDocument,

    #[error("please fill in case title and client name")]
    MissingTitleOrClient,

    #[error("please enter case description to analyze")]
    MissingDescription,

    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}
