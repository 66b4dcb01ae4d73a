use gauntlet_common::types::Ecosystem;
use std::io;
use thiserror::Error;

/// Failures that abort a request.
///
/// Timeouts and failing test suites are not errors: they come back as an
/// unsuccessful `ExecutionResult`.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Invalid exercise ID {raw:?} for {ecosystem}")]
    InvalidExerciseId { ecosystem: Ecosystem, raw: String },
    #[error("Submission is {size} bytes, maximum is {max} bytes")]
    SubmissionTooLarge { size: usize, max: usize },
    #[error("Unable to stage submission: {source}")]
    Workspace { source: io::Error },
    #[error("Unable to run container command: {source}")]
    Invocation { source: io::Error },
}

pub type Result<T, E = ExecutorError> = std::result::Result<T, E>;
