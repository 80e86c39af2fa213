//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{
    AnswerId, QuestionId, QuizError, QuizId, SessionStateError, SessionStatus,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the quiz session tracker.
///
/// None of these leave the recorded answers partially updated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("{operation} is not allowed while the session is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: SessionStatus,
    },
    #[error("question {0} was already answered")]
    DuplicateAnswer(QuestionId),
    #[error("question {index} is the last one; finalize instead of advancing")]
    SequenceExhausted { index: usize },
    #[error("result was not saved: {0}")]
    Persistence(#[source] StorageError),
    #[error("quiz {quiz_id} has no question at index {index}")]
    NotFound { quiz_id: QuizId, index: usize },
    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),
    #[error("answer {0} does not belong to the current question")]
    UnknownAnswer(AnswerId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl From<SessionStateError> for SessionError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::InvalidTransition { operation, status } => {
                SessionError::InvalidTransition { operation, status }
            }
            SessionStateError::DuplicateAnswer(question_id) => {
                SessionError::DuplicateAnswer(question_id)
            }
        }
    }
}

/// Errors emitted by `ResultHistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("result history limit must be greater than zero")]
    InvalidLimit,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizCatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_map_onto_session_errors() {
        let err: SessionError = SessionStateError::DuplicateAnswer(QuestionId::new(3)).into();
        assert!(matches!(err, SessionError::DuplicateAnswer(id) if id == QuestionId::new(3)));

        let err: SessionError = SessionStateError::InvalidTransition {
            operation: "advance",
            status: SessionStatus::Completed,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "advance is not allowed while the session is completed"
        );
    }
}
