use std::sync::Arc;

use quiz_core::model::{Quiz, QuizSummary};
use storage::repository::QuizRepository;

use crate::error::CatalogError;

/// Quiz listing and authoring entry point.
#[derive(Clone)]
pub struct QuizCatalogService {
    quizzes: Arc<dyn QuizRepository>,
}

impl QuizCatalogService {
    #[must_use]
    pub fn new(quizzes: Arc<dyn QuizRepository>) -> Self {
        Self { quizzes }
    }

    /// All quizzes, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the repository fails.
    pub async fn list(&self) -> Result<Vec<QuizSummary>, CatalogError> {
        Ok(self.quizzes.list_quizzes().await?)
    }

    /// Store a validated quiz, replacing any earlier version with the same id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` on conflicts or backend failures.
    pub async fn publish(&self, quiz: &Quiz) -> Result<QuizSummary, CatalogError> {
        self.quizzes.upsert_quiz(quiz).await?;
        tracing::info!(quiz_id = %quiz.id(), title = quiz.title(), "quiz published");
        Ok(quiz.summary())
    }
}
