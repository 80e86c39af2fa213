use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{AnswerDetail, Grade, QuizId, QuizResult, ResultId, UserId};
use storage::repository::ResultHistoryRepository;

use crate::error::HistoryError;

/// Presentation-agnostic row of a result history listing.
///
/// Timestamps are left unformatted; callers pick a locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultListItem {
    pub id: ResultId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub quiz_title: String,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub grade: Grade,
    pub completed_at: DateTime<Utc>,
}

impl ResultListItem {
    #[must_use]
    pub fn from_result(result: &QuizResult) -> Self {
        Self {
            id: result.id(),
            quiz_id: result.quiz_id(),
            user_id: result.user_id(),
            quiz_title: result.quiz_title().to_owned(),
            score: result.score(),
            max_score: result.max_score(),
            percentage: result.percentage(),
            grade: result.grade(),
            completed_at: result.completed_at(),
        }
    }
}

/// Read side for finished attempts: a user's own history and the full admin view.
#[derive(Clone)]
pub struct ResultHistoryService {
    history: Arc<dyn ResultHistoryRepository>,
}

impl ResultHistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn ResultHistoryRepository>) -> Self {
        Self { history }
    }

    /// Most recent results of one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::InvalidLimit` for a zero limit and
    /// `HistoryError::Storage` if the repository fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultListItem>, HistoryError> {
        if limit == 0 {
            return Err(HistoryError::InvalidLimit);
        }
        let rows = self.history.list_results_for_user(user_id, limit).await?;
        Ok(rows.iter().map(ResultListItem::from_result).collect())
    }

    /// Most recent results across all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::InvalidLimit` for a zero limit and
    /// `HistoryError::Storage` if the repository fails.
    pub async fn list_all(&self, limit: u32) -> Result<Vec<ResultListItem>, HistoryError> {
        if limit == 0 {
            return Err(HistoryError::InvalidLimit);
        }
        let rows = self.history.list_all_results(limit).await?;
        Ok(rows.iter().map(ResultListItem::from_result).collect())
    }

    /// Per-question breakdown stored with a result.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` if the result does not exist or the repository fails.
    pub async fn details(&self, result_id: ResultId) -> Result<Vec<AnswerDetail>, HistoryError> {
        Ok(self.history.result_details(result_id).await?)
    }
}
