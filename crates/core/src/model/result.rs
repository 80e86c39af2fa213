use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{QuizId, ResultId, UserId};
use crate::model::report::{AnswerDetail, Grade, ScoreReport, percentage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("score {score} exceeds max score {max_score}")]
    ScoreExceedsMax { score: u32, max_score: u32 },
}

/// A finalized attempt handed to a result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuizResult {
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub quiz_title: String,
    pub score: u32,
    pub max_score: u32,
    pub details: Vec<AnswerDetail>,
    pub completed_at: DateTime<Utc>,
}

impl NewQuizResult {
    #[must_use]
    pub fn from_report(
        quiz_id: QuizId,
        user_id: UserId,
        quiz_title: impl Into<String>,
        report: &ScoreReport,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            quiz_id,
            user_id,
            quiz_title: quiz_title.into(),
            score: report.score(),
            max_score: report.max_score(),
            details: report.details().to_vec(),
            completed_at,
        }
    }
}

/// A stored result as listed in history views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    id: ResultId,
    quiz_id: QuizId,
    user_id: UserId,
    quiz_title: String,
    score: u32,
    max_score: u32,
    completed_at: DateTime<Utc>,
}

impl QuizResult {
    /// Rehydrate a stored result.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::ScoreExceedsMax` if the stored score is impossible.
    pub fn from_persisted(
        id: ResultId,
        quiz_id: QuizId,
        user_id: UserId,
        quiz_title: impl Into<String>,
        score: u32,
        max_score: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        if score > max_score {
            return Err(ResultError::ScoreExceedsMax { score, max_score });
        }
        Ok(Self {
            id,
            quiz_id,
            user_id,
            quiz_title: quiz_title.into(),
            score,
            max_score,
            completed_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ResultId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz_title(&self) -> &str {
        &self.quiz_title
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.max_score)
    }

    #[must_use]
    pub fn grade(&self) -> Grade {
        Grade::from_percentage(self.percentage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rejects_impossible_scores() {
        let err = QuizResult::from_persisted(
            ResultId::new(1),
            QuizId::new(1),
            UserId::new(1),
            "T",
            4,
            3,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::ScoreExceedsMax { score: 4, max_score: 3 });
    }

    #[test]
    fn grades_stored_results() {
        let result = QuizResult::from_persisted(
            ResultId::new(1),
            QuizId::new(1),
            UserId::new(1),
            "T",
            3,
            4,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(result.percentage(), 75);
        assert_eq!(result.grade(), Grade::Good);
    }
}
