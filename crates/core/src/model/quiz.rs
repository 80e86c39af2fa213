use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz must contain at least one question")]
    NoQuestions,

    #[error("question {question_id} has no text")]
    EmptyQuestionText { question_id: QuestionId },

    #[error("question {question_id} needs at least two answers, got {count}")]
    TooFewAnswers { question_id: QuestionId, count: usize },

    #[error("question {question_id} has no correct answer")]
    NoCorrectAnswer { question_id: QuestionId },

    #[error("answer {answer_id} of question {question_id} has no text")]
    EmptyAnswerText {
        question_id: QuestionId,
        answer_id: AnswerId,
    },

    #[error("answer {answer_id} appears twice in question {question_id}")]
    DuplicateAnswerId {
        question_id: QuestionId,
        answer_id: AnswerId,
    },

    #[error("question {0} appears twice in the quiz")]
    DuplicateQuestionId(QuestionId),

    #[error("unknown reveal policy: {0}")]
    UnknownRevealPolicy(String),
}

//
// ─── REVEAL POLICY ─────────────────────────────────────────────────────────────
//

/// Whether correctness is shown right after answering or only once the attempt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealPolicy {
    #[default]
    Immediate,
    Deferred,
}

impl RevealPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RevealPolicy::Immediate => "immediate",
            RevealPolicy::Deferred => "deferred",
        }
    }

    #[must_use]
    pub fn is_immediate(self) -> bool {
        matches!(self, RevealPolicy::Immediate)
    }
}

impl fmt::Display for RevealPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevealPolicy {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(RevealPolicy::Immediate),
            "deferred" => Ok(RevealPolicy::Deferred),
            other => Err(QuizError::UnknownRevealPolicy(other.to_owned())),
        }
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// One selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            is_correct,
        }
    }
}

/// A multiple-choice question with its full answer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    answers: Vec<AnswerOption>,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the text is blank, fewer than two answers are given,
    /// no answer is marked correct, an answer is blank or answer ids repeat.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        answers: Vec<AnswerOption>,
    ) -> Result<Self, QuizError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuizError::EmptyQuestionText { question_id: id });
        }
        if answers.len() < 2 {
            return Err(QuizError::TooFewAnswers {
                question_id: id,
                count: answers.len(),
            });
        }

        let mut seen = HashSet::with_capacity(answers.len());
        for answer in &answers {
            if answer.text.trim().is_empty() {
                return Err(QuizError::EmptyAnswerText {
                    question_id: id,
                    answer_id: answer.id,
                });
            }
            if !seen.insert(answer.id) {
                return Err(QuizError::DuplicateAnswerId {
                    question_id: id,
                    answer_id: answer.id,
                });
            }
        }
        if !answers.iter().any(|a| a.is_correct) {
            return Err(QuizError::NoCorrectAnswer { question_id: id });
        }

        Ok(Self { id, text, answers })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerOption] {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, id: AnswerId) -> Option<&AnswerOption> {
        self.answers.iter().find(|a| a.id == id)
    }

    /// Texts of every correct option, joined with `", "`.
    #[must_use]
    pub fn correct_answer_text(&self) -> String {
        self.answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.text.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A quiz and its ordered question sequence.
///
/// Question order is the sequence order used for navigation and for report ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    author: Option<String>,
    created_at: DateTime<Utc>,
    time_limit_minutes: u32,
    reveal_policy: RevealPolicy,
    questions: Vec<Question>,
}

impl Quiz {
    /// Create an untimed quiz with immediate reveal.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle`, `QuizError::NoQuestions` or
    /// `QuizError::DuplicateQuestionId`.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(QuizError::DuplicateQuestionId(q.id()));
            }
        }

        Ok(Self {
            id,
            title,
            author: None,
            created_at,
            time_limit_minutes: 0,
            reveal_policy: RevealPolicy::Immediate,
            questions,
        })
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Limit the attempt to `minutes`; `0` means unlimited.
    #[must_use]
    pub fn with_time_limit(mut self, minutes: u32) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_reveal_policy(mut self, policy: RevealPolicy) -> Self {
        self.reveal_policy = policy;
        self
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn reveal_policy(&self) -> RevealPolicy {
        self.reveal_policy
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// The page a question source serves for `index`, if it exists.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<QuestionPage> {
        let question = self.questions.get(index)?.clone();
        Some(QuestionPage {
            question,
            current_index: index,
            total_questions: self.questions.len(),
            quiz_title: self.title.clone(),
            time_limit_minutes: self.time_limit_minutes,
            reveal_policy: self.reveal_policy,
        })
    }

    #[must_use]
    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            question_count: self.questions.len(),
            time_limit_minutes: self.time_limit_minutes,
            reveal_policy: self.reveal_policy,
        }
    }
}

/// Catalog entry for listing available quizzes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSummary {
    pub id: QuizId,
    pub title: String,
    pub question_count: usize,
    pub time_limit_minutes: u32,
    pub reveal_policy: RevealPolicy,
}

/// One question as served by index, with the quiz metadata a client needs to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPage {
    pub question: Question,
    pub current_index: usize,
    pub total_questions: usize,
    pub quiz_title: String,
    pub time_limit_minutes: u32,
    pub reveal_policy: RevealPolicy,
}

impl QuestionPage {
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.total_questions
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn options(correct: u64) -> Vec<AnswerOption> {
        (1..=3)
            .map(|i| AnswerOption::new(AnswerId::new(i), format!("A{i}"), i == correct))
            .collect()
    }

    #[test]
    fn question_requires_a_correct_answer() {
        let answers = vec![
            AnswerOption::new(AnswerId::new(1), "a", false),
            AnswerOption::new(AnswerId::new(2), "b", false),
        ];
        let err = Question::new(QuestionId::new(1), "Q", answers).unwrap_err();
        assert_eq!(
            err,
            QuizError::NoCorrectAnswer {
                question_id: QuestionId::new(1)
            }
        );
    }

    #[test]
    fn question_rejects_single_answer() {
        let answers = vec![AnswerOption::new(AnswerId::new(1), "a", true)];
        let err = Question::new(QuestionId::new(1), "Q", answers).unwrap_err();
        assert!(matches!(err, QuizError::TooFewAnswers { count: 1, .. }));
    }

    #[test]
    fn question_rejects_duplicate_answer_ids() {
        let answers = vec![
            AnswerOption::new(AnswerId::new(1), "a", true),
            AnswerOption::new(AnswerId::new(1), "b", false),
        ];
        let err = Question::new(QuestionId::new(1), "Q", answers).unwrap_err();
        assert!(matches!(err, QuizError::DuplicateAnswerId { .. }));
    }

    #[test]
    fn correct_answer_text_joins_all_correct_options() {
        let answers = vec![
            AnswerOption::new(AnswerId::new(1), "int", true),
            AnswerOption::new(AnswerId::new(2), "float", false),
            AnswerOption::new(AnswerId::new(3), "bool", true),
        ];
        let q = Question::new(QuestionId::new(1), "Q", answers).unwrap();
        assert_eq!(q.correct_answer_text(), "int, bool");
    }

    #[test]
    fn quiz_rejects_blank_title_and_duplicate_questions() {
        let q = Question::new(QuestionId::new(1), "Q", options(1)).unwrap();
        assert_eq!(
            Quiz::new(QuizId::new(1), "  ", vec![q.clone()], fixed_now()).unwrap_err(),
            QuizError::EmptyTitle
        );
        assert_eq!(
            Quiz::new(QuizId::new(1), "T", vec![q.clone(), q], fixed_now()).unwrap_err(),
            QuizError::DuplicateQuestionId(QuestionId::new(1))
        );
        assert_eq!(
            Quiz::new(QuizId::new(1), "T", Vec::new(), fixed_now()).unwrap_err(),
            QuizError::NoQuestions
        );
    }

    #[test]
    fn page_reports_position_and_metadata() {
        let questions = (1..=3)
            .map(|i| Question::new(QuestionId::new(i), format!("Q{i}"), options(1)).unwrap())
            .collect();
        let quiz = Quiz::new(QuizId::new(5), "Python", questions, fixed_now())
            .unwrap()
            .with_time_limit(10)
            .with_reveal_policy(RevealPolicy::Deferred);

        let page = quiz.page(2).unwrap();
        assert_eq!(page.question.id(), QuestionId::new(3));
        assert_eq!(page.total_questions, 3);
        assert_eq!(page.time_limit_minutes, 10);
        assert_eq!(page.reveal_policy, RevealPolicy::Deferred);
        assert!(page.is_last());
        assert!(quiz.page(3).is_none());
    }

    #[test]
    fn reveal_policy_parses_storage_names() {
        assert_eq!("deferred".parse::<RevealPolicy>().unwrap(), RevealPolicy::Deferred);
        assert_eq!(RevealPolicy::Immediate.to_string(), "immediate");
        assert!("later".parse::<RevealPolicy>().is_err());
    }
}
