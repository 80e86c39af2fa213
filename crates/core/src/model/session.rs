use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::answers::{AnswerRecord, AnswerSet, IndexedAnswer, PersistedSession};
use crate::model::ids::{AnswerId, QuestionId, QuizId};
use crate::model::quiz::{Question, RevealPolicy};
use crate::model::report::ScoreReport;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStateError {
    #[error("{operation} is not allowed while the session is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("question {0} was already answered")]
    DuplicateAnswer(QuestionId),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt. `TimeExpired` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    TimeExpired,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in progress",
            SessionStatus::TimeExpired => "time expired",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding elapsed time into the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_seconds: u64 },
    /// The limit was reached on this tick; the session is now `TimeExpired`.
    Expired,
    /// The session was already terminal; nothing changed.
    Inert,
}

/// A previously committed choice, as shown again when a question is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorAnswer {
    pub answer_id: AnswerId,
    pub is_correct: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One attempt at one quiz.
///
/// Holds only rules: I/O (question fetches, persistence, result sinks) lives with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    quiz_id: QuizId,
    started_at: DateTime<Utc>,
    time_limit_minutes: u32,
    reveal_policy: RevealPolicy,
    status: SessionStatus,
    completed_at: Option<DateTime<Utc>>,
    answers: AnswerSet,
    indexed_answers: Vec<Option<IndexedAnswer>>,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        quiz_id: QuizId,
        time_limit_minutes: u32,
        reveal_policy: RevealPolicy,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            quiz_id,
            started_at,
            time_limit_minutes,
            reveal_policy,
            status: SessionStatus::InProgress,
            completed_at: None,
            answers: AnswerSet::new(),
            indexed_answers: Vec::new(),
        }
    }

    /// Rebuild a session from a stored record.
    ///
    /// `started_at` is taken from the record so reloading never extends the time limit.
    /// A record carrying `completed_at` comes back `Completed`.
    #[must_use]
    pub fn restore(
        quiz_id: QuizId,
        time_limit_minutes: u32,
        reveal_policy: RevealPolicy,
        persisted: PersistedSession,
    ) -> Self {
        Self {
            quiz_id,
            started_at: persisted.started_at,
            time_limit_minutes,
            reveal_policy,
            status: if persisted.completed_at.is_some() {
                SessionStatus::Completed
            } else {
                SessionStatus::InProgress
            },
            completed_at: persisted.completed_at,
            answers: persisted.answers,
            indexed_answers: persisted.indexed_answers,
        }
    }

    #[must_use]
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            answers: self.answers.clone(),
            indexed_answers: self.indexed_answers.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
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
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    /// Whether correct answers may be shown right now.
    #[must_use]
    pub fn can_reveal(&self) -> bool {
        self.reveal_policy.is_immediate() || self.status.is_terminal()
    }

    /// Number of questions in `questions` that have an answer in either stored shape.
    #[must_use]
    pub fn answered_count(&self, questions: &[Question]) -> usize {
        let answers = self.normalized_answers(questions);
        questions.iter().filter(|q| answers.contains(q.id())).count()
    }

    /// The committed answer for a question, looking at both stored shapes.
    #[must_use]
    pub fn prior_answer(&self, question_id: QuestionId, question_index: usize) -> Option<PriorAnswer> {
        if let Some(record) = self.answers.get(question_id) {
            return Some(PriorAnswer {
                answer_id: record.chosen_answer_id,
                is_correct: record.is_correct,
            });
        }
        self.indexed_answers
            .get(question_index)
            .and_then(Option::as_ref)
            .map(|entry| PriorAnswer {
                answer_id: entry.answer_id,
                is_correct: entry.is_correct,
            })
    }

    fn require_in_progress(&self, operation: &'static str) -> Result<(), SessionStateError> {
        if self.status.is_terminal() {
            return Err(SessionStateError::InvalidTransition {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Commit an answer. Each question accepts exactly one.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` once terminal and
    /// `SessionStateError::DuplicateAnswer` if the question already has an answer.
    pub fn record_answer(&mut self, record: AnswerRecord) -> Result<(), SessionStateError> {
        self.require_in_progress("submit_answer")?;
        let question_id = record.question_id;
        if self.prior_answer(question_id, record.question_index).is_some() {
            return Err(SessionStateError::DuplicateAnswer(question_id));
        }
        if !self.answers.insert(record) {
            return Err(SessionStateError::DuplicateAnswer(question_id));
        }
        Ok(())
    }

    /// Seconds left after `elapsed_seconds`, or `None` for an unlimited quiz.
    #[must_use]
    pub fn remaining_seconds(&self, elapsed_seconds: u64) -> Option<u64> {
        if self.time_limit_minutes == 0 {
            return None;
        }
        let limit = u64::from(self.time_limit_minutes) * 60;
        Some(limit.saturating_sub(elapsed_seconds))
    }

    /// Advance the countdown. Expiry is one-way; ticks after any terminal state are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` for an unlimited quiz.
    pub fn tick(&mut self, elapsed_seconds: u64) -> Result<TickOutcome, SessionStateError> {
        if self.status.is_terminal() {
            return Ok(TickOutcome::Inert);
        }
        let Some(remaining_seconds) = self.remaining_seconds(elapsed_seconds) else {
            return Err(SessionStateError::InvalidTransition {
                operation: "tick (no time limit)",
                status: self.status,
            });
        };
        if remaining_seconds == 0 {
            self.status = SessionStatus::TimeExpired;
            return Ok(TickOutcome::Expired);
        }
        Ok(TickOutcome::Running { remaining_seconds })
    }

    /// Move to `Completed` from `InProgress` or `TimeExpired`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTransition` if already completed.
    pub fn complete(&mut self, completed_at: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.status == SessionStatus::Completed {
            return Err(SessionStateError::InvalidTransition {
                operation: "finalize",
                status: self.status,
            });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(completed_at);
        Ok(())
    }

    /// Both stored answer shapes merged into one id-keyed set for `questions`.
    #[must_use]
    pub fn normalized_answers(&self, questions: &[Question]) -> AnswerSet {
        self.answers.normalize(&self.indexed_answers, questions)
    }

    /// Score this session against the full ordered question list.
    #[must_use]
    pub fn report(&self, questions: &[Question]) -> ScoreReport {
        ScoreReport::compute(
            questions,
            &self.normalized_answers(questions),
            self.can_reveal(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::quiz::AnswerOption;
    use crate::time::fixed_now;

    fn record(id: u64, index: usize, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            question_index: index,
            question_text: format!("Q{id}"),
            chosen_answer_text: "a".into(),
            chosen_answer_id: AnswerId::new(1),
            is_correct,
        }
    }

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![
                AnswerOption::new(AnswerId::new(1), "a", true),
                AnswerOption::new(AnswerId::new(2), "b", false),
            ],
        )
        .unwrap()
    }

    fn timed(minutes: u32) -> QuizSession {
        QuizSession::new(QuizId::new(1), minutes, RevealPolicy::Immediate, fixed_now())
    }

    #[test]
    fn duplicate_answers_leave_the_first_in_place() {
        let mut session = timed(0);
        session.record_answer(record(1, 0, true)).unwrap();
        let err = session.record_answer(record(1, 0, false)).unwrap_err();
        assert_eq!(err, SessionStateError::DuplicateAnswer(QuestionId::new(1)));
        assert!(session.answers().get(QuestionId::new(1)).unwrap().is_correct);
    }

    #[test]
    fn tick_expires_exactly_once() {
        let mut session = timed(1);
        assert_eq!(
            session.tick(59).unwrap(),
            TickOutcome::Running { remaining_seconds: 1 }
        );
        assert_eq!(session.tick(60).unwrap(), TickOutcome::Expired);
        assert_eq!(session.status(), SessionStatus::TimeExpired);
        assert_eq!(session.tick(61).unwrap(), TickOutcome::Inert);
        assert_eq!(session.tick(10_000).unwrap(), TickOutcome::Inert);
        assert_eq!(session.status(), SessionStatus::TimeExpired);
    }

    #[test]
    fn tick_without_limit_is_rejected() {
        let mut session = timed(0);
        assert!(matches!(
            session.tick(5),
            Err(SessionStateError::InvalidTransition { .. })
        ));
        assert_eq!(session.remaining_seconds(5), None);
    }

    #[test]
    fn answers_are_frozen_after_expiry() {
        let mut session = timed(1);
        session.tick(120).unwrap();
        let err = session.record_answer(record(1, 0, true)).unwrap_err();
        assert!(matches!(err, SessionStateError::InvalidTransition { .. }));
        assert!(session.answers().is_empty());
    }

    #[test]
    fn complete_is_allowed_once_from_expired() {
        let mut session = timed(1);
        session.tick(60).unwrap();
        session.complete(fixed_now()).unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(session.complete(fixed_now()).is_err());
        assert_eq!(session.tick(90).unwrap(), TickOutcome::Inert);
    }

    #[test]
    fn deferred_policy_hides_answers_until_terminal() {
        let mut session =
            QuizSession::new(QuizId::new(1), 0, RevealPolicy::Deferred, fixed_now());
        assert!(!session.can_reveal());
        session.complete(fixed_now()).unwrap();
        assert!(session.can_reveal());
    }

    #[test]
    fn legacy_indexed_entries_block_resubmission() {
        let mut persisted = PersistedSession::fresh(fixed_now());
        persisted.indexed_answers = vec![Some(IndexedAnswer {
            answer_id: AnswerId::new(2),
            is_correct: false,
            checked: true,
            question_text: String::new(),
            user_answer_text: String::new(),
            correct_answer_text: None,
        })];
        let mut session =
            QuizSession::restore(QuizId::new(1), 0, RevealPolicy::Immediate, persisted);

        let prior = session.prior_answer(QuestionId::new(1), 0).unwrap();
        assert_eq!(prior.answer_id, AnswerId::new(2));
        assert!(session.record_answer(record(1, 0, true)).is_err());
        assert_eq!(session.answered_count(&[question(1)]), 1);
    }

    #[test]
    fn answered_count_counts_each_question_once() {
        let mut persisted = PersistedSession::fresh(fixed_now());
        persisted.answers.insert(record(1, 0, true));
        persisted.indexed_answers = vec![
            Some(IndexedAnswer {
                answer_id: AnswerId::new(2),
                is_correct: false,
                checked: true,
                question_text: String::new(),
                user_answer_text: String::new(),
                correct_answer_text: None,
            }),
            None,
            None,
            Some(IndexedAnswer {
                answer_id: AnswerId::new(1),
                is_correct: true,
                checked: true,
                question_text: String::new(),
                user_answer_text: String::new(),
                correct_answer_text: None,
            }),
        ];
        let session = QuizSession::restore(QuizId::new(1), 0, RevealPolicy::Immediate, persisted);

        let questions = [question(1), question(2), question(3)];
        assert_eq!(session.answered_count(&questions), 1);
    }

    #[test]
    fn completed_record_restores_as_completed() {
        let mut session = timed(0);
        session.record_answer(record(1, 0, true)).unwrap();
        session.complete(fixed_now()).unwrap();
        let persisted = session.to_persisted();
        assert_eq!(persisted.completed_at, Some(fixed_now()));

        let mut restored =
            QuizSession::restore(QuizId::new(1), 0, RevealPolicy::Deferred, persisted);
        assert_eq!(restored.status(), SessionStatus::Completed);
        assert_eq!(restored.completed_at(), Some(fixed_now()));
        assert!(restored.can_reveal());
        assert!(matches!(
            restored.record_answer(record(2, 1, true)),
            Err(SessionStateError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn report_merges_legacy_and_keyed_answers() {
        let questions = vec![question(1), question(2)];
        let mut persisted = PersistedSession::fresh(fixed_now());
        persisted.indexed_answers = vec![Some(IndexedAnswer {
            answer_id: AnswerId::new(1),
            is_correct: true,
            checked: true,
            question_text: String::new(),
            user_answer_text: String::new(),
            correct_answer_text: None,
        })];
        persisted.answers.insert(record(2, 1, true));
        let session = QuizSession::restore(QuizId::new(1), 0, RevealPolicy::Immediate, persisted);

        let report = session.report(&questions);
        assert_eq!(report.score(), 2);
        assert_eq!(report.details()[0].user_answer_text, "a");
    }
}
