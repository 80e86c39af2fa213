use std::sync::Arc;

use quiz_core::model::{
    AnswerId, AnswerRecord, NewQuizResult, PersistedSession, Question, QuestionPage, Quiz, QuizId,
    QuizSession, ResultId, ScoreReport, SessionStatus, TickOutcome, UserId,
};
use storage::repository::{QuestionSource, ResultSink, SessionStore, StorageError};

use super::progress::SessionProgress;
use super::view::{AnswerFeedback, AnswerSubmission, QuestionView};
use crate::Clock;
use crate::error::SessionError;

/// Client-side behavior that does not come from the quiz itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Move the cursor to the next question after a successful submission.
    pub auto_advance: bool,
}

/// Outcome of `QuizSessionTracker::finalize`.
///
/// The report is always present; a failed save is reported next to it rather
/// than instead of it.
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub report: ScoreReport,
    pub result_id: Option<ResultId>,
    pub save_error: Option<SessionError>,
}

impl FinalizeOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.result_id.is_some()
    }
}

/// State machine for one user's attempt at one quiz.
///
/// The tracker owns no timer: callers feed elapsed time through `tick` or
/// `tick_now`. Collaborators are injected so the same rules run against
/// memory or `SQLite`.
pub struct QuizSessionTracker {
    quiz_id: QuizId,
    user_id: UserId,
    clock: Clock,
    settings: TrackerSettings,
    questions: Arc<dyn QuestionSource>,
    results: Arc<dyn ResultSink>,
    store: Arc<dyn SessionStore>,

    quiz: Option<Quiz>,
    session: Option<QuizSession>,
    current: Option<QuestionPage>,
    cursor: usize,
    report: Option<ScoreReport>,
    pending_result: Option<NewQuizResult>,
    result_id: Option<ResultId>,
}

impl QuizSessionTracker {
    #[must_use]
    pub fn new(
        quiz_id: QuizId,
        user_id: UserId,
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        results: Arc<dyn ResultSink>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            quiz_id,
            user_id,
            clock,
            settings: TrackerSettings::default(),
            questions,
            results,
            store,
            quiz: None,
            session: None,
            current: None,
            cursor: 0,
            report: None,
            pending_result: None,
            result_id: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Current status. A tracker with no started session reads `InProgress`.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::InProgress, QuizSession::status)
    }

    /// Index of the question the cursor points at.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn result_id(&self) -> Option<ResultId> {
        self.result_id
    }

    /// Seconds left on the clock, or `None` when unlimited or not started.
    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u64> {
        let session = self.session.as_ref()?;
        session.remaining_seconds(self.clock.seconds_since(session.started_at()))
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.quiz.as_ref().map_or(0, Quiz::question_count);
        let answered = match (&self.session, &self.quiz) {
            (Some(session), Some(quiz)) => session.answered_count(quiz.questions()),
            _ => 0,
        };
        SessionProgress {
            total,
            answered,
            remaining: total - answered,
            current_index: self.cursor,
            status: self.status(),
            remaining_seconds: self.remaining_seconds(),
        }
    }

    /// The final report, available once the session is terminal.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` while the session is in progress.
    pub fn current_report(&self) -> Result<&ScoreReport, SessionError> {
        match (&self.report, self.status()) {
            (Some(report), status) if status.is_terminal() => Ok(report),
            (_, status) => Err(SessionError::InvalidTransition {
                operation: "current_report",
                status,
            }),
        }
    }

    /// Load the question at `index` and move the cursor there.
    ///
    /// The first load restores a stored session or starts a new one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` once terminal,
    /// `SessionError::NotFound` when the quiz has no question at `index`,
    /// and `SessionError::Storage` for collaborator failures.
    pub async fn load_question(&mut self, index: usize) -> Result<QuestionView, SessionError> {
        self.require_in_progress("load_question")?;
        self.ensure_session().await?;
        self.require_in_progress("load_question")?;

        let page = self
            .questions
            .fetch_question(self.quiz_id, index)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => SessionError::NotFound {
                    quiz_id: self.quiz_id,
                    index,
                },
                other => SessionError::Storage(other),
            })?;

        let session = self.started()?;
        let prior = session.prior_answer(page.question.id(), page.current_index);
        let view = QuestionView::build(&page, prior, session.can_reveal());

        self.cursor = page.current_index;
        self.current = Some(page);
        Ok(view)
    }

    /// Commit one answer.
    ///
    /// The record is written to the session store before it is kept in
    /// memory, so a failed write leaves the answers untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` once terminal,
    /// `SessionError::DuplicateAnswer` for an already answered question and
    /// `SessionError::Storage` if the session store rejects the write.
    pub async fn submit_answer(
        &mut self,
        submission: AnswerSubmission,
    ) -> Result<AnswerFeedback, SessionError> {
        self.require_in_progress("submit_answer")?;
        self.ensure_session().await?;
        self.require_in_progress("submit_answer")?;

        let question_id = submission.question_id;
        let question_index = submission.question_index;
        let mut next = self.started()?.clone();
        if let Err(err) = next.record_answer(AnswerRecord {
            question_id,
            question_index,
            question_text: submission.question_text,
            chosen_answer_text: submission.chosen_answer_text,
            chosen_answer_id: submission.chosen_answer_id,
            is_correct: submission.is_correct,
        }) {
            tracing::warn!(quiz_id = %self.quiz_id, %question_id, error = %err, "answer rejected");
            return Err(err.into());
        }

        self.store.save(self.quiz_id, &next.to_persisted()).await?;

        let can_reveal = next.can_reveal();
        self.session = Some(next);
        tracing::debug!(quiz_id = %self.quiz_id, %question_id, question_index, "answer recorded");

        let correct_answer_text = if can_reveal {
            self.quiz
                .as_ref()
                .and_then(|quiz| quiz.questions().iter().find(|q| q.id() == question_id))
                .map(Question::correct_answer_text)
        } else {
            None
        };
        let total = self.quiz.as_ref().map_or(0, Quiz::question_count);
        let is_last = question_index + 1 >= total;
        let next_index = if self.settings.auto_advance && !is_last {
            self.cursor = question_index + 1;
            Some(self.cursor)
        } else {
            None
        };

        Ok(AnswerFeedback {
            question_id,
            is_correct: can_reveal.then_some(submission.is_correct),
            correct_answer_text,
            is_last,
            next_index,
        })
    }

    /// Answer the loaded question with one of its options.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if no question is loaded,
    /// `SessionError::UnknownAnswer` if `answer_id` is not an option of it,
    /// plus everything `submit_answer` returns.
    pub async fn answer_current(
        &mut self,
        answer_id: AnswerId,
    ) -> Result<AnswerFeedback, SessionError> {
        self.require_in_progress("answer_current")?;
        let Some(page) = self.current.as_ref() else {
            return Err(SessionError::InvalidTransition {
                operation: "answer_current (no question loaded)",
                status: self.status(),
            });
        };
        let option = page
            .question
            .answer(answer_id)
            .ok_or(SessionError::UnknownAnswer(answer_id))?;
        let submission = AnswerSubmission {
            question_id: page.question.id(),
            question_index: page.current_index,
            chosen_answer_id: option.id,
            question_text: page.question.text().to_owned(),
            chosen_answer_text: option.text.clone(),
            is_correct: option.is_correct,
        };
        self.submit_answer(submission).await
    }

    /// Move the cursor to the next question and return its index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SequenceExhausted` at the last question and
    /// `SessionError::InvalidTransition` once terminal or before the first load.
    pub fn advance(&mut self) -> Result<usize, SessionError> {
        self.require_in_progress("advance")?;
        let Some(quiz) = self.quiz.as_ref() else {
            return Err(SessionError::InvalidTransition {
                operation: "advance (no question loaded)",
                status: self.status(),
            });
        };
        let next = self.cursor + 1;
        if next >= quiz.question_count() {
            return Err(SessionError::SequenceExhausted { index: self.cursor });
        }
        self.cursor = next;
        Ok(next)
    }

    /// Feed elapsed seconds since the session started into the countdown.
    ///
    /// Reaching zero expires the session and builds the report. Any tick
    /// after a terminal transition is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` before the session starts or
    /// when the quiz has no time limit.
    pub fn tick(&mut self, elapsed_seconds: u64) -> Result<TickOutcome, SessionError> {
        let quiz_id = self.quiz_id;
        let status = self.status();
        let (Some(session), Some(quiz)) = (self.session.as_mut(), self.quiz.as_ref()) else {
            return Err(SessionError::InvalidTransition {
                operation: "tick (session not started)",
                status,
            });
        };

        let outcome = session.tick(elapsed_seconds)?;
        match outcome {
            TickOutcome::Expired => {
                let report = session.report(quiz.questions());
                tracing::warn!(
                    %quiz_id,
                    score = report.score(),
                    max_score = report.max_score(),
                    "time expired"
                );
                self.report = Some(report);
            }
            TickOutcome::Running { remaining_seconds } => {
                tracing::debug!(%quiz_id, remaining_seconds, "tick");
            }
            TickOutcome::Inert => {}
        }
        Ok(outcome)
    }

    /// `tick` with elapsed time taken from the clock and the stored start time.
    ///
    /// # Errors
    ///
    /// Same as `tick`.
    pub fn tick_now(&mut self) -> Result<TickOutcome, SessionError> {
        let elapsed = self
            .session
            .as_ref()
            .map_or(0, |session| self.clock.seconds_since(session.started_at()));
        self.tick(elapsed)
    }

    /// Restore or start the session without loading a question.
    ///
    /// A stored attempt that was completed but never saved comes back
    /// `Completed`; `finalize` then retries its save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuiz` or `SessionError::Storage`.
    pub async fn resume(&mut self) -> Result<SessionStatus, SessionError> {
        self.ensure_session().await?;
        Ok(self.status())
    }

    /// Complete the session, score it and hand the result to the sink once.
    ///
    /// Completion is written to the session store before the sink is called,
    /// so a reload after a failed save still finds the attempt completed.
    /// A sink failure does not undo completion: the report is returned with
    /// `save_error` set, and calling `finalize` again retries only the save.
    /// A successful save discards the stored session record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session is already
    /// completed and saved, and `SessionError::Storage` if the session cannot
    /// be started or its completion cannot be stored; the session is left
    /// unchanged in that case.
    pub async fn finalize(&mut self) -> Result<FinalizeOutcome, SessionError> {
        self.ensure_session().await?;

        if self.status() == SessionStatus::Completed {
            if self.result_id.is_some() {
                return Err(SessionError::InvalidTransition {
                    operation: "finalize",
                    status: SessionStatus::Completed,
                });
            }
            let report = self.current_report()?.clone();
            tracing::info!(quiz_id = %self.quiz_id, "retrying result save");
            return Ok(self.save_result(report).await);
        }

        let (Some(session), Some(quiz)) = (self.session.as_ref(), self.quiz.as_ref()) else {
            return Err(SessionError::InvalidTransition {
                operation: "finalize (session not started)",
                status: SessionStatus::InProgress,
            });
        };
        let completed_at = self.clock.now();
        let mut completed = session.clone();
        completed.complete(completed_at)?;
        self.store
            .save(self.quiz_id, &completed.to_persisted())
            .await?;

        let report = completed.report(quiz.questions());
        self.pending_result = Some(NewQuizResult::from_report(
            self.quiz_id,
            self.user_id,
            quiz.title(),
            &report,
            completed_at,
        ));
        self.session = Some(completed);
        self.report = Some(report.clone());
        tracing::info!(quiz_id = %self.quiz_id, user_id = %self.user_id, "session completed");

        Ok(self.save_result(report).await)
    }

    /// Throw the attempt away and start over on the next `load_question`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the stored record cannot be cleared;
    /// in-memory state is kept in that case.
    pub async fn restart(&mut self) -> Result<(), SessionError> {
        self.store.clear(self.quiz_id).await?;
        self.session = None;
        self.current = None;
        self.cursor = 0;
        self.report = None;
        self.pending_result = None;
        self.result_id = None;
        tracing::info!(quiz_id = %self.quiz_id, user_id = %self.user_id, "session restarted");
        Ok(())
    }

    fn require_in_progress(&self, operation: &'static str) -> Result<(), SessionError> {
        let status = self.status();
        if status.is_terminal() {
            return Err(SessionError::InvalidTransition { operation, status });
        }
        Ok(())
    }

    fn started(&self) -> Result<&QuizSession, SessionError> {
        self.session.as_ref().ok_or(SessionError::InvalidTransition {
            operation: "session not started",
            status: SessionStatus::InProgress,
        })
    }

    async fn ensure_session(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Ok(());
        }

        let quiz = match self.quiz.take() {
            Some(quiz) => quiz,
            None => self
                .questions
                .fetch_quiz(self.quiz_id)
                .await
                .map_err(|err| match err {
                    StorageError::NotFound => SessionError::UnknownQuiz(self.quiz_id),
                    other => SessionError::Storage(other),
                })?,
        };

        let stored = match self.store.load(self.quiz_id).await {
            Ok(stored) => stored,
            Err(err) => {
                self.quiz = Some(quiz);
                return Err(err.into());
            }
        };
        let session = match stored {
            Some(persisted) => {
                tracing::info!(
                    quiz_id = %self.quiz_id,
                    user_id = %self.user_id,
                    started_at = %persisted.started_at,
                    "session restored"
                );
                QuizSession::restore(
                    self.quiz_id,
                    quiz.time_limit_minutes(),
                    quiz.reveal_policy(),
                    persisted,
                )
            }
            None => {
                let started_at = self.clock.now();
                if let Err(err) = self
                    .store
                    .save(self.quiz_id, &PersistedSession::fresh(started_at))
                    .await
                {
                    self.quiz = Some(quiz);
                    return Err(err.into());
                }
                tracing::info!(
                    quiz_id = %self.quiz_id,
                    user_id = %self.user_id,
                    %started_at,
                    "session created"
                );
                QuizSession::new(
                    self.quiz_id,
                    quiz.time_limit_minutes(),
                    quiz.reveal_policy(),
                    started_at,
                )
            }
        };

        if let Some(completed_at) = session.completed_at() {
            let report = session.report(quiz.questions());
            tracing::warn!(
                quiz_id = %self.quiz_id,
                user_id = %self.user_id,
                %completed_at,
                "completed session restored with unsaved result"
            );
            self.pending_result = Some(NewQuizResult::from_report(
                self.quiz_id,
                self.user_id,
                quiz.title(),
                &report,
                completed_at,
            ));
            self.report = Some(report);
        }

        self.quiz = Some(quiz);
        self.session = Some(session);
        Ok(())
    }

    async fn save_result(&mut self, report: ScoreReport) -> FinalizeOutcome {
        let Some(result) = self.pending_result.as_ref() else {
            return FinalizeOutcome {
                report,
                result_id: self.result_id,
                save_error: None,
            };
        };

        match self.results.save_result(result).await {
            Ok(result_id) => {
                self.result_id = Some(result_id);
                self.pending_result = None;
                tracing::info!(
                    quiz_id = %self.quiz_id,
                    %result_id,
                    score = report.score(),
                    max_score = report.max_score(),
                    "result saved"
                );
                if let Err(err) = self.store.clear(self.quiz_id).await {
                    tracing::warn!(quiz_id = %self.quiz_id, error = %err, "stored session not cleared");
                }
                FinalizeOutcome {
                    report,
                    result_id: Some(result_id),
                    save_error: None,
                }
            }
            Err(err) => {
                tracing::warn!(quiz_id = %self.quiz_id, error = %err, "result not saved");
                FinalizeOutcome {
                    report,
                    result_id: None,
                    save_error: Some(SessionError::Persistence(err)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerOption, Question, QuestionId, RevealPolicy};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, QuizRepository};

    async fn tracker() -> (InMemoryRepository, QuizSessionTracker) {
        let repo = InMemoryRepository::new();
        let question = Question::new(
            QuestionId::new(1),
            "Only question",
            vec![
                AnswerOption::new(AnswerId::new(1), "yes", true),
                AnswerOption::new(AnswerId::new(2), "no", false),
            ],
        )
        .unwrap();
        let quiz = Quiz::new(QuizId::new(5), "Single", vec![question], fixed_now())
            .unwrap()
            .with_time_limit(2)
            .with_reveal_policy(RevealPolicy::Deferred);
        repo.upsert_quiz(&quiz).await.unwrap();

        let tracker = QuizSessionTracker::new(
            QuizId::new(5),
            UserId::new(1),
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.session_store(UserId::new(1))),
        );
        (repo, tracker)
    }

    #[tokio::test]
    async fn unstarted_tracker_reads_in_progress_and_has_no_report() {
        let (_repo, mut tracker) = tracker().await;
        assert_eq!(tracker.status(), SessionStatus::InProgress);
        assert_eq!(tracker.progress().total, 0);
        assert_eq!(tracker.remaining_seconds(), None);
        assert!(tracker.current_report().is_err());
        assert!(matches!(
            tracker.tick(5),
            Err(SessionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            tracker.answer_current(AnswerId::new(1)).await,
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn first_load_persists_baseline_and_reports_progress() {
        let (repo, mut tracker) = tracker().await;
        let view = tracker.load_question(0).await.unwrap();
        assert!(view.is_last);
        assert_eq!(view.reveal_policy, RevealPolicy::Deferred);

        let stored = repo
            .session_store(UserId::new(1))
            .load(QuizId::new(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.started_at, fixed_now());
        assert!(stored.answers.is_empty());

        let progress = tracker.progress();
        assert_eq!((progress.total, progress.answered, progress.remaining), (1, 0, 1));
        assert_eq!(progress.remaining_seconds, Some(120));
        assert!(!progress.is_complete());
    }

    #[tokio::test]
    async fn answer_must_belong_to_loaded_question() {
        let (_repo, mut tracker) = tracker().await;
        tracker.load_question(0).await.unwrap();
        assert!(matches!(
            tracker.answer_current(AnswerId::new(9)).await,
            Err(SessionError::UnknownAnswer(id)) if id == AnswerId::new(9)
        ));
        assert_eq!(tracker.progress().answered, 0);
    }
}
