use std::sync::Arc;

use quiz_core::model::{QuizId, UserId};
use storage::repository::{QuestionSource, ResultSink, ScopedSessionStore, SessionBackend};

use super::service::{QuizSessionTracker, TrackerSettings};
use crate::Clock;

/// Opens trackers that share one clock, settings and storage backend.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    settings: TrackerSettings,
    questions: Arc<dyn QuestionSource>,
    results: Arc<dyn ResultSink>,
    sessions: Arc<dyn SessionBackend>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        results: Arc<dyn ResultSink>,
        sessions: Arc<dyn SessionBackend>,
    ) -> Self {
        Self {
            clock,
            settings: TrackerSettings::default(),
            questions,
            results,
            sessions,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }

    /// Tracker for `user_id` taking `quiz_id`, with session records scoped to that user.
    ///
    /// Nothing is fetched until the first `load_question`.
    #[must_use]
    pub fn open(&self, quiz_id: QuizId, user_id: UserId) -> QuizSessionTracker {
        let store = ScopedSessionStore::new(Arc::clone(&self.sessions), user_id);
        QuizSessionTracker::new(
            quiz_id,
            user_id,
            self.clock,
            Arc::clone(&self.questions),
            Arc::clone(&self.results),
            Arc::new(store),
        )
        .with_settings(self.settings)
    }
}
