use async_trait::async_trait;
use quiz_core::model::{
    AnswerDetail, NewQuizResult, PersistedSession, Question, QuestionPage, Quiz, QuizId,
    QuizResult, QuizSummary, ResultId, UserId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Serves quiz content to a session, one question at a time or as a whole.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the question at `index` with the quiz metadata.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz is missing or `index` is out of range.
    async fn fetch_question(&self, quiz_id: QuizId, index: usize)
    -> Result<QuestionPage, StorageError>;

    /// Fetch the quiz with its full ordered question list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz is missing.
    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<Quiz, StorageError>;
}

/// Catalog of quizzes.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Insert a quiz or replace it together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if question or answer ids collide with another quiz.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// List every quiz, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, StorageError>;
}

/// Durable destination for finalized results. Treated as fallible by callers.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a finalized result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result could not be stored.
    async fn save_result(&self, result: &NewQuizResult) -> Result<ResultId, StorageError>;
}

/// Read side of stored results, newest first.
#[async_trait]
pub trait ResultHistoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<QuizResult>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_all_results(&self, limit: u32) -> Result<Vec<QuizResult>, StorageError>;

    /// Per-question breakdown saved with a result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no result has this id.
    async fn result_details(&self, id: ResultId) -> Result<Vec<AnswerDetail>, StorageError>;
}

/// Per-client key-value store for in-progress sessions, keyed by quiz id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load(&self, quiz_id: QuizId) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the stored record for `quiz_id` as a whole.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record could not be written; the previous record is kept.
    async fn save(&self, quiz_id: QuizId, session: &PersistedSession)
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear(&self, quiz_id: QuizId) -> Result<(), StorageError>;
}

/// Backend holding session records for many users.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<PersistedSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn save_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        session: &PersistedSession,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_session(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), StorageError>;
}

/// `SessionStore` view of a `SessionBackend`, scoped to one user.
#[derive(Clone)]
pub struct ScopedSessionStore {
    backend: Arc<dyn SessionBackend>,
    user_id: UserId,
}

impl ScopedSessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>, user_id: UserId) -> Self {
        Self { backend, user_id }
    }
}

#[async_trait]
impl SessionStore for ScopedSessionStore {
    async fn load(&self, quiz_id: QuizId) -> Result<Option<PersistedSession>, StorageError> {
        self.backend.load_session(self.user_id, quiz_id).await
    }

    async fn save(
        &self,
        quiz_id: QuizId,
        session: &PersistedSession,
    ) -> Result<(), StorageError> {
        self.backend.save_session(self.user_id, quiz_id, session).await
    }

    async fn clear(&self, quiz_id: QuizId) -> Result<(), StorageError> {
        self.backend.clear_session(self.user_id, quiz_id).await
    }
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StoredResult {
    result: QuizResult,
    details: Vec<AnswerDetail>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<BTreeMap<QuizId, Quiz>>>,
    results: Arc<Mutex<Vec<StoredResult>>>,
    sessions: Arc<Mutex<HashMap<(UserId, QuizId), PersistedSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session store for one user backed by this repository.
    #[must_use]
    pub fn session_store(&self, user_id: UserId) -> ScopedSessionStore {
        ScopedSessionStore::new(Arc::new(self.clone()), user_id)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn newest_first(results: &mut [QuizResult]) {
    results.sort_by(|a, b| {
        b.completed_at()
            .cmp(&a.completed_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch_question(
        &self,
        quiz_id: QuizId,
        index: usize,
    ) -> Result<QuestionPage, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        guard
            .get(&quiz_id)
            .and_then(|quiz| quiz.page(index))
            .ok_or(StorageError::NotFound)
    }

    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<Quiz, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        guard.get(&quiz_id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        let question_ids: HashSet<_> = quiz.questions().iter().map(Question::id).collect();
        let answer_ids: HashSet<_> = quiz
            .questions()
            .iter()
            .flat_map(|q| q.answers().iter().map(|a| a.id))
            .collect();
        let collides = guard
            .values()
            .filter(|other| other.id() != quiz.id())
            .flat_map(|other| other.questions())
            .any(|q| {
                question_ids.contains(&q.id())
                    || q.answers().iter().any(|a| answer_ids.contains(&a.id))
            });
        if collides {
            return Err(StorageError::Conflict);
        }
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.values().map(Quiz::summary).collect())
    }
}

#[async_trait]
impl ResultSink for InMemoryRepository {
    async fn save_result(&self, result: &NewQuizResult) -> Result<ResultId, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        let next = u64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("result id overflow".into()))?
            + 1;
        let id = ResultId::new(next);
        let stored = QuizResult::from_persisted(
            id,
            result.quiz_id,
            result.user_id,
            result.quiz_title.clone(),
            result.score,
            result.max_score,
            result.completed_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.push(StoredResult {
            result: stored,
            details: result.details.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl ResultHistoryRepository for InMemoryRepository {
    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<QuizResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut out: Vec<_> = guard
            .iter()
            .filter(|s| s.result.user_id() == user_id)
            .map(|s| s.result.clone())
            .collect();
        newest_first(&mut out);
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }

    async fn list_all_results(&self, limit: u32) -> Result<Vec<QuizResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut out: Vec<_> = guard.iter().map(|s| s.result.clone()).collect();
        newest_first(&mut out);
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }

    async fn result_details(&self, id: ResultId) -> Result<Vec<AnswerDetail>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|s| s.result.id() == id)
            .map(|s| s.details.clone())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SessionBackend for InMemoryRepository {
    async fn load_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<PersistedSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, quiz_id)).cloned())
    }

    async fn save_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        session: &PersistedSession,
    ) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.insert((user_id, quiz_id), session.clone());
        Ok(())
    }

    async fn clear_session(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.remove(&(user_id, quiz_id));
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub results: Arc<dyn ResultSink>,
    pub history: Arc<dyn ResultHistoryRepository>,
    pub sessions: Arc<dyn SessionBackend>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            history: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        }
    }

    /// Session store holding `user_id`'s in-progress attempts.
    #[must_use]
    pub fn session_store(&self, user_id: UserId) -> Arc<dyn SessionStore> {
        Arc::new(ScopedSessionStore::new(Arc::clone(&self.sessions), user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{AnswerId, AnswerOption, Question, QuestionId};
    use quiz_core::time::fixed_now;

    fn build_quiz(id: u64, first_question: u64) -> Quiz {
        let questions = (first_question..first_question + 2)
            .map(|qid| {
                Question::new(
                    QuestionId::new(qid),
                    format!("Q{qid}"),
                    vec![
                        AnswerOption::new(AnswerId::new(qid * 10), "yes", true),
                        AnswerOption::new(AnswerId::new(qid * 10 + 1), "no", false),
                    ],
                )
                .unwrap()
            })
            .collect();
        Quiz::new(QuizId::new(id), format!("Quiz {id}"), questions, fixed_now()).unwrap()
    }

    fn new_result(user: u64, score: u32, minutes_ago: i64) -> NewQuizResult {
        NewQuizResult {
            quiz_id: QuizId::new(1),
            user_id: UserId::new(user),
            quiz_title: "Quiz 1".into(),
            score,
            max_score: 2,
            details: Vec::new(),
            completed_at: fixed_now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn serves_pages_and_reports_out_of_range() {
        let repo = InMemoryRepository::new();
        repo.upsert_quiz(&build_quiz(1, 1)).await.unwrap();

        let page = repo.fetch_question(QuizId::new(1), 1).await.unwrap();
        assert_eq!(page.question.id(), QuestionId::new(2));
        assert_eq!(page.total_questions, 2);

        let err = repo.fetch_question(QuizId::new(1), 2).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        let err = repo.fetch_quiz(QuizId::new(9)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn upsert_rejects_question_ids_owned_by_another_quiz() {
        let repo = InMemoryRepository::new();
        repo.upsert_quiz(&build_quiz(1, 1)).await.unwrap();
        let err = repo.upsert_quiz(&build_quiz(2, 2)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        repo.upsert_quiz(&build_quiz(1, 1)).await.unwrap();
        assert_eq!(repo.list_quizzes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_answer_ids_owned_by_another_quiz() {
        let repo = InMemoryRepository::new();
        repo.upsert_quiz(&build_quiz(1, 1)).await.unwrap();

        let reused = Question::new(
            QuestionId::new(50),
            "Q50",
            vec![
                AnswerOption::new(AnswerId::new(10), "yes", true),
                AnswerOption::new(AnswerId::new(501), "no", false),
            ],
        )
        .unwrap();
        let quiz = Quiz::new(QuizId::new(2), "Quiz 2", vec![reused], fixed_now()).unwrap();
        let err = repo.upsert_quiz(&quiz).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.list_quizzes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped_by_user() {
        let repo = InMemoryRepository::new();
        repo.save_result(&new_result(1, 1, 30)).await.unwrap();
        let newest = repo.save_result(&new_result(1, 2, 5)).await.unwrap();
        repo.save_result(&new_result(2, 0, 1)).await.unwrap();

        let mine = repo.list_results_for_user(UserId::new(1), 10).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id(), newest);

        let all = repo.list_all_results(2).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_id(), UserId::new(2));
    }

    #[tokio::test]
    async fn session_stores_are_isolated_per_user() {
        let repo = InMemoryRepository::new();
        let alice = repo.session_store(UserId::new(1));
        let bob = repo.session_store(UserId::new(2));

        alice
            .save(QuizId::new(1), &PersistedSession::fresh(fixed_now()))
            .await
            .unwrap();
        assert!(alice.load(QuizId::new(1)).await.unwrap().is_some());
        assert!(bob.load(QuizId::new(1)).await.unwrap().is_none());

        alice.clear(QuizId::new(1)).await.unwrap();
        assert!(alice.load(QuizId::new(1)).await.unwrap().is_none());
    }
}
