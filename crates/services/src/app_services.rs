use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::catalog::QuizCatalogService;
use crate::error::AppServicesError;
use crate::results::ResultHistoryService;
use crate::sessions::{QuizLoopService, TrackerSettings};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<QuizCatalogService>,
    quiz_loop: Arc<QuizLoopService>,
    history: Arc<ResultHistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: TrackerSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: TrackerSettings) -> Self {
        let catalog = Arc::new(QuizCatalogService::new(Arc::clone(&storage.quizzes)));
        let quiz_loop = Arc::new(
            QuizLoopService::new(
                clock,
                Arc::clone(&storage.questions),
                Arc::clone(&storage.results),
                Arc::clone(&storage.sessions),
            )
            .with_settings(settings),
        );
        let history = Arc::new(ResultHistoryService::new(Arc::clone(&storage.history)));

        Self {
            catalog,
            quiz_loop,
            history,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<QuizCatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn history(&self) -> Arc<ResultHistoryService> {
        Arc::clone(&self.history)
    }
}
