#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod results;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use catalog::QuizCatalogService;
pub use error::{AppServicesError, CatalogError, HistoryError, SessionError};
pub use results::{ResultHistoryService, ResultListItem};
pub use sessions::{
    AnswerChoice, AnswerFeedback, AnswerSubmission, FinalizeOutcome, PriorChoice, QuestionView,
    QuizLoopService, QuizSessionTracker, SessionProgress, TrackerSettings,
};
