#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, QuestionSource, QuizRepository, ResultHistoryRepository, ResultSink,
    ScopedSessionStore, SessionBackend, SessionStore, Storage, StorageError,
};
