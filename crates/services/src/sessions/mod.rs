mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{FinalizeOutcome, QuizSessionTracker, TrackerSettings};
pub use view::{AnswerChoice, AnswerFeedback, AnswerSubmission, PriorChoice, QuestionView};
pub use workflow::QuizLoopService;
