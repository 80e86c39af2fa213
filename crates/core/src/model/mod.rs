mod answers;
mod ids;
mod quiz;
mod report;
mod result;
mod session;

pub use answers::{AnswerRecord, AnswerSet, IndexedAnswer, PersistedSession};
pub use ids::{AnswerId, IdParseError, QuestionId, QuizId, ResultId, UserId};
pub use quiz::{AnswerOption, Question, QuestionPage, Quiz, QuizError, QuizSummary, RevealPolicy};
pub use report::{AnswerDetail, Grade, NOT_ANSWERED, ScoreReport, percentage};
pub use result::{NewQuizResult, QuizResult, ResultError};
pub use session::{
    PriorAnswer, QuizSession, SessionStateError, SessionStatus, TickOutcome,
};
