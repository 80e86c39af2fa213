use quiz_core::model::{
    AnswerId, PriorAnswer, QuestionId, QuestionPage, RevealPolicy,
};

/// One selectable option as presented to the user.
///
/// `is_correct` is `None` whenever correctness may not be shown yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerChoice {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: Option<bool>,
}

/// A previously committed choice, re-hydrated when a question is shown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorChoice {
    pub answer_id: AnswerId,
    pub is_correct: Option<bool>,
}

/// Presentation-agnostic view of the loaded question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub quiz_title: String,
    pub question_id: QuestionId,
    pub question_index: usize,
    pub total_questions: usize,
    pub text: String,
    pub answers: Vec<AnswerChoice>,
    pub prior: Option<PriorChoice>,
    pub time_limit_minutes: u32,
    pub reveal_policy: RevealPolicy,
    pub is_last: bool,
}

impl QuestionView {
    pub(crate) fn build(page: &QuestionPage, prior: Option<PriorAnswer>, can_reveal: bool) -> Self {
        let reveal = |flag: bool| can_reveal.then_some(flag);
        Self {
            quiz_title: page.quiz_title.clone(),
            question_id: page.question.id(),
            question_index: page.current_index,
            total_questions: page.total_questions,
            text: page.question.text().to_owned(),
            answers: page
                .question
                .answers()
                .iter()
                .map(|option| AnswerChoice {
                    id: option.id,
                    text: option.text.clone(),
                    is_correct: reveal(option.is_correct),
                })
                .collect(),
            prior: prior.map(|prior| PriorChoice {
                answer_id: prior.answer_id,
                is_correct: reveal(prior.is_correct),
            }),
            time_limit_minutes: page.time_limit_minutes,
            reveal_policy: page.reveal_policy,
            is_last: page.is_last(),
        }
    }

    /// Whether the user already answered this question.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.prior.is_some()
    }
}

/// Everything needed to commit one answer.
///
/// Texts and correctness are snapshots taken when the question was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub question_index: usize,
    pub chosen_answer_id: AnswerId,
    pub question_text: String,
    pub chosen_answer_text: String,
    pub is_correct: bool,
}

/// What the user learns right after answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    /// Hidden under deferred reveal.
    pub is_correct: Option<bool>,
    pub correct_answer_text: Option<String>,
    /// The caller should finalize next.
    pub is_last: bool,
    /// Set when auto-advance moved the cursor.
    pub next_index: Option<usize>,
}
