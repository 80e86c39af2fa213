use serde::{Deserialize, Serialize};

use crate::model::answers::AnswerSet;
use crate::model::ids::QuestionId;
use crate::model::quiz::Question;

/// Text shown in place of a user answer for questions left unanswered.
pub const NOT_ANSWERED: &str = "not answered";

/// One line of a score report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
    pub question_index: usize,
    pub question_id: QuestionId,
    pub question_text: String,
    pub user_answer_text: String,
    /// `None` when correct answers may not be revealed yet.
    pub correct_answer_text: Option<String>,
    pub is_correct: bool,
}

/// Score of one attempt, derived on demand and never stored on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    score: u32,
    max_score: u32,
    details: Vec<AnswerDetail>,
}

impl ScoreReport {
    /// Score `answers` against the full ordered question list.
    ///
    /// Every question counts toward `max_score`; unanswered ones are incorrect. Answered
    /// questions use the snapshot taken at commit time, so later edits to question content
    /// do not change the result. Answers for questions not in `questions` are ignored.
    #[must_use]
    pub fn compute(questions: &[Question], answers: &AnswerSet, reveal_correct: bool) -> Self {
        let mut details = Vec::with_capacity(questions.len());
        let mut score = 0_u32;

        for (index, question) in questions.iter().enumerate() {
            let correct_answer_text = reveal_correct.then(|| question.correct_answer_text());
            let detail = match answers.get(question.id()) {
                Some(record) => AnswerDetail {
                    question_index: index,
                    question_id: question.id(),
                    question_text: record.question_text.clone(),
                    user_answer_text: record.chosen_answer_text.clone(),
                    correct_answer_text,
                    is_correct: record.is_correct,
                },
                None => AnswerDetail {
                    question_index: index,
                    question_id: question.id(),
                    question_text: question.text().to_owned(),
                    user_answer_text: NOT_ANSWERED.to_owned(),
                    correct_answer_text,
                    is_correct: false,
                },
            };
            if detail.is_correct {
                score = score.saturating_add(1);
            }
            details.push(detail);
        }

        Self {
            score,
            max_score: u32::try_from(questions.len()).unwrap_or(u32::MAX),
            details,
        }
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn details(&self) -> &[AnswerDetail] {
        &self.details
    }

    #[must_use]
    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.max_score)
    }

    #[must_use]
    pub fn grade(&self) -> Grade {
        Grade::from_percentage(self.percentage())
    }
}

/// `score / max_score` as a whole percentage, rounded half up. Zero when `max_score` is zero.
#[must_use]
pub fn percentage(score: u32, max_score: u32) -> u32 {
    if max_score == 0 {
        return 0;
    }
    let (score, max) = (u64::from(score), u64::from(max_score));
    let rounded = (score * 200 + max) / (max * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

//
// ─── GRADE ─────────────────────────────────────────────────────────────────────
//

/// Five-point school mark bucketed from a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Unsatisfactory,
    Satisfactory,
    Good,
    Excellent,
}

impl Grade {
    #[must_use]
    pub fn from_percentage(percent: u32) -> Self {
        if percent >= 90 {
            Grade::Excellent
        } else if percent >= 75 {
            Grade::Good
        } else if percent >= 60 {
            Grade::Satisfactory
        } else {
            Grade::Unsatisfactory
        }
    }

    #[must_use]
    pub fn mark(self) -> u8 {
        match self {
            Grade::Excellent => 5,
            Grade::Good => 4,
            Grade::Satisfactory => 3,
            Grade::Unsatisfactory => 2,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::Satisfactory => "satisfactory",
            Grade::Unsatisfactory => "unsatisfactory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::answers::AnswerRecord;
    use crate::model::ids::AnswerId;
    use crate::model::quiz::AnswerOption;

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![
                AnswerOption::new(AnswerId::new(id * 10 + 1), "right", true),
                AnswerOption::new(AnswerId::new(id * 10 + 2), "wrong", false),
            ],
        )
        .unwrap()
    }

    fn answered(id: u64, index: usize, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            question_index: index,
            question_text: format!("Q{id} as asked"),
            chosen_answer_text: if is_correct { "right" } else { "wrong" }.into(),
            chosen_answer_id: AnswerId::new(id * 10 + if is_correct { 1 } else { 2 }),
            is_correct,
        }
    }

    #[test]
    fn unanswered_questions_count_against_max_score() {
        let questions = vec![question(1), question(2), question(3)];
        let mut answers = AnswerSet::new();
        answers.insert(answered(1, 0, true));
        answers.insert(answered(3, 2, false));

        let report = ScoreReport::compute(&questions, &answers, true);
        assert_eq!(report.score(), 1);
        assert_eq!(report.max_score(), 3);

        let q2 = &report.details()[1];
        assert_eq!(q2.user_answer_text, NOT_ANSWERED);
        assert!(!q2.is_correct);
        assert_eq!(q2.correct_answer_text.as_deref(), Some("right"));
    }

    #[test]
    fn details_follow_sequence_order_not_insertion_order() {
        let questions = vec![question(1), question(2), question(3)];
        let mut answers = AnswerSet::new();
        answers.insert(answered(2, 1, true));
        answers.insert(answered(1, 0, true));
        answers.insert(answered(3, 2, true));

        let report = ScoreReport::compute(&questions, &answers, true);
        let order: Vec<_> = report.details().iter().map(|d| d.question_id.value()).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(report.score(), 3);
    }

    #[test]
    fn snapshot_correctness_is_not_recomputed() {
        let questions = vec![question(1)];
        let mut answers = AnswerSet::new();
        let mut rec = answered(1, 0, false);
        rec.chosen_answer_id = AnswerId::new(11);
        answers.insert(rec);

        let report = ScoreReport::compute(&questions, &answers, false);
        assert_eq!(report.score(), 0);
        assert_eq!(report.details()[0].question_text, "Q1 as asked");
        assert!(report.details()[0].correct_answer_text.is_none());
    }

    #[test]
    fn answers_for_unknown_questions_are_ignored() {
        let questions = vec![question(1)];
        let mut answers = AnswerSet::new();
        answers.insert(answered(9, 4, true));

        let report = ScoreReport::compute(&questions, &answers, true);
        assert_eq!(report.score(), 0);
        assert_eq!(report.max_score(), 1);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_percentage(100), Grade::Excellent);
        assert_eq!(Grade::from_percentage(90), Grade::Excellent);
        assert_eq!(Grade::from_percentage(89), Grade::Good);
        assert_eq!(Grade::from_percentage(75), Grade::Good);
        assert_eq!(Grade::from_percentage(74), Grade::Satisfactory);
        assert_eq!(Grade::from_percentage(60), Grade::Satisfactory);
        assert_eq!(Grade::from_percentage(59), Grade::Unsatisfactory);
        assert_eq!(Grade::Excellent.mark(), 5);
        assert_eq!(Grade::Unsatisfactory.mark(), 2);
    }
}
