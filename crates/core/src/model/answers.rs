use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};

use crate::model::ids::{AnswerId, QuestionId};
use crate::model::quiz::Question;

/// A committed answer, snapshotted at commit time so reports never re-fetch questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    /// Position in the quiz's question sequence; the only reliable sort key.
    pub question_index: usize,
    pub question_text: String,
    pub chosen_answer_text: String,
    pub chosen_answer_id: AnswerId,
    pub is_correct: bool,
}

/// Older array-indexed answer shape, positioned by question index and lacking a question id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedAnswer {
    pub answer_id: AnswerId,
    pub is_correct: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub user_answer_text: String,
    #[serde(default)]
    pub correct_answer_text: Option<String>,
}

impl IndexedAnswer {
    /// Key this entry by the question found at its position.
    ///
    /// Snapshotted texts win; blanks fall back to the question's current content.
    #[must_use]
    pub fn into_record(self, question_index: usize, question: &Question) -> AnswerRecord {
        let question_text = if self.question_text.is_empty() {
            question.text().to_owned()
        } else {
            self.question_text
        };
        let chosen_answer_text = if self.user_answer_text.is_empty() {
            question
                .answer(self.answer_id)
                .map(|a| a.text.clone())
                .unwrap_or_default()
        } else {
            self.user_answer_text
        };

        AnswerRecord {
            question_id: question.id(),
            question_index,
            question_text,
            chosen_answer_text,
            chosen_answer_id: self.answer_id,
            is_correct: self.is_correct,
        }
    }
}

/// Canonical answer mapping: question id to its committed record.
///
/// Records are always keyed by their own `question_id`, and an existing entry is never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<QuestionId, AnswerRecord>);

impl AnswerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its question already has one.
    ///
    /// Returns `false` and leaves the set untouched on a duplicate.
    pub fn insert(&mut self, record: AnswerRecord) -> bool {
        match self.0.entry(record.question_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.0.get(&question_id)
    }

    #[must_use]
    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.0.contains_key(&question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.0.values()
    }

    /// Merge both stored shapes into the canonical mapping for `questions`.
    ///
    /// Id-keyed entries win over an indexed entry for the same question. Indexed entries
    /// whose position has no question are dropped.
    #[must_use]
    pub fn normalize(
        &self,
        indexed: &[Option<IndexedAnswer>],
        questions: &[Question],
    ) -> AnswerSet {
        let mut merged = self.clone();
        for (index, entry) in indexed.iter().enumerate() {
            let (Some(entry), Some(question)) = (entry, questions.get(index)) else {
                continue;
            };
            merged.insert(entry.clone().into_record(index, question));
        }
        merged
    }
}

/// What a session store keeps per quiz id: the answers so far and the timer baseline.
///
/// `completed_at` is set once the attempt is finished but its result is not yet saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub answers: AnswerSet,
    #[serde(default, alias = "answersByIndex")]
    pub indexed_answers: Vec<Option<IndexedAnswer>>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    #[must_use]
    pub fn fresh(started_at: DateTime<Utc>) -> Self {
        Self {
            answers: AnswerSet::new(),
            indexed_answers: Vec::new(),
            started_at,
            completed_at: None,
        }
    }
}
