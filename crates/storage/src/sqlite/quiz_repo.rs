use quiz_core::model::{AnswerOption, Question, QuestionPage, Quiz, QuizId, QuizSummary, RevealPolicy};
use sqlx::Row;
use std::collections::HashMap;

use super::SqliteRepository;
use super::mapping::{
    answer_id_from_i64, db, id_i64, question_id_from_i64, quiz_id_from_i64, ser, u32_from_i64,
};
use crate::repository::{QuestionSource, QuizRepository, StorageError};

fn position_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}

impl SqliteRepository {
    async fn load_quiz(&self, quiz_id: QuizId) -> Result<Quiz, StorageError> {
        let quiz_key = id_i64("quiz_id", quiz_id.value())?;

        let quiz_row = sqlx::query(
            r"
                SELECT id, title, author, created_at, time_limit_minutes, reveal_policy
                FROM quizzes
                WHERE id = ?1
            ",
        )
        .bind(quiz_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;

        let question_rows = sqlx::query(
            r"
                SELECT id, text
                FROM questions
                WHERE quiz_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(quiz_key)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let option_rows = sqlx::query(
            r"
                SELECT a.id, a.question_id, a.text, a.is_correct
                FROM answer_options a
                JOIN questions q ON q.id = a.question_id
                WHERE q.quiz_id = ?1
                ORDER BY a.question_id ASC, a.position ASC
            ",
        )
        .bind(quiz_key)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut options: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for row in &option_rows {
            let question_key: i64 = row.try_get("question_id").map_err(ser)?;
            let option = AnswerOption::new(
                answer_id_from_i64(row.try_get("id").map_err(ser)?)?,
                row.try_get::<String, _>("text").map_err(ser)?,
                row.try_get::<bool, _>("is_correct").map_err(ser)?,
            );
            options.entry(question_key).or_default().push(option);
        }

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in &question_rows {
            let question_key: i64 = row.try_get("id").map_err(ser)?;
            let question = Question::new(
                question_id_from_i64(question_key)?,
                row.try_get::<String, _>("text").map_err(ser)?,
                options.remove(&question_key).unwrap_or_default(),
            )
            .map_err(ser)?;
            questions.push(question);
        }

        let policy: String = quiz_row.try_get("reveal_policy").map_err(ser)?;
        let mut quiz = Quiz::new(
            quiz_id,
            quiz_row.try_get::<String, _>("title").map_err(ser)?,
            questions,
            quiz_row.try_get("created_at").map_err(ser)?,
        )
        .map_err(ser)?
        .with_time_limit(u32_from_i64(
            "time_limit_minutes",
            quiz_row.try_get("time_limit_minutes").map_err(ser)?,
        )?)
        .with_reveal_policy(policy.parse::<RevealPolicy>().map_err(ser)?);
        if let Some(author) = quiz_row.try_get::<Option<String>, _>("author").map_err(ser)? {
            quiz = quiz.with_author(author);
        }
        Ok(quiz)
    }
}

#[async_trait::async_trait]
impl QuestionSource for SqliteRepository {
    async fn fetch_question(
        &self,
        quiz_id: QuizId,
        index: usize,
    ) -> Result<QuestionPage, StorageError> {
        self.load_quiz(quiz_id)
            .await?
            .page(index)
            .ok_or(StorageError::NotFound)
    }

    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<Quiz, StorageError> {
        self.load_quiz(quiz_id).await
    }
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let quiz_key = id_i64("quiz_id", quiz.id().value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
                INSERT INTO quizzes (id, title, author, created_at, time_limit_minutes, reveal_policy)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    time_limit_minutes = excluded.time_limit_minutes,
                    reveal_policy = excluded.reveal_policy
            ",
        )
        .bind(quiz_key)
        .bind(quiz.title())
        .bind(quiz.author())
        .bind(quiz.created_at())
        .bind(i64::from(quiz.time_limit_minutes()))
        .bind(quiz.reveal_policy().as_str())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        // Replacing the question list cascades to answer options.
        sqlx::query("DELETE FROM questions WHERE quiz_id = ?1")
            .bind(quiz_key)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (position, question) in quiz.questions().iter().enumerate() {
            let question_key = id_i64("question_id", question.id().value())?;
            sqlx::query(
                r"
                    INSERT INTO questions (id, quiz_id, position, text)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(question_key)
            .bind(quiz_key)
            .bind(position_i64(position)?)
            .bind(question.text())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

            for (option_position, option) in question.answers().iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO answer_options (id, question_id, position, text, is_correct)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(id_i64("answer_id", option.id.value())?)
                .bind(question_key)
                .bind(position_i64(option_position)?)
                .bind(option.text.as_str())
                .bind(option.is_correct)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
            }
        }

        tx.commit().await.map_err(db)?;
        tracing::debug!(quiz_id = %quiz.id(), questions = quiz.question_count(), "stored quiz");
        Ok(())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT z.id, z.title, z.time_limit_minutes, z.reveal_policy,
                       COUNT(q.id) AS question_count
                FROM quizzes z
                LEFT JOIN questions q ON q.quiz_id = z.id
                GROUP BY z.id
                ORDER BY z.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let policy: String = row.try_get("reveal_policy").map_err(ser)?;
            let count: i64 = row.try_get("question_count").map_err(ser)?;
            out.push(QuizSummary {
                id: quiz_id_from_i64(row.try_get("id").map_err(ser)?)?,
                title: row.try_get("title").map_err(ser)?,
                question_count: usize::try_from(count).map_err(ser)?,
                time_limit_minutes: u32_from_i64(
                    "time_limit_minutes",
                    row.try_get("time_limit_minutes").map_err(ser)?,
                )?,
                reveal_policy: policy.parse().map_err(ser)?,
            });
        }
        Ok(out)
    }
}
