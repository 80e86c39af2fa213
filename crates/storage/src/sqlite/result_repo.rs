use quiz_core::model::{AnswerDetail, NewQuizResult, QuizResult, ResultId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    db, id_i64, quiz_id_from_i64, result_id_from_i64, ser, u32_from_i64, user_id_from_i64,
};
use crate::repository::{ResultHistoryRepository, ResultSink, StorageError};

fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizResult, StorageError> {
    QuizResult::from_persisted(
        result_id_from_i64(row.try_get("id").map_err(ser)?)?,
        quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        row.try_get::<String, _>("quiz_title").map_err(ser)?,
        u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
        u32_from_i64("max_score", row.try_get("max_score").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ResultSink for SqliteRepository {
    async fn save_result(&self, result: &NewQuizResult) -> Result<ResultId, StorageError> {
        let details = serde_json::to_string(&result.details).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_results (
                    quiz_id, user_id, quiz_title, score, max_score, details, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_i64("quiz_id", result.quiz_id.value())?)
        .bind(id_i64("user_id", result.user_id.value())?)
        .bind(result.quiz_title.as_str())
        .bind(i64::from(result.score))
        .bind(i64::from(result.max_score))
        .bind(details)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        result_id_from_i64(res.last_insert_rowid())
    }
}

#[async_trait::async_trait]
impl ResultHistoryRepository for SqliteRepository {
    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<QuizResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, quiz_id, user_id, quiz_title, score, max_score, completed_at
                FROM quiz_results
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn list_all_results(&self, limit: u32) -> Result<Vec<QuizResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, quiz_id, user_id, quiz_title, score, max_score, completed_at
                FROM quiz_results
                ORDER BY completed_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn result_details(&self, id: ResultId) -> Result<Vec<AnswerDetail>, StorageError> {
        let row = sqlx::query("SELECT details FROM quiz_results WHERE id = ?1")
            .bind(id_i64("result_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        let raw: String = row.try_get("details").map_err(ser)?;
        serde_json::from_str(&raw).map_err(ser)
    }
}
