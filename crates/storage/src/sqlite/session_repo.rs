use chrono::Utc;
use quiz_core::model::{PersistedSession, QuizId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db, id_i64, ser};
use crate::repository::{SessionBackend, StorageError};

// Session records are stored as one JSON document per (user, quiz), so a write is all-or-nothing.
#[async_trait::async_trait]
impl SessionBackend for SqliteRepository {
    async fn load_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<PersistedSession>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT payload
                FROM quiz_sessions
                WHERE user_id = ?1 AND quiz_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        serde_json::from_str(&payload).map(Some).map_err(ser)
    }

    async fn save_session(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        session: &PersistedSession,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(session).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (user_id, quiz_id, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, quiz_id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn clear_session(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM quiz_sessions WHERE user_id = ?1 AND quiz_id = ?2")
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("quiz_id", quiz_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }
}

impl SqliteRepository {
    /// Session store for one user backed by this database.
    #[must_use]
    pub fn session_store(&self, user_id: UserId) -> crate::repository::ScopedSessionStore {
        crate::repository::ScopedSessionStore::new(std::sync::Arc::new(self.clone()), user_id)
    }
}
