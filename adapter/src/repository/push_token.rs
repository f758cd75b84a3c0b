use async_trait::async_trait;
use chrono::Utc;
use derive_new::new;
use kernel::{
    model::{id::UserId, push::PushToken},
    repository::push_token::PushTokenRepository,
};
use shared::error::{AppError, AppResult};

use crate::database::{model::push_token::PushTokenRow, ConnectionPool};

#[derive(new)]
pub struct PushTokenRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl PushTokenRepository for PushTokenRepositoryImpl {
    async fn upsert(&self, user_id: UserId, token: String) -> AppResult<PushToken> {
        let row = sqlx::query_as::<_, PushTokenRow>(
            r#"
                INSERT INTO push_tokens (user_id, token, updated_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id)
                DO UPDATE SET token = EXCLUDED.token, updated_at = EXCLUDED.updated_at
                RETURNING user_id, token, updated_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(Utc::now())
        .fetch_one(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(row.into())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Option<PushToken>> {
        let row = sqlx::query_as::<_, PushTokenRow>(
            "SELECT user_id, token, updated_at FROM push_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(row.map(PushToken::from))
    }

    async fn discard(&self, user_id: UserId, token: String) -> AppResult<bool> {
        // 別のトークンに更新済みなら何もしない
        let res = sqlx::query("DELETE FROM push_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(res.rows_affected() > 0)
    }
}
