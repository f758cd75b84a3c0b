use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{id::UserId, user::UserProfile},
    repository::user::UserRepository,
};
use shared::error::{AppError, AppResult};

use crate::database::{model::user::UserRow, ConnectionPool};

#[derive(new)]
pub struct UserRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn find_profile(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, name, profile_picture FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(row.map(UserProfile::from))
    }
}
