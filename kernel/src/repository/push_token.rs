use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{id::UserId, push::PushToken};

#[mockall::automock]
#[async_trait]
pub trait PushTokenRepository: Send + Sync {
    // 古いトークンは上書きされる
    async fn upsert(&self, user_id: UserId, token: String) -> AppResult<PushToken>;
    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Option<PushToken>>;
    // まだ現在の値である場合に限り削除する。削除したかどうかを返す
    async fn discard(&self, user_id: UserId, token: String) -> AppResult<bool>;
}
