use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::push::{PushMessage, PushToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDelivery {
    Accepted,
    // 失効したトークン。通知自体は失敗扱いにしない
    TokenRejected,
}

// 送信は一度だけ試みる。通信の失敗は PushDeliveryError で返す
#[mockall::automock]
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &PushToken, message: &PushMessage) -> AppResult<PushDelivery>;
}
