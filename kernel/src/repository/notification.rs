use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    id::{LoanId, NotificationId, UserId},
    notification::{
        event::CreateNotification, Notification, NotificationKind, NotificationView,
        PendingCursor,
    },
};

#[mockall::automock]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    // 追記のみ。通知は削除しない
    async fn append(&self, event: CreateNotification) -> AppResult<Notification>;
    async fn find_by_id(&self, notification_id: NotificationId)
        -> AppResult<Option<Notification>>;
    // 受信者に未確認のまま残っている、ある貸出についての通知
    async fn find_pending_by_loan(
        &self,
        loan_id: LoanId,
        recipient_id: UserId,
    ) -> AppResult<Vec<Notification>>;
    // 以下のフラグ操作はいずれも冪等
    async fn mark_delivered(&self, notification_id: NotificationId) -> AppResult<()>;
    async fn mark_acknowledged(&self, notification_id: NotificationId) -> AppResult<()>;
    async fn archive(&self, notification_id: NotificationId) -> AppResult<()>;
    // follow_up と同じ貸出について recipient_id 宛ての未確認の resolved を確認済みにし、
    // 一件でも確認済みにできたときだけ同じ単位で follow_up を追加する
    async fn resolve_pending(
        &self,
        resolved: NotificationKind,
        recipient_id: UserId,
        follow_up: CreateNotification,
    ) -> AppResult<Option<Notification>>;
    // 未確認の通知を (created_at, id) の昇順で、after より後ろから最大 limit 件
    async fn list_pending(
        &self,
        user_id: UserId,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> AppResult<Vec<NotificationView>>;
}
