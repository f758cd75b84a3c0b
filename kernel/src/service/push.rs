use std::sync::Arc;

use derive_new::new;
use shared::error::AppResult;
use tokio::sync::mpsc;

use crate::{
    model::{notification::Notification, push::PushMessage},
    push::{PushDelivery, PushSender},
    repository::{
        book::BookRepository, loan::LoanRepository, notification::NotificationRepository,
        push_token::PushTokenRepository, user::UserRepository,
    },
};

pub type NotificationOutbox = mpsc::UnboundedSender<Notification>;
pub type NotificationInbox = mpsc::UnboundedReceiver<Notification>;

pub fn notification_channel() -> (NotificationOutbox, NotificationInbox) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    // トークン未登録。次回のポーリングで拾われる
    NoToken,
    StaleToken,
    Failed,
}

// 通知ごとに一度だけ送信を試み、再送はしない。
// 届かなかった通知は未確認のまま残り、端末のポーリングで拾われる
#[derive(new)]
pub struct PushDispatcher {
    push_token_repository: Arc<dyn PushTokenRepository>,
    notification_repository: Arc<dyn NotificationRepository>,
    loan_repository: Arc<dyn LoanRepository>,
    book_repository: Arc<dyn BookRepository>,
    user_repository: Arc<dyn UserRepository>,
    sender: Arc<dyn PushSender>,
}

impl PushDispatcher {
    pub async fn run(self: Arc<Self>, mut inbox: NotificationInbox) {
        while let Some(notification) = inbox.recv().await {
            self.dispatch(&notification).await;
        }
        tracing::info!("notification outbox closed, push dispatcher stopped");
    }

    pub async fn dispatch(&self, notification: &Notification) -> DispatchOutcome {
        match self.try_dispatch(notification).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    error.message = %e,
                    "push delivery failed"
                );
                DispatchOutcome::Failed
            }
        }
    }

    async fn try_dispatch(&self, notification: &Notification) -> AppResult<DispatchOutcome> {
        let Some(token) = self
            .push_token_repository
            .find_by_user_id(notification.recipient_id)
            .await?
        else {
            tracing::debug!(
                notification_id = %notification.id,
                recipient_id = %notification.recipient_id,
                "no push token registered"
            );
            return Ok(DispatchOutcome::NoToken);
        };

        let message = self.compose(notification).await?;
        match self.sender.send(&token, &message).await? {
            PushDelivery::Accepted => {
                self.notification_repository
                    .mark_delivered(notification.id)
                    .await?;
                Ok(DispatchOutcome::Delivered)
            }
            PushDelivery::TokenRejected => {
                let discarded = self
                    .push_token_repository
                    .discard(token.user_id, token.token)
                    .await?;
                tracing::info!(
                    user_id = %notification.recipient_id,
                    discarded,
                    "push token rejected by push service"
                );
                Ok(DispatchOutcome::StaleToken)
            }
        }
    }

    async fn compose(&self, notification: &Notification) -> AppResult<PushMessage> {
        let loan = self.loan_repository.get(notification.loan_id).await?;
        let book_name = self
            .book_repository
            .find_by_id(loan.book_id)
            .await?
            .map(|b| b.title)
            .unwrap_or_default();
        // 表示するのは受信者から見た相手の名前
        let user_name = self
            .user_repository
            .find_profile(loan.counterpart_of(notification.recipient_id))
            .await?
            .map(|u| u.name)
            .unwrap_or_default();
        Ok(PushMessage {
            notification_id: notification.id,
            kind: notification.kind,
            loan_id: loan.id,
            book_name,
            user_name,
        })
    }
}
