use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::ClientResult,
    model::NotificationKind,
    payload::PushPayload,
    scheduler::{Constraint, TaskScheduler},
    submitter::ConfirmationApi,
};

// 端末のローカル通知
#[mockall::automock]
#[async_trait]
pub trait LocalNotifier: Send + Sync {
    // 判断を求める種類なら利用者の判断を返す。閉じられた場合と判断の無い種類は None
    async fn present(&self, payload: &PushPayload) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handling {
    InFlight,
    // サーバーが判断か既読を受け付けた
    Done,
}

type SeenSet = Arc<Mutex<HashMap<Uuid, Handling>>>;

// プッシュとポーリングは同じ未確認の通知への二つの経路なので、
// どちらも通知 ID ごとの同じ重複排除を通す
pub struct NotificationIntake {
    api: Arc<dyn ConfirmationApi>,
    notifier: Arc<dyn LocalNotifier>,
    scheduler: Arc<TaskScheduler>,
    seen: SeenSet,
}

impl NotificationIntake {
    pub fn new(
        api: Arc<dyn ConfirmationApi>,
        notifier: Arc<dyn LocalNotifier>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            api,
            notifier,
            scheduler,
            seen: Arc::default(),
        }
    }

    // 処理を予約した時点で戻る。すでに受け取り済みの通知なら Ok(false)
    pub fn on_message_received(&self, data: &HashMap<String, String>) -> ClientResult<bool> {
        let payload = PushPayload::from_data(data)?;
        Ok(self.accept(payload))
    }

    // 処理中のメッセージには影響しない独立したタスクとして送る
    pub fn on_new_token(&self, token: String) {
        let api = self.api.clone();
        self.scheduler
            .schedule("report-push-token", Constraint::NetworkConnected, async move {
                if let Err(e) = api.report_push_token(token).await {
                    tracing::warn!(error.message = %e, "failed to report push token");
                }
            });
    }

    // プッシュで届かなかった通知を未確認一覧から拾い、新たに予約した件数を返す
    pub async fn reconcile(&self) -> ClientResult<usize> {
        let mut scheduled = 0;
        let mut listed = HashSet::new();
        let mut after = None;
        loop {
            let page = self.api.fetch_pending(after, None).await?;
            for item in page.items {
                listed.insert(item.notification_id);
                if self.accept(item.into()) {
                    scheduled += 1;
                }
            }
            match page.next {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        // 一覧から消えた処理済みの通知は二度と返ってこないので忘れてよい
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, handling| *handling == Handling::InFlight || listed.contains(id));
        Ok(scheduled)
    }

    // プラットフォームによる打ち切り。終わらなかった通知は次の reconcile で拾い直す
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.scheduler.cancel_all();
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, handling| *handling == Handling::Done);
        cancelled
    }

    fn accept(&self, payload: PushPayload) -> bool {
        {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if seen.contains_key(&payload.notification_id) {
                tracing::debug!(
                    notification_id = %payload.notification_id,
                    "duplicate notification dropped"
                );
                return false;
            }
            seen.insert(payload.notification_id, Handling::InFlight);
        }

        let (api, notifier, seen) = (self.api.clone(), self.notifier.clone(), self.seen.clone());
        self.scheduler
            .schedule("confirm-notification", Constraint::NetworkConnected, async move {
                let notification_id = payload.notification_id;
                let acted = handle(api.as_ref(), notifier.as_ref(), payload).await;
                let mut seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
                if acted {
                    seen.insert(notification_id, Handling::Done);
                } else {
                    // サーバー側では未確認のまま。次の reconcile で再び表示する
                    seen.remove(&notification_id);
                }
            });
        true
    }
}

// サーバーが判断か既読を受け付けたら true
async fn handle(
    api: &dyn ConfirmationApi,
    notifier: &dyn LocalNotifier,
    payload: PushPayload,
) -> bool {
    let decision = notifier.present(&payload).await;
    let result = match (payload.kind, decision) {
        (NotificationKind::BorrowRequest, Some(decision)) => api
            .confirm_borrow(payload.record_id, decision)
            .await
            .map(|_| ()),
        (NotificationKind::ReturnRequest, Some(decision)) => api
            .confirm_return(payload.record_id, decision)
            .await
            .map(|_| ()),
        // 判断せずに閉じた場合は何も送らない
        (kind, None) if kind.awaits_decision() => {
            tracing::debug!(
                notification_id = %payload.notification_id,
                "dismissed without a decision"
            );
            return false;
        }
        _ => api.acknowledge(payload.notification_id).await,
    };

    match result {
        Ok(()) => {
            tracing::debug!(
                notification_id = %payload.notification_id,
                kind = %payload.kind,
                "notification handled"
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                notification_id = %payload.notification_id,
                record_id = %payload.record_id,
                error.message = %e,
                "failed to submit decision"
            );
            false
        }
    }
}
