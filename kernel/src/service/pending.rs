use std::sync::Arc;

use futures::{
    stream::{self, BoxStream},
    StreamExt, TryStreamExt,
};
use shared::error::{AppError, AppResult};

use crate::{
    model::{
        id::UserId,
        notification::{NotificationView, PendingCursor},
    },
    repository::notification::NotificationRepository,
};

// ページはストリームがポーリングされたときにだけ取得する。
// 件数が limit に満たないページで終わり、任意のカーソルから再開できる
pub struct PendingNotifications {
    repository: Arc<dyn NotificationRepository>,
    user_id: UserId,
    page_size: i64,
}

impl PendingNotifications {
    pub fn new(repository: Arc<dyn NotificationRepository>, user_id: UserId, page_size: i64) -> Self {
        Self {
            repository,
            user_id,
            page_size: page_size.max(1),
        }
    }

    pub fn stream_from(
        &self,
        after: Option<PendingCursor>,
    ) -> BoxStream<'static, AppResult<NotificationView>> {
        let repository = self.repository.clone();
        let (user_id, page_size) = (self.user_id, self.page_size);

        // 状態が None なら読み終わり
        stream::try_unfold(Some(after), move |cursor| {
            let repository = repository.clone();
            async move {
                let Some(after) = cursor else {
                    return Ok(None);
                };
                let page = repository.list_pending(user_id, after, page_size).await?;
                if page.is_empty() {
                    return Ok(None);
                }
                let next = if (page.len() as i64) < page_size {
                    None
                } else {
                    page.last().map(|v| Some(v.notification.cursor()))
                };
                Ok::<_, AppError>(Some((page, next)))
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, AppError>)))
        .try_flatten()
        .boxed()
    }
}
