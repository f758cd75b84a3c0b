use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use garde::Validate;
use kernel::{
    model::id::{NotificationId, UserId},
    service::pending::PendingNotifications,
};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{
    extractor::AuthorizedUser,
    model::notification::{
        encode_cursor, NotificationQuery, NotificationResponse, PendingNotificationsResponse,
    },
};

// プッシュが届かなかった端末はここをポーリングして未処理の通知を拾う
pub async fn list_pending_notifications(
    user: AuthorizedUser,
    Path(user_id): Path<UserId>,
    Query(query): Query<NotificationQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<PendingNotificationsResponse>> {
    query.validate(&())?;
    if user.id() != user_id {
        return Err(AppError::ForbiddenOperation);
    }

    let page_size = registry.notification_config().page_limit;
    let limit = query.limit.unwrap_or(page_size);
    let views = PendingNotifications::new(registry.notification_repository(), user_id, page_size)
        .stream_from(query.cursor()?)
        .take(limit as usize)
        .try_collect::<Vec<_>>()
        .await?;

    // 上限まで返したときだけ続きがある可能性がある
    let next = match views.last() {
        Some(last) if views.len() as i64 == limit => {
            Some(encode_cursor(&last.notification.cursor()))
        }
        _ => None,
    };
    let items = views.into_iter().map(NotificationResponse::from).collect();

    Ok(Json(PendingNotificationsResponse { items, next }))
}

pub async fn acknowledge_notification(
    user: AuthorizedUser,
    Path(notification_id): Path<NotificationId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    registry
        .confirmation_service()
        .acknowledge_notification(notification_id, user.id())
        .await
        .map(|_| StatusCode::OK)
}

pub async fn archive_notification(
    user: AuthorizedUser,
    Path(notification_id): Path<NotificationId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    registry
        .confirmation_service()
        .archive_notification(notification_id, user.id())
        .await
        .map(|_| StatusCode::OK)
}
