use chrono::{DateTime, SecondsFormat, Utc};
use garde::Validate;
use kernel::model::{
    id::{LoanId, NotificationId},
    notification::{NotificationView, PendingCursor},
};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[garde(skip)]
    pub after: Option<String>,
    #[garde(range(min = 1, max = 200))]
    pub limit: Option<i64>,
}

impl NotificationQuery {
    pub fn cursor(&self) -> AppResult<Option<PendingCursor>> {
        self.after.as_deref().map(decode_cursor).transpose()
    }
}

// カーソルは "<到着日時 RFC3339>_<通知 ID>" の形式
pub fn encode_cursor(cursor: &PendingCursor) -> String {
    format!(
        "{}_{}",
        cursor
            .created_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true),
        cursor.notification_id
    )
}

pub fn decode_cursor(raw: &str) -> AppResult<PendingCursor> {
    let (created_at, notification_id) = raw
        .split_once('_')
        .ok_or_else(|| AppError::UnprocessableEntity(format!("invalid cursor: {raw}")))?;
    let created_at = DateTime::parse_from_rfc3339(created_at)
        .map_err(|e| AppError::UnprocessableEntity(format!("invalid cursor: {e}")))?
        .with_timezone(&Utc);
    Ok(PendingCursor {
        created_at,
        notification_id: NotificationId::try_from(notification_id)?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub notification_id: NotificationId,
    pub record_id: LoanId,
    #[serde(rename = "type")]
    pub kind: String,
    pub book_name: String,
    pub user_name: String,
    pub profile_picture: Option<String>,
    pub arrival_date: DateTime<Utc>,
    pub acknowledged: bool,
    pub delivered: bool,
}

impl From<NotificationView> for NotificationResponse {
    fn from(value: NotificationView) -> Self {
        let NotificationView {
            notification,
            book_name,
            user_name,
            profile_picture,
        } = value;
        Self {
            notification_id: notification.id,
            record_id: notification.loan_id,
            kind: notification.kind.to_string(),
            book_name,
            user_name,
            profile_picture,
            arrival_date: notification.created_at,
            acknowledged: notification.acknowledged,
            delivered: notification.delivered,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotificationsResponse {
    pub items: Vec<NotificationResponse>,
    pub next: Option<String>,
}
