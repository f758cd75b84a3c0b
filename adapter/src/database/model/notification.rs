use chrono::{DateTime, Utc};
use kernel::model::{
    id::{LoanId, NotificationId, UserId},
    notification::{Notification, NotificationKind, NotificationView},
};
use shared::error::AppError;

pub const NOTIFICATION_COLUMNS: &str = "notification_id, loan_id, recipient_id, kind, created_at, \
     delivered, acknowledged, archived";

#[derive(sqlx::FromRow)]
pub struct NotificationRow {
    pub notification_id: NotificationId,
    pub loan_id: LoanId,
    pub recipient_id: UserId,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
    pub acknowledged: bool,
    pub archived: bool,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(value: NotificationRow) -> Result<Self, Self::Error> {
        let kind = value.kind.parse::<NotificationKind>().map_err(|_| {
            AppError::ConversionEntityError(format!(
                "unknown notification kind {} on {}",
                value.kind, value.notification_id
            ))
        })?;
        Ok(Notification {
            id: value.notification_id,
            loan_id: value.loan_id,
            recipient_id: value.recipient_id,
            kind,
            created_at: value.created_at,
            delivered: value.delivered,
            acknowledged: value.acknowledged,
            archived: value.archived,
        })
    }
}

// 蔵書名・相手ユーザーを結合した一覧用の行
#[derive(sqlx::FromRow)]
pub struct NotificationViewRow {
    #[sqlx(flatten)]
    pub notification: NotificationRow,
    pub book_name: String,
    pub user_name: String,
    pub profile_picture: Option<String>,
}

impl TryFrom<NotificationViewRow> for NotificationView {
    type Error = AppError;

    fn try_from(value: NotificationViewRow) -> Result<Self, Self::Error> {
        Ok(NotificationView {
            notification: value.notification.try_into()?,
            book_name: value.book_name,
            user_name: value.user_name,
            profile_picture: value.profile_picture,
        })
    }
}
