use chrono::{DateTime, Utc};
use kernel::model::{id::UserId, push::PushToken};

#[derive(sqlx::FromRow)]
pub struct PushTokenRow {
    pub user_id: UserId,
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

impl From<PushTokenRow> for PushToken {
    fn from(value: PushTokenRow) -> Self {
        let PushTokenRow {
            user_id,
            token,
            updated_at,
        } = value;
        PushToken {
            user_id,
            token,
            updated_at,
        }
    }
}
