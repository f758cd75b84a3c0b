use std::{collections::HashMap, str::FromStr};

use uuid::Uuid;

use crate::{
    error::{ClientError, ClientResult},
    model::{NotificationKind, PendingNotification},
};

// プッシュメッセージ、またはポーリングで拾った未確認の通知の内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    pub notification_id: Uuid,
    pub kind: NotificationKind,
    pub record_id: Uuid,
    pub title: String,
    pub body: String,
    pub book_name: String,
    pub user_name: String,
}

impl PushPayload {
    pub fn from_data(data: &HashMap<String, String>) -> ClientResult<Self> {
        let optional = |key: &str| data.get(key).cloned().unwrap_or_default();
        Ok(Self {
            notification_id: parse_field(data, "notificationId")?,
            kind: parse_field(data, "type")?,
            record_id: parse_field(data, "recordId")?,
            title: optional("title"),
            body: optional("body"),
            book_name: optional("bookName"),
            user_name: optional("userName"),
        })
    }
}

impl From<PendingNotification> for PushPayload {
    fn from(value: PendingNotification) -> Self {
        Self {
            notification_id: value.notification_id,
            kind: value.kind,
            record_id: value.record_id,
            title: value.kind.to_string(),
            body: format!("{}: {}", value.user_name, value.book_name),
            book_name: value.book_name,
            user_name: value.user_name,
        }
    }
}

fn required<'a>(data: &'a HashMap<String, String>, field: &'static str) -> ClientResult<&'a str> {
    data.get(field)
        .map(String::as_str)
        .ok_or(ClientError::MissingField(field))
}

fn parse_field<T: FromStr>(data: &HashMap<String, String>, field: &'static str) -> ClientResult<T> {
    let value = required(data, field)?;
    value.parse().map_err(|_| ClientError::InvalidField {
        field,
        value: value.to_string(),
    })
}
