use chrono::{DateTime, Utc};
use serde::Deserialize;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, AsRefStr, Display)]
pub enum LoanState {
    Requested,
    Confirmed,
    ReturnRequested,
    Returned,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, EnumString, AsRefStr, Display)]
pub enum NotificationKind {
    BorrowRequest,
    BorrowConfirmed,
    BorrowRejected,
    ReturnRequest,
    ReturnConfirmed,
    ReturnDisputed,
}

impl NotificationKind {
    // 利用者に承認・拒否を求める種類か
    pub fn awaits_decision(self) -> bool {
        matches!(self, Self::BorrowRequest | Self::ReturnRequest)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub record_id: Uuid,
    pub book_id: Uuid,
    pub owner_id: Uuid,
    pub borrower_id: Uuid,
    pub state: LoanState,
    pub requested_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanList {
    pub items: Vec<LoanSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    pub notification_id: Uuid,
    pub record_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub book_name: String,
    pub user_name: String,
    pub profile_picture: Option<String>,
    pub arrival_date: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPage {
    pub items: Vec<PendingNotification>,
    pub next: Option<String>,
}
