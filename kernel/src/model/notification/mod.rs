use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

use super::{
    id::{LoanId, NotificationId, UserId},
    loan::{LoanRecord, LoanState},
};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
pub enum NotificationKind {
    BorrowRequest,
    BorrowConfirmed,
    // 貸出リクエストが断られたことの通知
    BorrowRejected,
    ReturnRequest,
    ReturnConfirmed,
    // 返却が確認できなかったことの再通知
    ReturnDisputed,
}

impl NotificationKind {
    // この種類を出せる貸出の状態
    pub fn emitted_in(self) -> LoanState {
        match self {
            Self::BorrowRequest => LoanState::Requested,
            Self::BorrowConfirmed => LoanState::Confirmed,
            Self::BorrowRejected => LoanState::Cancelled,
            Self::ReturnRequest | Self::ReturnDisputed => LoanState::ReturnRequested,
            Self::ReturnConfirmed => LoanState::Returned,
        }
    }

    pub fn recipient(self, loan: &LoanRecord) -> UserId {
        match self {
            Self::BorrowRequest | Self::ReturnRequest => loan.owner_id,
            _ => loan.borrower_id,
        }
    }

    // 受信者の判断（承認・拒否）を待つ種類か
    pub fn awaits_decision(self) -> bool {
        matches!(self, Self::BorrowRequest | Self::ReturnRequest)
    }

    // その状態へ入ったことを相手に知らせる種類
    pub fn announcing(state: LoanState) -> Self {
        match state {
            LoanState::Requested => Self::BorrowRequest,
            LoanState::Confirmed => Self::BorrowConfirmed,
            LoanState::Cancelled => Self::BorrowRejected,
            LoanState::ReturnRequested => Self::ReturnRequest,
            LoanState::Returned => Self::ReturnConfirmed,
        }
    }

    // その状態へ入ったことで判断が済み、確認済みになる種類
    pub fn resolved_on(state: LoanState) -> Option<Self> {
        match state {
            LoanState::Confirmed | LoanState::Cancelled => Some(Self::BorrowRequest),
            LoanState::Returned => Some(Self::ReturnRequest),
            LoanState::Requested | LoanState::ReturnRequested => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub loan_id: LoanId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
    pub acknowledged: bool,
    pub archived: bool,
}

impl Notification {
    pub fn is_pending(&self) -> bool {
        !self.acknowledged && !self.archived
    }

    pub fn cursor(&self) -> PendingCursor {
        PendingCursor {
            created_at: self.created_at,
            notification_id: self.id,
        }
    }
}

// 未確認一覧での位置。(created_at, id) の順で、カーソルより後ろから再開する
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingCursor {
    pub created_at: DateTime<Utc>,
    pub notification_id: NotificationId,
}

// 通知一覧の表示用。蔵書名と相手ユーザーの情報を結合したもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationView {
    pub notification: Notification,
    pub book_name: String,
    pub user_name: String,
    pub profile_picture: Option<String>,
}
