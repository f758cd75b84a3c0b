use chrono::{DateTime, Utc};

use super::{
    id::{LoanId, NotificationId, UserId},
    notification::NotificationKind,
};

// ユーザーごとに現在有効なトークンは高々ひとつ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushToken {
    pub user_id: UserId,
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

// 端末が追加の取得なしに通知を表示できるだけの内容を持つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub notification_id: NotificationId,
    pub kind: NotificationKind,
    pub loan_id: LoanId,
    pub book_name: String,
    pub user_name: String,
}

impl PushMessage {
    pub fn title(&self) -> String {
        match self.kind {
            NotificationKind::BorrowRequest => "Borrow request".into(),
            NotificationKind::BorrowConfirmed => "Borrow confirmed".into(),
            NotificationKind::BorrowRejected => "Borrow declined".into(),
            NotificationKind::ReturnRequest => "Return request".into(),
            NotificationKind::ReturnConfirmed => "Return confirmed".into(),
            NotificationKind::ReturnDisputed => "Return disputed".into(),
        }
    }

    pub fn body(&self) -> String {
        let (user, book) = (&self.user_name, &self.book_name);
        match self.kind {
            NotificationKind::BorrowRequest => format!("{user} would like to borrow \"{book}\""),
            NotificationKind::BorrowConfirmed => format!("{user} agreed to lend you \"{book}\""),
            NotificationKind::BorrowRejected => format!("{user} declined to lend you \"{book}\""),
            NotificationKind::ReturnRequest => format!("{user} says \"{book}\" was returned"),
            NotificationKind::ReturnConfirmed => format!("{user} confirmed \"{book}\" was returned"),
            NotificationKind::ReturnDisputed => {
                format!("{user} has not received \"{book}\" back yet")
            }
        }
    }

    // プッシュ通知の data フィールド。値はすべて文字列
    pub fn data(&self) -> Vec<(&'static str, String)> {
        vec![
            ("notificationId", self.notification_id.to_string()),
            ("type", self.kind.as_ref().to_string()),
            ("recordId", self.loan_id.to_string()),
            ("title", self.title()),
            ("body", self.body()),
            ("bookName", self.book_name.clone()),
            ("userName", self.user_name.clone()),
        ]
    }
}
