use chrono::{DateTime, Utc};
use shared::error::{AppError, AppResult};

use super::NotificationKind;
use crate::model::{
    id::{LoanId, NotificationId, UserId},
    loan::LoanRecord,
};

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub id: NotificationId,
    pub loan_id: LoanId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

impl CreateNotification {
    // 受信者は種類から決まる。記録の状態と合わない種類は拒否する
    pub fn for_loan(
        kind: NotificationKind,
        loan: &LoanRecord,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if kind.emitted_in() != loan.state {
            return Err(AppError::InconsistentNotification(format!(
                "{kind} cannot be emitted for loan {} in state {}",
                loan.id, loan.state
            )));
        }
        Ok(Self {
            id: NotificationId::new(),
            loan_id: loan.id,
            recipient_id: kind.recipient(loan),
            kind,
            created_at,
        })
    }

    // 記録が今の状態へ入ったことを知らせる通知
    pub fn announcing(loan: &LoanRecord, created_at: DateTime<Utc>) -> AppResult<Self> {
        Self::for_loan(NotificationKind::announcing(loan.state), loan, created_at)
    }
}
