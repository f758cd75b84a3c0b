use chrono::{DateTime, Utc};
use derive_new::new;
use shared::error::{AppError, AppResult};

use super::{LoanState, LoanTimestamp};
use crate::model::id::{BookId, LoanId, UserId};

#[derive(new, Debug)]
pub struct CreateLoan {
    pub book_id: BookId,
    pub owner_id: UserId,
    pub borrower_id: UserId,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransitionLoan {
    pub loan_id: LoanId,
    pub expected: LoanState,
    pub next: LoanState,
    pub stamp: LoanTimestamp,
    pub at: DateTime<Utc>,
}

impl TransitionLoan {
    // 許可されていない遷移はストアに触れる前に弾く
    pub fn new(
        loan_id: LoanId,
        expected: LoanState,
        next: LoanState,
        at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let stamp = LoanTimestamp::for_state(next)
            .filter(|_| expected.can_transition_to(next))
            .ok_or_else(|| {
                AppError::StateConflict(format!("{expected} -> {next} is not a valid transition"))
            })?;
        Ok(Self {
            loan_id,
            expected,
            next,
            stamp,
            at,
        })
    }
}
