use chrono::{DateTime, Utc};
use shared::error::{AppError, AppResult};
use strum::{AsRefStr, Display, EnumString};

use super::{
    id::{BookId, LoanId, UserId},
    notification::Notification,
};

pub mod event;

use event::TransitionLoan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
pub enum LoanState {
    Requested,
    Confirmed,
    ReturnRequested,
    Returned,
    Cancelled,
}

impl LoanState {
    // 蔵書ひとつにつき、これらの状態の貸出は同時にひとつまで
    pub const ACTIVE: [LoanState; 3] = [
        LoanState::Requested,
        LoanState::Confirmed,
        LoanState::ReturnRequested,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, LoanState::Returned | LoanState::Cancelled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: LoanState) -> bool {
        use LoanState::*;
        matches!(
            (self, next),
            (Requested, Confirmed)
                | (Requested, Cancelled)
                | (Confirmed, ReturnRequested)
                | (ReturnRequested, Returned)
        )
    }
}

// 遷移先の状態ごとに一列。どの列も一度しか書き込まない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanTimestamp {
    Confirmed,
    ReturnRequested,
    Returned,
    Cancelled,
}

impl LoanTimestamp {
    pub fn for_state(state: LoanState) -> Option<Self> {
        match state {
            LoanState::Requested => None,
            LoanState::Confirmed => Some(Self::Confirmed),
            LoanState::ReturnRequested => Some(Self::ReturnRequested),
            LoanState::Returned => Some(Self::Returned),
            LoanState::Cancelled => Some(Self::Cancelled),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanParty {
    Owner,
    Borrower,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    pub id: LoanId,
    pub book_id: BookId,
    pub owner_id: UserId,
    pub borrower_id: UserId,
    pub state: LoanState,
    pub requested_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl LoanRecord {
    pub fn party_of(&self, user_id: UserId) -> Option<LoanParty> {
        if user_id == self.owner_id {
            Some(LoanParty::Owner)
        } else if user_id == self.borrower_id {
            Some(LoanParty::Borrower)
        } else {
            None
        }
    }

    // 指定した当事者でなければ ForbiddenOperation
    pub fn authorize(&self, user_id: UserId, party: LoanParty) -> AppResult<()> {
        match self.party_of(user_id) {
            Some(p) if p == party => Ok(()),
            _ => Err(AppError::ForbiddenOperation),
        }
    }

    pub fn counterpart_of(&self, user_id: UserId) -> UserId {
        if user_id == self.owner_id {
            self.borrower_id
        } else {
            self.owner_id
        }
    }

    pub fn latest_stamp(&self) -> DateTime<Utc> {
        [
            self.confirmed_at,
            self.return_requested_at,
            self.returned_at,
            self.cancelled_at,
        ]
        .into_iter()
        .flatten()
        .fold(self.requested_at, |latest, at| latest.max(at))
    }

    // 手元の記録に対する compare-and-swap。期待した状態でなければ StateConflict
    pub fn apply(&mut self, transition: &TransitionLoan) -> AppResult<()> {
        if self.id != transition.loan_id {
            return Err(AppError::StateConflict(format!(
                "transition for {} applied to {}",
                transition.loan_id, self.id
            )));
        }
        if self.state != transition.expected {
            return Err(AppError::StateConflict(format!(
                "expected {} but loan {} is {}",
                transition.expected, self.id, self.state
            )));
        }
        // 時刻は単調非減少にそろえる
        let at = transition.at.max(self.latest_stamp());
        let slot = match transition.stamp {
            LoanTimestamp::Confirmed => &mut self.confirmed_at,
            LoanTimestamp::ReturnRequested => &mut self.return_requested_at,
            LoanTimestamp::Returned => &mut self.returned_at,
            LoanTimestamp::Cancelled => &mut self.cancelled_at,
        };
        slot.get_or_insert(at);
        self.state = transition.next;
        Ok(())
    }
}

// 貸出の作成・遷移と、同じ単位で追加された通知
#[derive(Debug, Clone)]
pub struct LoanCommit {
    pub loan: LoanRecord,
    pub notification: Notification,
}
