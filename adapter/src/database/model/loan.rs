use chrono::{DateTime, Utc};
use kernel::model::{
    id::{BookId, LoanId, UserId},
    loan::{LoanRecord, LoanState},
};
use shared::error::AppError;

pub const LOAN_COLUMNS: &str = "loan_id, book_id, owner_id, borrower_id, state, requested_at, \
     confirmed_at, return_requested_at, returned_at, cancelled_at";

#[derive(sqlx::FromRow)]
pub struct LoanRow {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub owner_id: UserId,
    pub borrower_id: UserId,
    pub state: String,
    pub requested_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<LoanRow> for LoanRecord {
    type Error = AppError;

    fn try_from(value: LoanRow) -> Result<Self, Self::Error> {
        let LoanRow {
            loan_id,
            book_id,
            owner_id,
            borrower_id,
            state,
            requested_at,
            confirmed_at,
            return_requested_at,
            returned_at,
            cancelled_at,
        } = value;
        let state = state.parse::<LoanState>().map_err(|_| {
            AppError::ConversionEntityError(format!("unknown loan state {state} on {loan_id}"))
        })?;
        Ok(LoanRecord {
            id: loan_id,
            book_id,
            owner_id,
            borrower_id,
            state,
            requested_at,
            confirmed_at,
            return_requested_at,
            returned_at,
            cancelled_at,
        })
    }
}
