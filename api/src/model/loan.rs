use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    id::{BookId, LoanId, UserId},
    loan::LoanRecord,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    #[garde(skip)]
    pub book_id: BookId,
    #[garde(skip)]
    pub borrower_id: UserId,
}

// 承認・拒否の判断
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[garde(skip)]
    pub decision: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub record_id: LoanId,
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

impl From<LoanRecord> for LoanResponse {
    fn from(value: LoanRecord) -> Self {
        let LoanRecord {
            id,
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
        Self {
            record_id: id,
            book_id,
            owner_id,
            borrower_id,
            state: state.to_string(),
            requested_at,
            confirmed_at,
            return_requested_at,
            returned_at,
            cancelled_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoansResponse {
    pub items: Vec<LoanResponse>,
}

impl From<Vec<LoanRecord>> for LoansResponse {
    fn from(value: Vec<LoanRecord>) -> Self {
        Self {
            items: value.into_iter().map(LoanResponse::from).collect(),
        }
    }
}
