use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::model::id::LoanId;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{
    extractor::AuthorizedUser,
    model::loan::{DecisionRequest, LoanRequest, LoanResponse, LoansResponse},
};

pub async fn request_loan(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Json(req): Json<LoanRequest>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    req.validate(&())?;
    // 他人の名義では借りられない
    if req.borrower_id != user.id() {
        return Err(AppError::ForbiddenOperation);
    }

    registry
        .confirmation_service()
        .request_loan(req.book_id, req.borrower_id)
        .await
        .map(|loan| (StatusCode::CREATED, Json(loan.into())))
}

pub async fn confirm_borrow(
    user: AuthorizedUser,
    Path(loan_id): Path<LoanId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<LoanResponse>> {
    req.validate(&())?;

    registry
        .confirmation_service()
        .confirm_borrow(loan_id, user.id(), req.decision)
        .await
        .map(LoanResponse::from)
        .map(Json)
}

pub async fn request_return(
    user: AuthorizedUser,
    Path(loan_id): Path<LoanId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<LoanResponse>> {
    registry
        .confirmation_service()
        .request_return(loan_id, user.id())
        .await
        .map(LoanResponse::from)
        .map(Json)
}

pub async fn confirm_return(
    user: AuthorizedUser,
    Path(loan_id): Path<LoanId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<LoanResponse>> {
    req.validate(&())?;

    registry
        .confirmation_service()
        .confirm_return(loan_id, user.id(), req.decision)
        .await
        .map(LoanResponse::from)
        .map(Json)
}

pub async fn show_loan(
    user: AuthorizedUser,
    Path(loan_id): Path<LoanId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<LoanResponse>> {
    registry
        .confirmation_service()
        .loan_for(loan_id, user.id())
        .await
        .map(LoanResponse::from)
        .map(Json)
}

pub async fn show_my_loans(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<LoansResponse>> {
    registry
        .confirmation_service()
        .loans_for(user.id())
        .await
        .map(LoansResponse::from)
        .map(Json)
}
