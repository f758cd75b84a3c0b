use axum::{
    routing::{get, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::loan::{
    confirm_borrow, confirm_return, request_loan, request_return, show_loan, show_my_loans,
};

pub fn build_loan_routers() -> Router<AppRegistry> {
    let loan_routers = Router::new()
        .route("/request", post(request_loan))
        .route("/:loan_id", get(show_loan))
        .route("/:loan_id/confirm-borrow", post(confirm_borrow))
        .route("/:loan_id/request-return", post(request_return))
        .route("/:loan_id/confirm-return", post(confirm_return));

    Router::new()
        .nest("/loan", loan_routers)
        .route("/loans", get(show_my_loans))
}
