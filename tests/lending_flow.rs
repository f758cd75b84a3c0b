mod helper;

use client::{
    model::{LoanState, NotificationKind},
    submitter::ConfirmationApi,
};
use helper::TestServer;
use tokio::task::JoinSet;

#[tokio::test]
async fn confirmed_loan_notifies_the_borrower() {
    let server = TestServer::spawn().await;
    let (owner, borrower) = (server.owner_client(), server.borrower_client());

    let loan = borrower.request_loan(server.book()).await.unwrap();
    assert_eq!(loan.state, LoanState::Requested);
    assert_eq!(loan.owner_id, server.owner.raw());

    let loan = owner.confirm_borrow(loan.record_id, true).await.unwrap();
    assert_eq!(loan.state, LoanState::Confirmed);
    assert!(loan.confirmed_at.is_some());

    let pending = borrower.fetch_pending(None, None).await.unwrap();
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].kind, NotificationKind::BorrowConfirmed);
    assert_eq!(pending.items[0].record_id, loan.record_id);
    assert_eq!(pending.items[0].user_name, "Alice");

    // 判断済みの貸出リクエストはオーナーの一覧から消える
    let pending = owner.fetch_pending(None, None).await.unwrap();
    assert!(pending.items.is_empty());
}

#[tokio::test]
async fn repeated_confirmation_changes_nothing() {
    let server = TestServer::spawn().await;
    let (owner, borrower) = (server.owner_client(), server.borrower_client());

    let loan = borrower.request_loan(server.book()).await.unwrap();
    let first = owner.confirm_borrow(loan.record_id, true).await.unwrap();
    let second = owner.confirm_borrow(loan.record_id, true).await.unwrap();

    assert_eq!(second.state, LoanState::Confirmed);
    assert_eq!(second.confirmed_at, first.confirmed_at);
    let pending = borrower.fetch_pending(None, None).await.unwrap();
    assert_eq!(pending.items.len(), 1);
}

#[tokio::test]
async fn lent_book_cannot_be_requested_again() {
    let server = TestServer::spawn().await;
    let (owner, borrower) = (server.owner_client(), server.borrower_client());

    let loan = borrower.request_loan(server.book()).await.unwrap();
    owner.confirm_borrow(loan.record_id, true).await.unwrap();

    let err = borrower.request_loan(server.book()).await.unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn borrower_cannot_confirm_their_own_request() {
    let server = TestServer::spawn().await;
    let borrower = server.borrower_client();

    let loan = borrower.request_loan(server.book()).await.unwrap();
    let err = borrower
        .confirm_borrow(loan.record_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    let loan = borrower.loan(loan.record_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Requested);
    assert!(loan.confirmed_at.is_none());
}

#[tokio::test]
async fn declined_request_frees_the_book() {
    let server = TestServer::spawn().await;
    let (owner, borrower) = (server.owner_client(), server.borrower_client());

    let loan = borrower.request_loan(server.book()).await.unwrap();
    let loan = owner.confirm_borrow(loan.record_id, false).await.unwrap();
    assert_eq!(loan.state, LoanState::Cancelled);

    // 拒否した後に承認しても覆らない
    let loan = owner.confirm_borrow(loan.record_id, true).await.unwrap();
    assert_eq!(loan.state, LoanState::Cancelled);

    let pending = borrower.fetch_pending(None, None).await.unwrap();
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].kind, NotificationKind::BorrowRejected);

    let again = borrower.request_loan(server.book()).await.unwrap();
    assert_eq!(again.state, LoanState::Requested);
    assert_ne!(again.record_id, loan.record_id);
}

#[tokio::test]
async fn full_return_cycle_with_dispute() {
    let server = TestServer::spawn().await;
    let (owner, borrower) = (server.owner_client(), server.borrower_client());

    let loan = borrower.request_loan(server.book()).await.unwrap();
    owner.confirm_borrow(loan.record_id, true).await.unwrap();
    let loan = borrower.request_return(loan.record_id).await.unwrap();
    assert_eq!(loan.state, LoanState::ReturnRequested);

    // オーナーが返却を確認できない
    let disputed = owner.confirm_return(loan.record_id, false).await.unwrap();
    assert_eq!(disputed.state, LoanState::ReturnRequested);
    owner.confirm_return(loan.record_id, false).await.unwrap();
    let kinds: Vec<_> = borrower
        .fetch_pending(None, None)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::BorrowConfirmed, NotificationKind::ReturnDisputed]
    );

    // 借り手が改めて返却を申し出るとオーナーに再度届く
    borrower.request_return(loan.record_id).await.unwrap();
    let pending = owner.fetch_pending(None, None).await.unwrap();
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].kind, NotificationKind::ReturnRequest);

    let returned = owner.confirm_return(loan.record_id, true).await.unwrap();
    assert_eq!(returned.state, LoanState::Returned);
    let confirmed_at = returned.confirmed_at.unwrap();
    let return_requested_at = returned.return_requested_at.unwrap();
    let returned_at = returned.returned_at.unwrap();
    assert!(returned.requested_at <= confirmed_at);
    assert!(confirmed_at <= return_requested_at);
    assert!(return_requested_at <= returned_at);

    // 返却後の操作は状態を変えない
    let again = owner.confirm_return(loan.record_id, true).await.unwrap();
    assert_eq!(again.returned_at, Some(returned_at));
    let again = borrower.request_return(loan.record_id).await.unwrap();
    assert_eq!(again.state, LoanState::Returned);

    assert!(owner.fetch_pending(None, None).await.unwrap().items.is_empty());
    let next = borrower.request_loan(server.book()).await.unwrap();
    assert_eq!(next.state, LoanState::Requested);
}

#[tokio::test]
async fn return_before_confirmation_conflicts() {
    let server = TestServer::spawn().await;
    let borrower = server.borrower_client();

    let loan = borrower.request_loan(server.book()).await.unwrap();
    let err = borrower.request_return(loan.record_id).await.unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn concurrent_decisions_have_exactly_one_winner() {
    let server = TestServer::spawn().await;
    let loan = server
        .borrower_client()
        .request_loan(server.book())
        .await
        .unwrap();

    let record_id = loan.record_id;
    let mut decisions = JoinSet::new();
    for i in 0..8 {
        let owner = server.owner_client();
        decisions.spawn(async move { owner.confirm_borrow(record_id, i % 2 == 0).await });
    }
    let mut states = Vec::new();
    while let Some(result) = decisions.join_next().await {
        states.push(result.unwrap().unwrap().state);
    }

    let winner = server
        .borrower_client()
        .loan(record_id)
        .await
        .unwrap()
        .state;
    assert!(matches!(winner, LoanState::Confirmed | LoanState::Cancelled));
    assert!(states.iter().all(|s| *s == winner));

    let pending = server
        .borrower_client()
        .fetch_pending(None, None)
        .await
        .unwrap();
    assert_eq!(pending.items.len(), 1);
}

#[tokio::test]
async fn loans_are_listed_for_both_parties() {
    let server = TestServer::spawn().await;
    let borrower = server.borrower_client();
    for book in &server.books {
        borrower.request_loan(book.raw()).await.unwrap();
    }

    assert_eq!(borrower.loans().await.unwrap().len(), 3);
    assert_eq!(server.owner_client().loans().await.unwrap().len(), 3);
    let stranger = server.as_user(kernel::model::id::UserId::new());
    assert!(stranger.loans().await.unwrap().is_empty());
}
