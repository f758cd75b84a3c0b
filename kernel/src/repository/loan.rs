use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    id::{BookId, LoanId, UserId},
    loan::{
        event::{CreateLoan, TransitionLoan},
        LoanCommit, LoanRecord,
    },
};

#[mockall::automock]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    // 貸出リクエストの登録と貸し手への BorrowRequest の追加をひとつの単位で行う。
    // 同じ蔵書に進行中の貸出があれば ActiveLoanExists で、何も書き込まない
    async fn create(&self, event: CreateLoan) -> AppResult<LoanCommit>;
    // 存在しなければ EntityNotFound
    async fn get(&self, loan_id: LoanId) -> AppResult<LoanRecord>;
    // 状態の compare-and-swap。現在の状態が expected と異なれば StateConflict。
    // 成功時は同じ単位で、判断の済んだ通知を確認済みにし、遷移先を知らせる通知を追加する
    async fn transition(&self, event: TransitionLoan) -> AppResult<LoanCommit>;
    // 蔵書 ID に紐づく進行中の貸出
    async fn find_active_by_book_id(&self, book_id: BookId) -> AppResult<Option<LoanRecord>>;
    // 貸し手・借り手のどちらかとして関わる貸出（新しい順）
    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<LoanRecord>>;
}
