use std::sync::Arc;

use chrono::Utc;
use derive_new::new;
use shared::error::{AppError, AppResult};

use super::push::NotificationOutbox;
use crate::{
    model::{
        id::{BookId, LoanId, NotificationId, UserId},
        loan::{
            event::{CreateLoan, TransitionLoan},
            LoanCommit, LoanParty, LoanRecord, LoanState,
        },
        notification::{event::CreateNotification, Notification, NotificationKind},
    },
    repository::{book::BookRepository, loan::LoanRepository, notification::NotificationRepository},
};

// 貸出記録を書き換え、通知を生み出すのはこのサービスだけ。
// 適用済みの判断が再送された場合は、現在の記録を返して何も通知しない
#[derive(new, Clone)]
pub struct ConfirmationService {
    loan_repository: Arc<dyn LoanRepository>,
    notification_repository: Arc<dyn NotificationRepository>,
    book_repository: Arc<dyn BookRepository>,
    outbox: NotificationOutbox,
}

impl ConfirmationService {
    pub async fn request_loan(&self, book_id: BookId, borrower_id: UserId) -> AppResult<LoanRecord> {
        let book = self
            .book_repository
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound(format!("book {book_id} not found")))?;
        // 自分の蔵書は借りられない
        if book.owner.id == borrower_id {
            return Err(AppError::ForbiddenOperation);
        }
        if let Some(active) = self.loan_repository.find_active_by_book_id(book_id).await? {
            tracing::debug!(
                %book_id,
                loan_id = %active.id,
                state = %active.state,
                "book already has an active loan"
            );
            return Err(AppError::BookUnavailable);
        }

        // 確認後に別のリクエストが割り込んだ場合は一意制約が弾く
        let event = CreateLoan::new(book_id, book.owner.id, borrower_id, Utc::now());
        let commit = self.loan_repository.create(event).await.map_err(|e| match e {
            AppError::ActiveLoanExists => AppError::BookUnavailable,
            e => e,
        })?;

        tracing::info!(loan_id = %commit.loan.id, %book_id, %borrower_id, "loan requested");
        Ok(self.dispatch(commit))
    }

    pub async fn confirm_borrow(
        &self,
        loan_id: LoanId,
        caller: UserId,
        decision: bool,
    ) -> AppResult<LoanRecord> {
        let loan = self.loan_repository.get(loan_id).await?;
        loan.authorize(caller, LoanParty::Owner)?;

        if loan.state == LoanState::Requested {
            let next = if decision {
                LoanState::Confirmed
            } else {
                LoanState::Cancelled
            };
            if let Some(commit) = self.try_transition(&loan, next).await? {
                tracing::info!(%loan_id, state = %commit.loan.state, "borrow decided");
                return Ok(self.dispatch(commit));
            }
            // CAS の競合に負けた側は勝者の結果を返す
            return self.loan_repository.get(loan_id).await;
        }

        // 適用済みの判断の再送
        Ok(loan)
    }

    pub async fn request_return(&self, loan_id: LoanId, caller: UserId) -> AppResult<LoanRecord> {
        let loan = self.loan_repository.get(loan_id).await?;
        loan.authorize(caller, LoanParty::Borrower)?;

        match loan.state {
            LoanState::Confirmed => match self
                .try_transition(&loan, LoanState::ReturnRequested)
                .await?
            {
                Some(commit) => {
                    tracing::info!(%loan_id, "return requested");
                    Ok(self.dispatch(commit))
                }
                None => {
                    let current = self.loan_repository.get(loan_id).await?;
                    match current.state {
                        LoanState::ReturnRequested | LoanState::Returned => Ok(current),
                        state => Err(conflict(loan_id, state, "request a return")),
                    }
                }
            },
            LoanState::ReturnRequested => self.renotify_return_request(loan).await,
            LoanState::Returned => Ok(loan),
            state @ (LoanState::Requested | LoanState::Cancelled) => {
                Err(conflict(loan_id, state, "request a return"))
            }
        }
    }

    pub async fn confirm_return(
        &self,
        loan_id: LoanId,
        caller: UserId,
        decision: bool,
    ) -> AppResult<LoanRecord> {
        let loan = self.loan_repository.get(loan_id).await?;
        loan.authorize(caller, LoanParty::Owner)?;

        match loan.state {
            LoanState::ReturnRequested if decision => {
                match self.try_transition(&loan, LoanState::Returned).await? {
                    Some(commit) => {
                        tracing::info!(%loan_id, book_id = %commit.loan.book_id, "loan returned");
                        Ok(self.dispatch(commit))
                    }
                    None => {
                        let current = self.loan_repository.get(loan_id).await?;
                        match current.state {
                            LoanState::Returned => Ok(current),
                            state => Err(conflict(loan_id, state, "confirm a return")),
                        }
                    }
                }
            }
            LoanState::ReturnRequested => {
                // 状態は変えずに借り手へ再通知する。確認待ちの返却リクエストが
                // 残っていなければ同じ判断の再送なので何もしない
                let disputed = CreateNotification::for_loan(
                    NotificationKind::ReturnDisputed,
                    &loan,
                    Utc::now(),
                )?;
                let resolved = self
                    .notification_repository
                    .resolve_pending(NotificationKind::ReturnRequest, loan.owner_id, disputed)
                    .await?;
                if let Some(notification) = resolved {
                    tracing::info!(%loan_id, "return disputed by owner");
                    self.hand_off(notification);
                }
                Ok(loan)
            }
            LoanState::Returned => Ok(loan),
            state => Err(conflict(loan_id, state, "confirm a return")),
        }
    }

    // 当事者のみ参照できる
    pub async fn loan_for(&self, loan_id: LoanId, caller: UserId) -> AppResult<LoanRecord> {
        let loan = self.loan_repository.get(loan_id).await?;
        loan.party_of(caller)
            .map(|_| loan)
            .ok_or(AppError::ForbiddenOperation)
    }

    pub async fn loans_for(&self, caller: UserId) -> AppResult<Vec<LoanRecord>> {
        self.loan_repository.find_by_user_id(caller).await
    }

    pub async fn acknowledge_notification(
        &self,
        notification_id: NotificationId,
        caller: UserId,
    ) -> AppResult<()> {
        self.owned_notification(notification_id, caller).await?;
        self.notification_repository
            .mark_acknowledged(notification_id)
            .await
    }

    pub async fn archive_notification(
        &self,
        notification_id: NotificationId,
        caller: UserId,
    ) -> AppResult<()> {
        self.owned_notification(notification_id, caller).await?;
        self.notification_repository.archive(notification_id).await
    }

    async fn owned_notification(
        &self,
        notification_id: NotificationId,
        caller: UserId,
    ) -> AppResult<Notification> {
        let notification = self
            .notification_repository
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| {
                AppError::EntityNotFound(format!("notification {notification_id} not found"))
            })?;
        if notification.recipient_id != caller {
            return Err(AppError::ForbiddenOperation);
        }
        Ok(notification)
    }

    // 紛争後の再リクエストのみ通知を出し直す
    async fn renotify_return_request(&self, loan: LoanRecord) -> AppResult<LoanRecord> {
        let pending = self
            .notification_repository
            .find_pending_by_loan(loan.id, loan.owner_id)
            .await?;
        if !pending
            .iter()
            .any(|n| n.kind == NotificationKind::ReturnRequest)
        {
            let event =
                CreateNotification::for_loan(NotificationKind::ReturnRequest, &loan, Utc::now())?;
            let notification = self.notification_repository.append(event).await?;
            tracing::info!(loan_id = %loan.id, "return re-requested after dispute");
            self.hand_off(notification);
        }
        Ok(loan)
    }

    // Ok(None) は別のリクエストが CAS に勝ったことを表す
    async fn try_transition(
        &self,
        loan: &LoanRecord,
        next: LoanState,
    ) -> AppResult<Option<LoanCommit>> {
        let event = TransitionLoan::new(loan.id, loan.state, next, Utc::now())?;
        match self.loan_repository.transition(event).await {
            Ok(commit) => Ok(Some(commit)),
            Err(AppError::StateConflict(reason)) => {
                tracing::debug!(loan_id = %loan.id, %reason, "lost transition race");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn dispatch(&self, commit: LoanCommit) -> LoanRecord {
        self.hand_off(commit.notification);
        commit.loan
    }

    // 通知はすでに保存済み。プッシュ配信に渡せなくてもポーリングで届く
    fn hand_off(&self, notification: Notification) {
        let notification_id = notification.id;
        if self.outbox.send(notification).is_err() {
            tracing::warn!(
                %notification_id,
                "push dispatcher is not running, notification left for polling"
            );
        }
    }
}

fn conflict(loan_id: LoanId, state: LoanState, action: &str) -> AppError {
    AppError::StateConflict(format!("cannot {action} for loan {loan_id} in state {state}"))
}
