use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use kernel::{
    model::{
        book::Book,
        id::{BookId, LoanId, NotificationId, UserId},
        loan::{
            event::{CreateLoan, TransitionLoan},
            LoanCommit, LoanRecord, LoanState,
        },
        notification::{
            event::CreateNotification, Notification, NotificationKind, NotificationView,
            PendingCursor,
        },
        push::PushToken,
        user::{BookOwner, UserProfile},
    },
    repository::{
        book::BookRepository, health::HealthCheckRepository, loan::LoanRepository,
        notification::NotificationRepository, push_token::PushTokenRepository,
        user::UserRepository,
    },
};
use shared::error::{AppError, AppResult};
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserProfile>,
    books: HashMap<BookId, (String, UserId)>,
    loans: HashMap<LoanId, LoanRecord>,
    // 追記順に保持する
    notifications: Vec<Notification>,
    push_tokens: HashMap<UserId, PushToken>,
}

impl State {
    // 検証はすべて書き込みの前に済ませ、失敗した場合は何も変えない
    fn commit(&mut self, loan: LoanRecord, announced: CreateNotification) -> LoanCommit {
        if let Some(resolved) = NotificationKind::resolved_on(loan.state) {
            self.acknowledge_pending(loan.id, resolved.recipient(&loan), resolved);
        }
        self.loans.insert(loan.id, loan.clone());
        let notification = self.push_notification(announced);
        LoanCommit { loan, notification }
    }

    fn push_notification(&mut self, event: CreateNotification) -> Notification {
        let notification = Notification {
            id: event.id,
            loan_id: event.loan_id,
            recipient_id: event.recipient_id,
            kind: event.kind,
            created_at: event.created_at,
            delivered: false,
            acknowledged: false,
            archived: false,
        };
        self.notifications.push(notification.clone());
        notification
    }

    fn acknowledge_pending(
        &mut self,
        loan_id: LoanId,
        recipient_id: UserId,
        kind: NotificationKind,
    ) -> u64 {
        let mut flipped = 0;
        for n in self.notifications.iter_mut().filter(|n| {
            n.loan_id == loan_id && n.recipient_id == recipient_id && n.kind == kind
        }) {
            if !n.acknowledged {
                n.acknowledged = true;
                flipped += 1;
            }
        }
        flipped
    }

    fn notification_mut(&mut self, id: NotificationId) -> AppResult<&mut Notification> {
        self.notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AppError::EntityNotFound(format!("notification {id} not found")))
    }
}

// 全リポジトリを単一のロックの下で実装するプロセス内のストア。結合テストで使う。
// CAS と蔵書ごとの進行中の貸出の一意性はデータベースと同じく守られる
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, name: &str, profile_picture: Option<&str>) -> UserId {
        let id = UserId::new();
        self.state.lock().await.users.insert(
            id,
            UserProfile {
                id,
                name: name.to_string(),
                profile_picture: profile_picture.map(str::to_string),
            },
        );
        id
    }

    pub async fn add_book(&self, owner_id: UserId, title: &str) -> BookId {
        let id = BookId::new();
        self.state
            .lock()
            .await
            .books
            .insert(id, (title.to_string(), owner_id));
        id
    }

    // テストでの検査用
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }
}

#[async_trait]
impl LoanRepository for InMemoryStore {
    async fn create(&self, event: CreateLoan) -> AppResult<LoanCommit> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&event.book_id) {
            return Err(AppError::EntityNotFound(format!(
                "book {} or its users do not exist",
                event.book_id
            )));
        }
        if state
            .loans
            .values()
            .any(|l| l.book_id == event.book_id && l.state.is_active())
        {
            return Err(AppError::ActiveLoanExists);
        }
        let loan = LoanRecord {
            id: LoanId::new(),
            book_id: event.book_id,
            owner_id: event.owner_id,
            borrower_id: event.borrower_id,
            state: LoanState::Requested,
            requested_at: event.requested_at,
            confirmed_at: None,
            return_requested_at: None,
            returned_at: None,
            cancelled_at: None,
        };
        let announced = CreateNotification::announcing(&loan, event.requested_at)?;
        Ok(state.commit(loan, announced))
    }

    async fn get(&self, loan_id: LoanId) -> AppResult<LoanRecord> {
        self.state
            .lock()
            .await
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| AppError::EntityNotFound(format!("loan {loan_id} not found")))
    }

    async fn transition(&self, event: TransitionLoan) -> AppResult<LoanCommit> {
        let mut state = self.state.lock().await;
        let mut loan = state
            .loans
            .get(&event.loan_id)
            .cloned()
            .ok_or_else(|| AppError::EntityNotFound(format!("loan {} not found", event.loan_id)))?;
        loan.apply(&event)?;
        let announced = CreateNotification::announcing(&loan, event.at)?;
        Ok(state.commit(loan, announced))
    }

    async fn find_active_by_book_id(&self, book_id: BookId) -> AppResult<Option<LoanRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .loans
            .values()
            .find(|l| l.book_id == book_id && l.state.is_active())
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<LoanRecord>> {
        let state = self.state.lock().await;
        let mut loans: Vec<_> = state
            .loans
            .values()
            .filter(|l| l.party_of(user_id).is_some())
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(loans)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn append(&self, event: CreateNotification) -> AppResult<Notification> {
        let mut state = self.state.lock().await;
        if !state.loans.contains_key(&event.loan_id) {
            return Err(AppError::EntityNotFound(format!(
                "loan {} not found",
                event.loan_id
            )));
        }
        Ok(state.push_notification(event))
    }

    async fn find_by_id(
        &self,
        notification_id: NotificationId,
    ) -> AppResult<Option<Notification>> {
        Ok(self
            .state
            .lock()
            .await
            .notifications
            .iter()
            .find(|n| n.id == notification_id)
            .cloned())
    }

    async fn find_pending_by_loan(
        &self,
        loan_id: LoanId,
        recipient_id: UserId,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .state
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.loan_id == loan_id && n.recipient_id == recipient_id && n.is_pending())
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, notification_id: NotificationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.notification_mut(notification_id)?.delivered = true;
        Ok(())
    }

    async fn mark_acknowledged(&self, notification_id: NotificationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.notification_mut(notification_id)?.acknowledged = true;
        Ok(())
    }

    async fn archive(&self, notification_id: NotificationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.notification_mut(notification_id)?.archived = true;
        Ok(())
    }

    async fn resolve_pending(
        &self,
        resolved: NotificationKind,
        recipient_id: UserId,
        follow_up: CreateNotification,
    ) -> AppResult<Option<Notification>> {
        let mut state = self.state.lock().await;
        if state.acknowledge_pending(follow_up.loan_id, recipient_id, resolved) == 0 {
            return Ok(None);
        }
        Ok(Some(state.push_notification(follow_up)))
    }

    async fn list_pending(
        &self,
        user_id: UserId,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> AppResult<Vec<NotificationView>> {
        let state = self.state.lock().await;
        let mut pending: Vec<&Notification> = state
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && n.is_pending())
            .filter(|n| after.map_or(true, |c| n.cursor() > c))
            .collect();
        pending.sort_by_key(|n| n.cursor());

        pending
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|n| -> AppResult<NotificationView> {
                let loan = state.loans.get(&n.loan_id).ok_or_else(|| {
                    AppError::ConversionEntityError(format!("loan {} vanished", n.loan_id))
                })?;
                let book_name = state
                    .books
                    .get(&loan.book_id)
                    .map(|(title, _)| title.clone())
                    .unwrap_or_default();
                let counterpart = state.users.get(&loan.counterpart_of(user_id));
                Ok(NotificationView {
                    notification: n.clone(),
                    book_name,
                    user_name: counterpart.map(|u| u.name.clone()).unwrap_or_default(),
                    profile_picture: counterpart.and_then(|u| u.profile_picture.clone()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl PushTokenRepository for InMemoryStore {
    async fn upsert(&self, user_id: UserId, token: String) -> AppResult<PushToken> {
        let token = PushToken {
            user_id,
            token,
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .push_tokens
            .insert(user_id, token.clone());
        Ok(token)
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Option<PushToken>> {
        Ok(self.state.lock().await.push_tokens.get(&user_id).cloned())
    }

    async fn discard(&self, user_id: UserId, token: String) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.push_tokens.get(&user_id) {
            Some(current) if current.token == token => {
                state.push_tokens.remove(&user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn find_by_id(&self, book_id: BookId) -> AppResult<Option<Book>> {
        let state = self.state.lock().await;
        Ok(state.books.get(&book_id).map(|(title, owner_id)| Book {
            id: book_id,
            title: title.clone(),
            owner: BookOwner {
                id: *owner_id,
                name: state
                    .users
                    .get(owner_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default(),
            },
        }))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_profile(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl HealthCheckRepository for InMemoryStore {
    async fn check_db(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use kernel::service::{confirmation::ConfirmationService, push::notification_channel};
    use rstest::rstest;

    use super::*;

    async fn seeded() -> (InMemoryStore, BookId, UserId, UserId) {
        let store = InMemoryStore::new();
        let owner = store.add_user("owner", None).await;
        let borrower = store.add_user("borrower", Some("https://example.com/b.png")).await;
        let book = store.add_book(owner, "Dune").await;
        (store, book, owner, borrower)
    }

    // 次の遷移だけストレージ障害として失敗させる。after_commit なら書き込みは済ませる
    struct FaultyLoans {
        store: Arc<InMemoryStore>,
        after_commit: bool,
        armed: AtomicBool,
    }

    #[async_trait]
    impl LoanRepository for FaultyLoans {
        async fn create(&self, event: CreateLoan) -> AppResult<LoanCommit> {
            LoanRepository::create(self.store.as_ref(), event).await
        }

        async fn get(&self, loan_id: LoanId) -> AppResult<LoanRecord> {
            LoanRepository::get(self.store.as_ref(), loan_id).await
        }

        async fn transition(&self, event: TransitionLoan) -> AppResult<LoanCommit> {
            if !self.armed.swap(false, Ordering::SeqCst) {
                return self.store.transition(event).await;
            }
            if self.after_commit {
                self.store.transition(event).await?;
            }
            Err(AppError::TransactionError(sqlx::Error::PoolTimedOut))
        }

        async fn find_active_by_book_id(&self, book_id: BookId) -> AppResult<Option<LoanRecord>> {
            self.store.find_active_by_book_id(book_id).await
        }

        async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<LoanRecord>> {
            LoanRepository::find_by_user_id(self.store.as_ref(), user_id).await
        }
    }

    #[tokio::test]
    async fn concurrent_transitions_have_one_winner() {
        let (store, book, owner, borrower) = seeded().await;
        let store = Arc::new(store);
        let loan_id = LoanRepository::create(
            store.as_ref(),
            CreateLoan::new(book, owner, borrower, Utc::now()),
        )
        .await
        .unwrap()
        .loan
        .id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let next = if i % 2 == 0 {
                    LoanState::Confirmed
                } else {
                    LoanState::Cancelled
                };
                tokio::spawn(async move {
                    let t = TransitionLoan::new(loan_id, LoanState::Requested, next, Utc::now())
                        .unwrap();
                    store.transition(t).await
                })
            })
            .collect();

        let mut winners = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::StateConflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners, 1);
        // 通知も勝者の一件だけ
        let borrower_side: Vec<_> = store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.recipient_id == borrower)
            .collect();
        assert_eq!(borrower_side.len(), 1);
    }

    #[tokio::test]
    async fn transition_resolves_the_request_and_announces_the_decision() {
        let (store, book, owner, borrower) = seeded().await;
        let requested =
            LoanRepository::create(&store, CreateLoan::new(book, owner, borrower, Utc::now()))
                .await
                .unwrap();
        assert_eq!(requested.notification.kind, NotificationKind::BorrowRequest);
        assert_eq!(requested.notification.recipient_id, owner);

        let t = TransitionLoan::new(
            requested.loan.id,
            LoanState::Requested,
            LoanState::Confirmed,
            Utc::now(),
        )
        .unwrap();
        let confirmed = store.transition(t).await.unwrap();
        assert_eq!(confirmed.notification.kind, NotificationKind::BorrowConfirmed);

        assert!(store.list_pending(owner, None, 10).await.unwrap().is_empty());
        let pending = store.list_pending(borrower, None, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].notification.id, confirmed.notification.id);
    }

    #[tokio::test]
    async fn failed_create_writes_nothing() {
        let (store, book, owner, borrower) = seeded().await;
        LoanRepository::create(&store, CreateLoan::new(book, owner, borrower, Utc::now()))
            .await
            .unwrap();
        let res =
            LoanRepository::create(&store, CreateLoan::new(book, owner, borrower, Utc::now()))
                .await;
        assert!(matches!(res, Err(AppError::ActiveLoanExists)));
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[rstest]
    #[case::before_commit(false)]
    #[case::after_commit(true)]
    #[tokio::test]
    async fn storage_fault_during_confirmation_is_safe_to_retry(#[case] after_commit: bool) {
        let (store, book, owner, borrower) = seeded().await;
        let store = Arc::new(store);
        let loans = Arc::new(FaultyLoans {
            store: store.clone(),
            after_commit,
            armed: AtomicBool::new(false),
        });
        let (outbox, _inbox) = notification_channel();
        let service = ConfirmationService::new(loans.clone(), store.clone(), store.clone(), outbox);
        let requested = service.request_loan(book, borrower).await.unwrap();

        loans.armed.store(true, Ordering::SeqCst);
        let failed = service.confirm_borrow(requested.id, owner, true).await;
        assert!(matches!(failed, Err(AppError::TransactionError(_))));

        let retried = service.confirm_borrow(requested.id, owner, true).await.unwrap();
        assert_eq!(retried.state, LoanState::Confirmed);

        // どちらの場合も、借り手には確認の通知がちょうど一件届いている
        let pending = store.list_pending(borrower, None, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].notification.kind, NotificationKind::BorrowConfirmed);
        assert!(store.list_pending(owner, None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispute_is_written_only_while_a_request_is_pending() {
        let (store, book, owner, borrower) = seeded().await;
        let requested =
            LoanRepository::create(&store, CreateLoan::new(book, owner, borrower, Utc::now()))
                .await
                .unwrap();
        let loan_id = requested.loan.id;
        for (from, to) in [
            (LoanState::Requested, LoanState::Confirmed),
            (LoanState::Confirmed, LoanState::ReturnRequested),
        ] {
            let t = TransitionLoan::new(loan_id, from, to, Utc::now()).unwrap();
            store.transition(t).await.unwrap();
        }
        let loan = LoanRepository::get(&store, loan_id).await.unwrap();

        let disputed = || {
            CreateNotification::for_loan(NotificationKind::ReturnDisputed, &loan, Utc::now())
                .unwrap()
        };
        let first = store
            .resolve_pending(NotificationKind::ReturnRequest, owner, disputed())
            .await
            .unwrap();
        assert!(first.is_some());
        let again = store
            .resolve_pending(NotificationKind::ReturnRequest, owner, disputed())
            .await
            .unwrap();
        assert!(again.is_none());

        let kinds: Vec<_> = store
            .list_pending(borrower, None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.notification.kind)
            .collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&NotificationKind::ReturnDisputed));
    }

    #[tokio::test]
    async fn discard_ignores_rotated_token() {
        let (store, _, owner, _) = seeded().await;
        store.upsert(owner, "old".into()).await.unwrap();
        store.upsert(owner, "new".into()).await.unwrap();

        assert!(!store.discard(owner, "old".into()).await.unwrap());
        let current = PushTokenRepository::find_by_user_id(&store, owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.token, "new");
        assert!(store.discard(owner, "new".into()).await.unwrap());
        assert!(PushTokenRepository::find_by_user_id(&store, owner)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn pending_list_joins_counterpart_and_skips_acknowledged() {
        let (store, book, owner, borrower) = seeded().await;
        let requested =
            LoanRepository::create(&store, CreateLoan::new(book, owner, borrower, Utc::now()))
                .await
                .unwrap();
        let id = requested.notification.id;

        let views = store.list_pending(owner, None, 10).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].book_name, "Dune");
        assert_eq!(views[0].user_name, "borrower");
        assert_eq!(
            views[0].profile_picture.as_deref(),
            Some("https://example.com/b.png")
        );

        // 何度配送済みにしても一覧には一度だけ現れる
        store.mark_delivered(id).await.unwrap();
        store.mark_delivered(id).await.unwrap();
        assert_eq!(store.list_pending(owner, None, 10).await.unwrap().len(), 1);

        store.mark_acknowledged(id).await.unwrap();
        assert!(store.list_pending(owner, None, 10).await.unwrap().is_empty());
    }
}
