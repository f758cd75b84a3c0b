use std::sync::Arc;

use adapter::{
    database::ConnectionPool,
    push::push_sender_from,
    repository::{
        book::BookRepositoryImpl, health::HealthCheckRepositoryImpl, loan::LoanRepositoryImpl,
        memory::InMemoryStore, notification::NotificationRepositoryImpl,
        push_token::PushTokenRepositoryImpl, user::UserRepositoryImpl,
    },
};
use kernel::{
    push::PushSender,
    repository::{
        book::BookRepository, health::HealthCheckRepository, loan::LoanRepository,
        notification::NotificationRepository, push_token::PushTokenRepository,
        user::UserRepository,
    },
    service::{
        confirmation::ConfirmationService,
        push::{notification_channel, NotificationInbox, PushDispatcher},
    },
};
use shared::{
    config::{AppConfig, NotificationConfig},
    error::AppResult,
};
use tokio::task::JoinHandle;

// DI コンテナの役割を果たす。プロセス起動時に一度だけ組み立てる
#[derive(Clone)]
pub struct AppRegistry {
    health_check_repository: Arc<dyn HealthCheckRepository>,
    notification_repository: Arc<dyn NotificationRepository>,
    push_token_repository: Arc<dyn PushTokenRepository>,
    confirmation_service: Arc<ConfirmationService>,
    notification_config: NotificationConfig,
}

// プッシュ配信のワーカーと、ConfirmationService が書き込むキューの受信側。
// HTTP サーバーと並べて一度だけ起動する
pub struct PushWorker {
    dispatcher: Arc<PushDispatcher>,
    inbox: NotificationInbox,
}

impl PushWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.dispatcher.run(self.inbox))
    }
}

struct Repositories {
    health_check: Arc<dyn HealthCheckRepository>,
    loan: Arc<dyn LoanRepository>,
    notification: Arc<dyn NotificationRepository>,
    push_token: Arc<dyn PushTokenRepository>,
    book: Arc<dyn BookRepository>,
    user: Arc<dyn UserRepository>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, app_config: &AppConfig) -> AppResult<(Self, PushWorker)> {
        let repositories = Repositories {
            health_check: Arc::new(HealthCheckRepositoryImpl::new(pool.clone())),
            loan: Arc::new(LoanRepositoryImpl::new(pool.clone())),
            notification: Arc::new(NotificationRepositoryImpl::new(pool.clone())),
            push_token: Arc::new(PushTokenRepositoryImpl::new(pool.clone())),
            book: Arc::new(BookRepositoryImpl::new(pool.clone())),
            user: Arc::new(UserRepositoryImpl::new(pool)),
        };
        let sender = push_sender_from(&app_config.push)?;
        Ok(Self::assemble(
            repositories,
            sender,
            app_config.notification,
        ))
    }

    // データベースを使わずに全リポジトリを InMemoryStore で構成する
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        sender: Arc<dyn PushSender>,
        notification_config: NotificationConfig,
    ) -> (Self, PushWorker) {
        let repositories = Repositories {
            health_check: store.clone(),
            loan: store.clone(),
            notification: store.clone(),
            push_token: store.clone(),
            book: store.clone(),
            user: store,
        };
        Self::assemble(repositories, sender, notification_config)
    }

    fn assemble(
        repositories: Repositories,
        sender: Arc<dyn PushSender>,
        notification_config: NotificationConfig,
    ) -> (Self, PushWorker) {
        let (outbox, inbox) = notification_channel();
        let confirmation_service = Arc::new(ConfirmationService::new(
            repositories.loan.clone(),
            repositories.notification.clone(),
            repositories.book.clone(),
            outbox,
        ));
        let dispatcher = Arc::new(PushDispatcher::new(
            repositories.push_token.clone(),
            repositories.notification.clone(),
            repositories.loan,
            repositories.book,
            repositories.user,
            sender,
        ));
        let registry = Self {
            health_check_repository: repositories.health_check,
            notification_repository: repositories.notification,
            push_token_repository: repositories.push_token,
            confirmation_service,
            notification_config,
        };
        (registry, PushWorker { dispatcher, inbox })
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn notification_repository(&self) -> Arc<dyn NotificationRepository> {
        self.notification_repository.clone()
    }

    pub fn push_token_repository(&self) -> Arc<dyn PushTokenRepository> {
        self.push_token_repository.clone()
    }

    pub fn confirmation_service(&self) -> Arc<ConfirmationService> {
        self.confirmation_service.clone()
    }

    pub fn notification_config(&self) -> NotificationConfig {
        self.notification_config
    }
}
