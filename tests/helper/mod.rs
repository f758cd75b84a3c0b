use std::{collections::HashMap, sync::Arc, time::Duration};

use adapter::repository::memory::InMemoryStore;
use api::route::routes;
use async_trait::async_trait;
use client::{
    connectivity::Connectivity,
    intake::{LocalNotifier, NotificationIntake},
    payload::PushPayload,
    scheduler::TaskScheduler,
    submitter::ConfirmationSubmitter,
};
use kernel::{
    model::{
        id::{BookId, UserId},
        push::{PushMessage, PushToken},
    },
    push::{PushDelivery, PushSender},
};
use registry::AppRegistry;
use shared::{config::NotificationConfig, error::AppResult};
use tokio::{net::TcpListener, sync::Mutex};

pub const STALE_TOKEN: &str = "stale-token";

// 送信内容を記録するだけのプッシュ送信。STALE_TOKEN は失効扱い
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, PushMessage)>>,
}

impl RecordingSender {
    pub async fn sent_to(&self, token: &str) -> Vec<PushMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t == token)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn wait_for(&self, token: &str, count: usize) -> Vec<PushMessage> {
        for _ in 0..200 {
            let sent = self.sent_to(token).await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} push messages to {token}");
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(&self, token: &PushToken, message: &PushMessage) -> AppResult<PushDelivery> {
        self.sent
            .lock()
            .await
            .push((token.token.clone(), message.clone()));
        if token.token == STALE_TOKEN {
            Ok(PushDelivery::TokenRejected)
        } else {
            Ok(PushDelivery::Accepted)
        }
    }
}

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
    pub sender: Arc<RecordingSender>,
    pub owner: UserId,
    pub borrower: UserId,
    pub books: Vec<BookId>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let owner = store.add_user("Alice", None).await;
        let borrower = store
            .add_user("Bob", Some("https://example.com/bob.png"))
            .await;
        let mut books = Vec::new();
        for title in ["Dune", "Neuromancer", "Solaris"] {
            books.push(store.add_book(owner, title).await);
        }

        let sender = Arc::new(RecordingSender::default());
        let (registry, worker) =
            AppRegistry::in_memory(store.clone(), sender.clone(), NotificationConfig::default());
        worker.spawn();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes().with_state(registry);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            sender,
            owner,
            borrower,
            books,
        }
    }

    pub fn book(&self) -> uuid::Uuid {
        self.books[0].raw()
    }

    pub fn as_user(&self, user: UserId) -> ConfirmationSubmitter {
        ConfirmationSubmitter::new(self.base_url.clone(), user.raw())
    }

    pub fn owner_client(&self) -> ConfirmationSubmitter {
        self.as_user(self.owner)
    }

    pub fn borrower_client(&self) -> ConfirmationSubmitter {
        self.as_user(self.borrower)
    }
}

// 利用者の操作を決め打ちで返す通知表示
pub struct ScriptedNotifier {
    decision: Option<bool>,
    presented: std::sync::Mutex<Vec<PushPayload>>,
}

impl ScriptedNotifier {
    pub fn new(decision: Option<bool>) -> Arc<Self> {
        Arc::new(Self {
            decision,
            presented: Default::default(),
        })
    }

    pub fn presented(&self) -> Vec<PushPayload> {
        self.presented.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalNotifier for ScriptedNotifier {
    async fn present(&self, payload: &PushPayload) -> Option<bool> {
        self.presented.lock().unwrap().push(payload.clone());
        if payload.kind.awaits_decision() {
            self.decision
        } else {
            None
        }
    }
}

pub struct Device {
    pub intake: NotificationIntake,
    pub scheduler: Arc<TaskScheduler>,
    pub notifier: Arc<ScriptedNotifier>,
}

pub fn device(api: ConfirmationSubmitter, decision: Option<bool>) -> Device {
    let scheduler = Arc::new(TaskScheduler::new(Connectivity::new(true)));
    let notifier = ScriptedNotifier::new(decision);
    let intake = NotificationIntake::new(Arc::new(api), notifier.clone(), scheduler.clone());
    Device {
        intake,
        scheduler,
        notifier,
    }
}

pub fn push_data(message: &PushMessage) -> HashMap<String, String> {
    message
        .data()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
