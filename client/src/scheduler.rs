use std::{
    future::Future,
    mem,
    sync::{Mutex, PoisonError},
};

use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    // ネットワークに繋がるまで実行を待つ
    NetworkConnected,
}

// 端末のジョブスケジューラと同じく、呼び出し元のコールバックの外でバックグラウンド処理を走らせる
pub struct TaskScheduler {
    connectivity: Connectivity,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn schedule<F>(&self, name: &'static str, constraint: Constraint, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if constraint == Constraint::NetworkConnected && !self.connectivity.is_online() {
            tracing::debug!(task = name, "offline, task deferred until connected");
        }
        let mut online = self.connectivity.subscribe();
        let handle = tokio::spawn(async move {
            if constraint == Constraint::NetworkConnected
                && online.wait_for(|online| *online).await.is_err()
            {
                tracing::debug!(task = name, "connectivity source closed, task dropped");
                return;
            }
            tracing::debug!(task = name, "running scheduled task");
            task.await;
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    // 実行待ち・実行中のタスクをすべて打ち切る。サーバ側の状態には触れない
    pub fn cancel_all(&self) -> usize {
        let tasks = mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let cancelled = tasks.iter().filter(|t| !t.is_finished()).count();
        for task in tasks {
            task.abort();
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "scheduled tasks cancelled");
        }
        cancelled
    }

    // 待っている間に追加されたものも含め、すべてのタスクが終わるかキャンセルされるまで待つ
    pub async fn wait_idle(&self) {
        loop {
            let tasks = mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}
