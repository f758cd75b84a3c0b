use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ClientError, ClientResult},
    model::{LoanList, LoanSummary, PendingPage},
};

const USER_ID_HEADER: &str = "x-user-id";

// 端末がひとりの利用者として貸出サービスへ行う呼び出し
#[mockall::automock]
#[async_trait]
pub trait ConfirmationApi: Send + Sync {
    async fn request_loan(&self, book_id: Uuid) -> ClientResult<LoanSummary>;
    async fn confirm_borrow(&self, record_id: Uuid, decision: bool) -> ClientResult<LoanSummary>;
    async fn request_return(&self, record_id: Uuid) -> ClientResult<LoanSummary>;
    async fn confirm_return(&self, record_id: Uuid, decision: bool) -> ClientResult<LoanSummary>;
    async fn fetch_pending(&self, after: Option<String>, limit: Option<i64>)
        -> ClientResult<PendingPage>;
    async fn acknowledge(&self, notification_id: Uuid) -> ClientResult<()>;
    async fn report_push_token(&self, token: String) -> ClientResult<()>;
}

// 判断は手元で重複を除かずにそのまま送る。同じ記録への再送にはサーバーが現在の状態で応える
#[derive(Debug, Clone)]
pub struct ConfirmationSubmitter {
    client: reqwest::Client,
    base_url: String,
    user_id: Uuid,
}

impl ConfirmationSubmitter {
    // base_url は末尾にスラッシュを付けない（例: http://localhost:8080）
    pub fn new(base_url: String, user_id: Uuid) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, user_id)
    }

    pub fn with_client(client: reqwest::Client, base_url: String, user_id: Uuid) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn loan(&self, record_id: Uuid) -> ClientResult<LoanSummary> {
        let url = format!("{}/loan/{record_id}", self.base_url);
        self.fetch_json(self.client.get(&url)).await
    }

    pub async fn loans(&self) -> ClientResult<Vec<LoanSummary>> {
        let url = format!("{}/loans", self.base_url);
        let list: LoanList = self.fetch_json(self.client.get(&url)).await?;
        Ok(list.items)
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "posting to lending service");
        self.fetch_json(self.client.post(&url).json(body)).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let resp = self.send(request).await?;
        parse_body(&resp.text().await?)
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let resp = request
            .header(USER_ID_HEADER, self.user_id.to_string())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl ConfirmationApi for ConfirmationSubmitter {
    async fn request_loan(&self, book_id: Uuid) -> ClientResult<LoanSummary> {
        let body = json!({ "bookId": book_id, "borrowerId": self.user_id });
        let loan: LoanSummary = self.post_json("/loan/request", &body).await?;
        tracing::info!(record_id = %loan.record_id, %book_id, "loan requested");
        Ok(loan)
    }

    async fn confirm_borrow(&self, record_id: Uuid, decision: bool) -> ClientResult<LoanSummary> {
        let path = format!("/loan/{record_id}/confirm-borrow");
        self.post_json(&path, &json!({ "decision": decision })).await
    }

    async fn request_return(&self, record_id: Uuid) -> ClientResult<LoanSummary> {
        let path = format!("/loan/{record_id}/request-return");
        self.post_json(&path, &json!({})).await
    }

    async fn confirm_return(&self, record_id: Uuid, decision: bool) -> ClientResult<LoanSummary> {
        let path = format!("/loan/{record_id}/confirm-return");
        self.post_json(&path, &json!({ "decision": decision })).await
    }

    async fn fetch_pending(
        &self,
        after: Option<String>,
        limit: Option<i64>,
    ) -> ClientResult<PendingPage> {
        let url = format!("{}/notifications/{}", self.base_url, self.user_id);
        let mut query = Vec::new();
        if let Some(after) = after {
            query.push(("after", after));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.fetch_json(self.client.get(&url).query(&query)).await
    }

    async fn acknowledge(&self, notification_id: Uuid) -> ClientResult<()> {
        let url = format!("{}/notifications/{notification_id}/acknowledge", self.base_url);
        self.send(self.client.post(&url)).await.map(|_| ())
    }

    async fn report_push_token(&self, token: String) -> ClientResult<()> {
        let url = format!("{}/users/me/push-token", self.base_url);
        self.send(self.client.put(&url).json(&json!({ "token": token })))
            .await?;
        tracing::info!(user_id = %self.user_id, "push token reported");
        Ok(())
    }
}
