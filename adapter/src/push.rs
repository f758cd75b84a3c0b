use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use kernel::{
    model::push::{PushMessage, PushToken},
    push::{PushDelivery, PushSender},
};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use shared::{
    config::PushConfig,
    error::{AppError, AppResult},
};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

// FCM 互換の HTTP エンドポイントへデータメッセージを送る
pub struct FcmPushSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

#[derive(Serialize)]
struct FcmRequest<'a> {
    to: &'a str,
    priority: &'static str,
    data: BTreeMap<&'static str, String>,
}

#[derive(Deserialize)]
struct FcmResponse {
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Deserialize)]
struct FcmResult {
    error: Option<String>,
}

impl FcmPushSender {
    pub fn new(endpoint: String, server_key: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::PushDeliveryError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            server_key,
        })
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn send(&self, token: &PushToken, message: &PushMessage) -> AppResult<PushDelivery> {
        let body = FcmRequest {
            to: &token.token,
            priority: "high",
            data: message.data().into_iter().collect(),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::PushDeliveryError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::PushDeliveryError(format!(
                "push service returned {status}: {body}"
            )));
        }
        let parsed: FcmResponse = resp
            .json()
            .await
            .map_err(|e| AppError::PushDeliveryError(e.to_string()))?;
        let delivery = classify(&parsed)?;
        tracing::debug!(notification_id = %message.notification_id, ?delivery, "push submitted");
        Ok(delivery)
    }
}

fn classify(resp: &FcmResponse) -> AppResult<PushDelivery> {
    match resp.results.first().and_then(|r| r.error.as_deref()) {
        None => Ok(PushDelivery::Accepted),
        Some("NotRegistered" | "InvalidRegistration" | "MismatchSenderId") => {
            Ok(PushDelivery::TokenRejected)
        }
        Some(other) => Err(AppError::PushDeliveryError(other.to_string())),
    }
}

// サーバーキー未設定時に使う。通知はポーリングでのみ届く
pub struct DisabledPushSender;

#[async_trait]
impl PushSender for DisabledPushSender {
    async fn send(&self, _token: &PushToken, _message: &PushMessage) -> AppResult<PushDelivery> {
        Err(AppError::PushDeliveryError(
            "push delivery is not configured".into(),
        ))
    }
}

pub fn push_sender_from(config: &PushConfig) -> AppResult<Arc<dyn PushSender>> {
    let sender: Arc<dyn PushSender> = match &config.server_key {
        Some(key) => Arc::new(FcmPushSender::new(config.endpoint.clone(), key.clone())?),
        None => {
            tracing::warn!("PUSH_SERVER_KEY is not set, push delivery disabled");
            Arc::new(DisabledPushSender)
        }
    };
    Ok(sender)
}
