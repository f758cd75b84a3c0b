use axum::{extract::State, http::StatusCode, Json};
use garde::Validate;
use registry::AppRegistry;
use shared::error::AppResult;

use crate::{extractor::AuthorizedUser, model::user::PushTokenRequest};

// 端末のトークン更新。古いトークンは上書きされる
pub async fn register_push_token(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Json(req): Json<PushTokenRequest>,
) -> AppResult<StatusCode> {
    req.validate(&())?;

    registry
        .push_token_repository()
        .upsert(user.id(), req.token)
        .await
        .map(|_| StatusCode::OK)
}
