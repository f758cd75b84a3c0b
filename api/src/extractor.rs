use std::str::FromStr;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, HeaderValue},
    RequestPartsExt,
};
use axum_extra::{
    headers::{self, Header},
    TypedHeader,
};
use kernel::model::id::UserId;
use shared::error::AppError;

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

// 前段の認証基盤が付与する呼び出し元ユーザーの ID
#[derive(Debug, Clone, Copy)]
pub struct XUserId(pub UserId);

impl Header for XUserId {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let raw = value.to_str().map_err(|_| headers::Error::invalid())?;
        UserId::from_str(raw.trim())
            .map(Self)
            .map_err(|_| headers::Error::invalid())
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            values.extend(std::iter::once(value));
        }
    }
}

// リクエストの前処理を実行後、handler に渡す構造体を定義
#[derive(Debug, Clone, Copy)]
pub struct AuthorizedUser {
    user_id: UserId,
}

impl AuthorizedUser {
    pub fn id(&self) -> UserId {
        self.user_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthorizedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    // handler メソッドの引数に AuthorizedUser を追加したときはこのメソッドが呼ばれる
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ヘッダがない、または UUID として読めない場合は未認証扱い
        let TypedHeader(XUserId(user_id)) = parts
            .extract::<TypedHeader<XUserId>>()
            .await
            .map_err(|_| AppError::UnauthorizedError)?;
        Ok(Self { user_id })
    }
}
