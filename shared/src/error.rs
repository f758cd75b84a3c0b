use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    ValidationError(#[from] garde::Report),
    #[error("データベース処理実行中にエラーが発生しました。")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("Not rows affected: {0}")]
    NoRowAffectedError(String),
    #[error("{0}")]
    TransactionError(#[source] sqlx::Error),
    #[error("{0}")]
    ConvertToUuidError(#[from] uuid::Error),
    #[error("認可情報が間違っています")]
    UnauthorizedError,
    #[error("許可されていない操作です")]
    ForbiddenOperation,
    // CAS に失敗した、もしくは現在の状態からは実行できない遷移
    #[error("貸出の状態が競合しています: {0}")]
    StateConflict(String),
    #[error("この蔵書は現在貸出中です")]
    BookUnavailable,
    #[error("この蔵書には進行中の貸出がすでに存在します")]
    ActiveLoanExists,
    #[error("{0}")]
    InconsistentNotification(String),
    #[error("プッシュ通知を送信できませんでした: {0}")]
    PushDeliveryError(String),
    #[error("{0}")]
    ConversionEntityError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::ConvertToUuidError(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnauthorizedError => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenOperation => StatusCode::FORBIDDEN,
            AppError::StateConflict(_) | AppError::BookUnavailable | AppError::ActiveLoanExists => {
                StatusCode::CONFLICT
            }
            // ストレージ層の障害は単一リクエストの失敗として扱い、再試行可能であることを示す
            AppError::SpecificOperationError(_)
            | AppError::NoRowAffectedError(_)
            | AppError::TransactionError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InconsistentNotification(_)
            | AppError::PushDeliveryError(_)
            | AppError::ConversionEntityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(
                error.cause_chain = ?self,
                error.message = %self,
                "Unexpected error happened"
            );
        }
        status_code.into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
