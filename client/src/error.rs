use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("push payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("push payload has an invalid `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl ClientError {
    // サーバが返したステータスコード。通信エラーなどでは None
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
