use garde::Validate;
use serde::Deserialize;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRequest {
    #[garde(length(min = 1, max = 4096))]
    pub token: String,
}
