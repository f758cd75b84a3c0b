use super::id::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOwner {
    pub id: UserId,
    pub name: String,
}

// 通知の表示に使うユーザー情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub profile_picture: Option<String>,
}
