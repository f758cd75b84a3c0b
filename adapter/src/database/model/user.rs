use kernel::model::{id::UserId, user::UserProfile};

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub user_id: UserId,
    pub name: String,
    pub profile_picture: Option<String>,
}

impl From<UserRow> for UserProfile {
    fn from(value: UserRow) -> Self {
        UserProfile {
            id: value.user_id,
            name: value.name,
            profile_picture: value.profile_picture,
        }
    }
}
