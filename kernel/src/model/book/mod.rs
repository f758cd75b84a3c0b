use super::{id::BookId, user::BookOwner};

// 蔵書カタログは外部の協調者。貸出ワークフローが必要とする項目だけを参照する
#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub owner: BookOwner,
}
