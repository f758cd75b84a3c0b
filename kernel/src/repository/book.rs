use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{book::Book, id::BookId};

#[mockall::automock]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_by_id(&self, book_id: BookId) -> AppResult<Option<Book>>;
}
