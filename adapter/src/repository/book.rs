use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{book::Book, id::BookId},
    repository::book::BookRepository,
};
use shared::error::{AppError, AppResult};

use crate::database::{model::book::BookRow, ConnectionPool};

#[derive(new)]
pub struct BookRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl BookRepository for BookRepositoryImpl {
    async fn find_by_id(&self, book_id: BookId) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
                SELECT
                  b.book_id,
                  b.title,
                  u.user_id AS owner_id,
                  u.name AS owner_name
                FROM books AS b
                INNER JOIN users AS u USING (user_id)
                WHERE b.book_id = $1
            "#,
        )
        .bind(book_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(row.map(Book::from))
    }
}
